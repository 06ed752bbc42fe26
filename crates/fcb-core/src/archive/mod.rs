//! Archive compilation (ZIP / 7Z).
//!
//! The compiler consumes an [`ArchiveJob`] snapshot and writes a single
//! archive containing exactly the job's files, in recorded order, under
//! their original names.

pub mod extract;

use std::{
    fmt,
    io::{self, Write},
    path::PathBuf,
    str::FromStr,
};

use sevenz_rust::{SevenZArchiveEntry, SevenZWriter};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::{errors::Error, session::FileEntry, Result};

/// Formats the compiler can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZ,
}

impl ArchiveFormat {
    pub const ALL: [ArchiveFormat; 2] = [ArchiveFormat::Zip, ArchiveFormat::SevenZ];

    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::SevenZ => "7z",
        }
    }

    /// Menu description, mirroring the bot's format picker.
    pub fn label(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "ZIP Archive (Universal)",
            ArchiveFormat::SevenZ => "7-Zip Archive (High Compression)",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "7z" => Ok(ArchiveFormat::SevenZ),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Ephemeral compilation request: a snapshot of a session's file list plus
/// the chosen format. Not persisted; consumed once by [`compile`].
#[derive(Debug)]
pub struct ArchiveJob {
    pub files: Vec<FileEntry>,
    pub format: ArchiveFormat,
    pub output_path: PathBuf,
}

/// Write the job's archive and return its path.
pub fn compile(job: &ArchiveJob) -> Result<PathBuf> {
    if job.files.is_empty() {
        return Err(Error::EmptyFileSet);
    }

    match job.format {
        ArchiveFormat::Zip => write_zip(job),
        ArchiveFormat::SevenZ => write_sevenz(job),
    }?;

    Ok(job.output_path.clone())
}

fn write_zip(job: &ArchiveJob) -> Result<()> {
    let f = std::fs::File::create(&job.output_path)?;
    let mut zw = ZipWriter::new(f);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in &job.files {
        zw.start_file(entry.name.as_str(), options)
            .map_err(|e| Error::Compilation(format!("zip entry {}: {e}", entry.name)))?;
        let mut src = std::fs::File::open(&entry.path)?;
        io::copy(&mut src, &mut zw)?;
    }

    let mut f = zw
        .finish()
        .map_err(|e| Error::Compilation(format!("zip finish: {e}")))?;
    f.flush()?;
    Ok(())
}

fn write_sevenz(job: &ArchiveJob) -> Result<()> {
    let mut sz = SevenZWriter::create(&job.output_path)
        .map_err(|e| Error::Compilation(format!("7z create: {e}")))?;

    for entry in &job.files {
        let src = std::fs::File::open(&entry.path)?;
        sz.push_archive_entry(
            SevenZArchiveEntry::from_path(&entry.path, entry.name.clone()),
            Some(src),
        )
        .map_err(|e| Error::Compilation(format!("7z entry {}: {e}", entry.name)))?;
    }

    sz.finish()
        .map_err(|e| Error::Compilation(format!("7z finish: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, io::Read, path::Path};

    fn tmp(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis();
        let pid = std::process::id();
        let dir = PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}"));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn job_with_files(dir: &Path, format: ArchiveFormat, files: &[(&str, &[u8])]) -> ArchiveJob {
        let entries = files
            .iter()
            .enumerate()
            .map(|(i, (name, data))| {
                let path = dir.join(name);
                fs::write(&path, data).unwrap();
                FileEntry {
                    name: name.to_string(),
                    size: data.len() as u64,
                    path,
                    order: i,
                }
            })
            .collect();

        ArchiveJob {
            files: entries,
            format,
            output_path: dir.join(format!("out.{}", format.extension())),
        }
    }

    #[test]
    fn format_parsing() {
        assert_eq!("zip".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Zip);
        assert_eq!(
            " 7Z ".parse::<ArchiveFormat>().unwrap(),
            ArchiveFormat::SevenZ
        );

        let err = "tar".parse::<ArchiveFormat>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(f) if f == "tar"));
        assert!(matches!(
            "rar".parse::<ArchiveFormat>(),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn empty_file_set_is_rejected() {
        let dir = tmp("fcb-empty");
        let job = ArchiveJob {
            files: Vec::new(),
            format: ArchiveFormat::Zip,
            output_path: dir.join("out.zip"),
        };
        assert!(matches!(compile(&job), Err(Error::EmptyFileSet)));
        assert!(!job.output_path.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn zip_preserves_names_order_and_content() {
        let dir = tmp("fcb-zip");
        let job = job_with_files(
            &dir,
            ArchiveFormat::Zip,
            &[("report.pdf", b"pdf bytes"), ("photo.jpg", b"jpg bytes")],
        );

        let out = compile(&job).unwrap();
        let mut za = zip::ZipArchive::new(fs::File::open(&out).unwrap()).unwrap();
        assert_eq!(za.len(), 2);

        // Entries come back in recorded order under original names.
        for (i, (name, data)) in [("report.pdf", b"pdf bytes".as_slice()),
                                  ("photo.jpg", b"jpg bytes".as_slice())]
        .iter()
        .enumerate()
        {
            let mut entry = za.by_index(i).unwrap();
            assert_eq!(entry.name(), *name);
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf).unwrap();
            assert_eq!(&buf, data);
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn sevenz_preserves_names_and_content() {
        let dir = tmp("fcb-7z");
        let job = job_with_files(
            &dir,
            ArchiveFormat::SevenZ,
            &[("a.txt", b"alpha"), ("b.txt", b"bravo")],
        );

        let out = compile(&job).unwrap();

        let extract_dir = dir.join("extracted");
        fs::create_dir_all(&extract_dir).unwrap();
        sevenz_rust::decompress_file(&out, &extract_dir).unwrap();

        assert_eq!(fs::read(extract_dir.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(extract_dir.join("b.txt")).unwrap(), b"bravo");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_source_file_surfaces_as_error() {
        let dir = tmp("fcb-missing");
        let job = ArchiveJob {
            files: vec![FileEntry {
                name: "ghost.txt".to_string(),
                size: 1,
                path: dir.join("ghost.txt"),
                order: 0,
            }],
            format: ArchiveFormat::Zip,
            output_path: dir.join("out.zip"),
        };
        assert!(compile(&job).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
