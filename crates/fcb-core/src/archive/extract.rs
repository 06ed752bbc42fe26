//! Safe archive extraction (zip/tar/tar.gz/7z).
//!
//! Uploaded archives are untrusted input. This module defends against:
//! - Path traversal (`../`, absolute paths, Windows drive prefixes)
//! - Symlink/hardlink entries that escape the extraction directory
//! - Resource exhaustion (too many files / too much total content)

use std::{
    fs,
    io::Read,
    path::{Component, Path, PathBuf},
};

use flate2::read::GzDecoder;
use sevenz_rust::{Password, SevenZReader};
use tar::Archive;
use zip::ZipArchive;

use crate::{errors::Error, Result};

#[derive(Clone, Copy, Debug)]
pub struct ExtractLimits {
    /// Maximum number of regular files extracted.
    pub max_files: usize,
    /// Maximum total bytes extracted across all regular files.
    pub max_total_bytes: u64,
    /// Maximum bytes extracted per file.
    pub max_file_bytes: u64,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_files: 200,
            max_total_bytes: 100 * 1024 * 1024, // 100MB
            max_file_bytes: 50 * 1024 * 1024,   // 50MB per file
        }
    }
}

/// One regular file produced by an extraction, relative to the dest dir.
#[derive(Clone, Debug)]
pub struct ExtractedFile {
    pub rel_path: PathBuf,
    pub size: u64,
}

#[derive(Clone, Debug, Default)]
pub struct ExtractReport {
    pub files: Vec<ExtractedFile>,
    pub total_bytes: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
    SevenZ,
}

pub fn detect_archive_kind(file_name: &str) -> Option<ArchiveKind> {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".zip") {
        return Some(ArchiveKind::Zip);
    }
    if lower.ends_with(".7z") {
        return Some(ArchiveKind::SevenZ);
    }
    if lower.ends_with(".tar") {
        return Some(ArchiveKind::Tar);
    }
    if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        return Some(ArchiveKind::TarGz);
    }
    None
}

/// Whether intake should flag this upload as an extractable archive.
pub fn can_extract(file_name: &str) -> bool {
    detect_archive_kind(file_name).is_some()
}

pub fn safe_extract_archive(
    archive_path: &Path,
    file_name: &str,
    dest_dir: &Path,
    limits: ExtractLimits,
) -> Result<ExtractReport> {
    fs::create_dir_all(dest_dir)?;

    match detect_archive_kind(file_name) {
        Some(ArchiveKind::Zip) => extract_zip(archive_path, dest_dir, limits),
        Some(ArchiveKind::Tar) => {
            let f = fs::File::open(archive_path)?;
            extract_tar_reader(f, dest_dir, limits)
        }
        Some(ArchiveKind::TarGz) => {
            let f = fs::File::open(archive_path)?;
            extract_tar_reader(GzDecoder::new(f), dest_dir, limits)
        }
        Some(ArchiveKind::SevenZ) => extract_sevenz(archive_path, dest_dir, limits),
        None => Err(Error::External(format!(
            "Unknown archive type for file: {file_name}"
        ))),
    }
}

/// Running file-count / byte budget shared by all extractors.
struct Budget {
    limits: ExtractLimits,
    file_count: usize,
    total: u64,
}

impl Budget {
    fn new(limits: ExtractLimits) -> Self {
        Self {
            limits,
            file_count: 0,
            total: 0,
        }
    }

    fn admit(&mut self, declared_size: u64, name: &str) -> Result<()> {
        self.file_count += 1;
        if self.file_count > self.limits.max_files {
            return Err(Error::Security(format!(
                "archive exceeds max_files limit ({})",
                self.limits.max_files
            )));
        }
        if declared_size > self.limits.max_file_bytes {
            return Err(Error::Security(format!(
                "archive file too large: {declared_size} bytes (max {}) for {name}",
                self.limits.max_file_bytes
            )));
        }
        if self.total.saturating_add(declared_size) > self.limits.max_total_bytes {
            return Err(Error::Security(format!(
                "archive exceeds max_total_bytes limit ({})",
                self.limits.max_total_bytes
            )));
        }
        Ok(())
    }

    /// Copy `src` into a new file at `out_path`, bounded even when archive
    /// metadata lies about the entry size.
    fn copy_bounded(&mut self, src: &mut dyn Read, out_path: &Path, name: &str) -> Result<u64> {
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = fs::File::create(out_path)?;
        let mut limited = src.take(self.limits.max_file_bytes + 1);
        let copied = std::io::copy(&mut limited, &mut out)?;
        if copied > self.limits.max_file_bytes {
            return Err(Error::Security(format!(
                "archive entry exceeds max_file_bytes while extracting: {name}"
            )));
        }
        self.total += copied;
        Ok(copied)
    }
}

fn extract_zip(archive_path: &Path, dest_dir: &Path, limits: ExtractLimits) -> Result<ExtractReport> {
    let f = fs::File::open(archive_path)?;
    let mut zip = ZipArchive::new(f).map_err(|e| Error::External(format!("zip error: {e}")))?;

    let mut report = ExtractReport::default();
    let mut budget = Budget::new(limits);

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| Error::External(format!("zip error: {e}")))?;
        let name = entry.name().replace('\\', "/");
        if name.is_empty() {
            continue;
        }

        // Zip symlinks are commonly encoded via unix mode bits. Disallow them.
        if let Some(mode) = entry.unix_mode() {
            if mode & 0o170000 == 0o120000 {
                return Err(Error::Security(format!(
                    "archive contains symlink entry: {name}"
                )));
            }
        }

        let rel = sanitize_rel_path(Path::new(&name))?;
        let out_path = dest_dir.join(&rel);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        budget.admit(entry.size(), &name)?;
        let copied = budget.copy_bounded(&mut entry, &out_path, &name)?;

        report.files.push(ExtractedFile {
            rel_path: rel,
            size: copied,
        });
        report.total_bytes = budget.total;
    }

    Ok(report)
}

fn extract_tar_reader<R: Read>(
    r: R,
    dest_dir: &Path,
    limits: ExtractLimits,
) -> Result<ExtractReport> {
    let mut archive = Archive::new(r);
    let mut report = ExtractReport::default();
    let mut budget = Budget::new(limits);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();

        // Disallow symlinks/hardlinks/devices/etc.
        if !entry_type.is_file() && !entry_type.is_dir() {
            let p = entry
                .path()
                .ok()
                .and_then(|p| p.to_str().map(|s| s.to_string()))
                .unwrap_or_else(|| "<unknown>".to_string());
            return Err(Error::Security(format!(
                "archive contains non-file/non-dir entry: {p}"
            )));
        }

        let rel = sanitize_rel_path(&entry.path()?)?;
        let out_path = dest_dir.join(&rel);

        if entry_type.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        let name = rel.to_string_lossy().to_string();
        budget.admit(entry.header().size().unwrap_or(0), &name)?;
        let copied = budget.copy_bounded(&mut entry, &out_path, &name)?;

        report.files.push(ExtractedFile {
            rel_path: rel,
            size: copied,
        });
        report.total_bytes = budget.total;
    }

    Ok(report)
}

fn extract_sevenz(
    archive_path: &Path,
    dest_dir: &Path,
    limits: ExtractLimits,
) -> Result<ExtractReport> {
    let mut sz = SevenZReader::open(archive_path, Password::empty())
        .map_err(|e| Error::External(format!("7z error: {e}")))?;

    let mut report = ExtractReport::default();
    let mut budget = Budget::new(limits);
    // The entry callback cannot carry our error type; park the first
    // violation here and stop iterating.
    let mut violation: Option<Error> = None;

    sz.for_each_entries(|entry, reader| {
        let name = entry.name().to_string();
        if name.is_empty() {
            return Ok(true);
        }

        let rel = match sanitize_rel_path(Path::new(&name)) {
            Ok(rel) => rel,
            Err(e) => {
                violation = Some(e);
                return Ok(false);
            }
        };
        let out_path = dest_dir.join(&rel);

        if entry.is_directory() {
            if let Err(e) = fs::create_dir_all(&out_path) {
                violation = Some(Error::Io(e));
                return Ok(false);
            }
            return Ok(true);
        }

        if let Err(e) = budget.admit(entry.size(), &name) {
            violation = Some(e);
            return Ok(false);
        }

        match budget.copy_bounded(reader, &out_path, &name) {
            Ok(copied) => {
                report.files.push(ExtractedFile {
                    rel_path: rel,
                    size: copied,
                });
                report.total_bytes = budget.total;
                Ok(true)
            }
            Err(e) => {
                violation = Some(e);
                Ok(false)
            }
        }
    })
    .map_err(|e| Error::External(format!("7z error: {e}")))?;

    if let Some(e) = violation {
        return Err(e);
    }
    Ok(report)
}

fn sanitize_rel_path(p: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for comp in p.components() {
        match comp {
            Component::CurDir => {}
            Component::Normal(os) => out.push(os),
            Component::ParentDir => {
                return Err(Error::Security(format!(
                    "archive contains path traversal: {}",
                    p.display()
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::Security(format!(
                    "archive contains absolute path: {}",
                    p.display()
                )));
            }
        }
    }

    if out.as_os_str().is_empty() {
        return Err(Error::Security("archive contains empty path".to_string()));
    }

    Ok(out)
}
