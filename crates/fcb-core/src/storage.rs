//! Per-user scratch directories.
//!
//! Every active session owns exactly one scratch directory under the
//! configured temp root. The directory is created when the session starts and
//! removed when the session ends, on every exit path including compiler
//! failures.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use crate::{domain::UserId, errors::Error, Result};

/// A session-owned scratch directory.
///
/// `release()` is the explicit teardown; `Drop` is a backstop so the
/// directory never outlives its session even on unexpected paths.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    released: bool,
}

impl ScratchDir {
    pub fn allocate(root: &Path, user: UserId) -> Result<Self> {
        let path = root.join(format!("user_{}", user.0));
        fs::create_dir_all(&path)
            .map_err(|e| Error::Storage(format!("cannot create {}: {e}", path.display())))?;
        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the directory and everything in it.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!(
                "cannot remove {}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Free path for `name` inside the scratch dir, appending `_1`, `_2`, ...
    /// before the extension when the name is already taken.
    pub fn unique_path(&self, name: &str) -> (PathBuf, String) {
        let candidate = self.path.join(name);
        if !candidate.exists() {
            return (candidate, name.to_string());
        }

        let (stem, ext) = match name.rsplit_once('.') {
            Some((s, e)) if !s.is_empty() && !e.is_empty() => (s.to_string(), Some(e.to_string())),
            _ => (name.to_string(), None),
        };

        for n in 1.. {
            let unique = match &ext {
                Some(e) => format!("{stem}_{n}.{e}"),
                None => format!("{stem}_{n}"),
            };
            let candidate = self.path.join(&unique);
            if !candidate.exists() {
                return (candidate, unique);
            }
        }
        unreachable!("counter space exhausted");
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

/// Remove leftover per-user scratch directories older than `max_age`.
///
/// Run at startup: sessions do not survive a restart, so anything found under
/// the temp root is orphaned. Recent directories are kept in case another
/// instance is still shutting down.
pub fn sweep_stale(root: &Path, max_age: Duration) -> Result<usize> {
    let Ok(rd) = fs::read_dir(root) else {
        return Ok(0);
    };

    let now = SystemTime::now();
    let mut removed = 0usize;

    for ent in rd.flatten() {
        let name = ent.file_name().to_string_lossy().to_string();
        if !name.starts_with("user_") {
            continue;
        }
        let Ok(md) = ent.metadata() else {
            continue;
        };
        if !md.is_dir() {
            continue;
        }

        let age = md
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or(Duration::ZERO);
        if age > max_age {
            match fs::remove_dir_all(ent.path()) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(
                    "failed to remove stale scratch dir {}: {e}",
                    ent.path().display()
                ),
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_root(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis();
        let pid = std::process::id();
        let dir = PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}"));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn allocate_creates_and_release_removes() {
        let root = tmp_root("fcb-scratch");
        let scratch = ScratchDir::allocate(&root, UserId(7)).unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.is_dir());

        scratch.release().unwrap();
        assert!(!path.exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn drop_is_a_removal_backstop() {
        let root = tmp_root("fcb-scratch-drop");
        let path = {
            let scratch = ScratchDir::allocate(&root, UserId(8)).unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn unique_path_appends_counter_before_extension() {
        let root = tmp_root("fcb-scratch-unique");
        let scratch = ScratchDir::allocate(&root, UserId(9)).unwrap();

        let (p0, n0) = scratch.unique_path("report.pdf");
        assert_eq!(n0, "report.pdf");
        fs::write(&p0, b"x").unwrap();

        let (p1, n1) = scratch.unique_path("report.pdf");
        assert_eq!(n1, "report_1.pdf");
        fs::write(&p1, b"y").unwrap();

        let (_, n2) = scratch.unique_path("report.pdf");
        assert_eq!(n2, "report_2.pdf");

        let (_, plain) = scratch.unique_path("noext");
        assert_eq!(plain, "noext");

        scratch.release().unwrap();
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn sweep_removes_only_stale_user_dirs() {
        let root = tmp_root("fcb-sweep");
        let stale = root.join("user_1");
        let other = root.join("not-a-session");
        fs::create_dir_all(&stale).unwrap();
        fs::create_dir_all(&other).unwrap();

        std::thread::sleep(Duration::from_millis(20));

        // A generous max_age keeps everything.
        assert_eq!(sweep_stale(&root, Duration::from_secs(3600)).unwrap(), 0);
        assert!(stale.exists());

        // A tiny max_age reaps the user dir but never foreign entries.
        assert_eq!(sweep_stale(&root, Duration::from_millis(1)).unwrap(), 1);
        assert!(!stale.exists());
        assert!(other.exists());

        let _ = fs::remove_dir_all(&root);
    }
}
