//! Per-user collection sessions.
//!
//! A session is created on the first file received (or on `/start`) and
//! destroyed after successful delivery or an explicit cancel. Invariant: a
//! user's scratch directory exists iff that user's session is active; the
//! store upholds this by tying the [`ScratchDir`] lifetime to the session.

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    archive::{ArchiveFormat, ArchiveJob},
    config::Config,
    domain::UserId,
    errors::Error,
    storage::ScratchDir,
    Result,
};

/// One collected file. Immutable once recorded.
#[derive(Clone, Debug)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub path: PathBuf,
    pub order: usize,
}

/// Where the session's UI currently sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiState {
    /// Accepting more files.
    Collecting,
    /// A format was chosen; awaiting compile confirmation.
    ReadyToCompile,
}

#[derive(Debug)]
struct Session {
    scratch: ScratchDir,
    files: Vec<FileEntry>,
    ui_state: UiState,
    format: Option<ArchiveFormat>,
}

/// Snapshot for listings and confirm screens.
#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub files: Vec<FileEntry>,
    pub total_size: u64,
    pub ui_state: UiState,
}

/// Global user-id -> session mapping with explicit lifecycle management.
///
/// Cross-user access needs no coordination beyond this map's own lock;
/// per-user action serialization happens in the router.
pub struct SessionStore {
    cfg: Arc<Config>,
    inner: Mutex<HashMap<UserId, Session>>,
}

impl SessionStore {
    pub fn new(cfg: Arc<Config>) -> Self {
        Self {
            cfg,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Create a session for `user` if none is active. Returns `true` when a
    /// new session (and scratch directory) was created.
    pub async fn start(&self, user: UserId) -> Result<bool> {
        let mut map = self.inner.lock().await;
        if map.contains_key(&user) {
            return Ok(false);
        }

        let scratch = ScratchDir::allocate(&self.cfg.temp_dir, user)?;
        map.insert(
            user,
            Session {
                scratch,
                files: Vec::new(),
                ui_state: UiState::Collecting,
                format: None,
            },
        );
        Ok(true)
    }

    pub async fn is_active(&self, user: UserId) -> bool {
        self.inner.lock().await.contains_key(&user)
    }

    pub async fn file_count(&self, user: UserId) -> Result<usize> {
        let map = self.inner.lock().await;
        let session = map.get(&user).ok_or(Error::NoActiveSession)?;
        Ok(session.files.len())
    }

    /// Reserve a collision-free path for `name` inside the user's scratch
    /// dir. The caller downloads into it, then records the entry.
    pub async fn reserve_path(&self, user: UserId, name: &str) -> Result<(PathBuf, String)> {
        let map = self.inner.lock().await;
        let session = map.get(&user).ok_or(Error::NoActiveSession)?;
        Ok(session.scratch.unique_path(name))
    }

    /// Record a downloaded file. Assigns the arrival order and drops the
    /// session back to `Collecting` (a new file invalidates a pending
    /// confirmation). Returns the new file count.
    pub async fn add_file(&self, user: UserId, name: String, size: u64, path: PathBuf) -> Result<usize> {
        let mut map = self.inner.lock().await;
        let session = map.get_mut(&user).ok_or(Error::NoActiveSession)?;

        let order = session.files.len();
        session.files.push(FileEntry {
            name,
            size,
            path,
            order,
        });
        session.ui_state = UiState::Collecting;
        session.format = None;
        Ok(session.files.len())
    }

    pub async fn list_files(&self, user: UserId) -> Result<SessionSummary> {
        let map = self.inner.lock().await;
        let session = map.get(&user).ok_or(Error::NoActiveSession)?;
        Ok(SessionSummary {
            files: session.files.clone(),
            total_size: session.files.iter().map(|f| f.size).sum(),
            ui_state: session.ui_state,
        })
    }

    pub async fn set_format(&self, user: UserId, format: ArchiveFormat) -> Result<()> {
        let mut map = self.inner.lock().await;
        let session = map.get_mut(&user).ok_or(Error::NoActiveSession)?;
        session.format = Some(format);
        session.ui_state = UiState::ReadyToCompile;
        Ok(())
    }

    /// Snapshot the session into an [`ArchiveJob`] for the chosen format.
    /// The output lands inside the scratch dir so cleanup reaps it too.
    pub async fn prepare_job(&self, user: UserId, format: ArchiveFormat) -> Result<ArchiveJob> {
        let map = self.inner.lock().await;
        let session = map.get(&user).ok_or(Error::NoActiveSession)?;
        if session.files.is_empty() {
            return Err(Error::EmptyFileSet);
        }

        let output_path = session.scratch.path().join(format!(
            "compiled_files_{}_{}files.{}",
            user.0,
            session.files.len(),
            format.extension()
        ));

        Ok(ArchiveJob {
            files: session.files.clone(),
            format,
            output_path,
        })
    }

    /// The user's scratch directory, for extraction workspaces.
    pub async fn scratch_path(&self, user: UserId) -> Result<PathBuf> {
        let map = self.inner.lock().await;
        let session = map.get(&user).ok_or(Error::NoActiveSession)?;
        Ok(session.scratch.path().to_path_buf())
    }

    /// Destroy the session and its scratch directory. Runs on delivery,
    /// cancel, and compile failure alike.
    pub async fn clear(&self, user: UserId) -> Result<()> {
        let mut map = self.inner.lock().await;
        let session = map.remove(&user).ok_or(Error::NoActiveSession)?;
        session.scratch.release()
    }

    /// Best-effort variant of [`clear`](Self::clear) for error paths where a
    /// missing session is fine.
    pub async fn clear_if_active(&self, user: UserId) {
        let mut map = self.inner.lock().await;
        if let Some(session) = map.remove(&user) {
            let _ = session.scratch.release();
        }
    }
}
