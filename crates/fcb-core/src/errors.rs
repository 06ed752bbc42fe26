/// Core error type.
///
/// The adapter crate maps its specific errors into this type so the bot can
/// handle failures consistently. Every variant has a user-facing rendering
/// (`user_message`); none are fatal to the bot process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no active session for this user")]
    NoActiveSession,

    #[error("no files pending for compilation")]
    EmptyFileSet,

    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("archive compilation failed: {0}")]
    Compilation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("security violation: {0}")]
    Security(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Short, chat-safe rendering for error replies.
    pub fn user_message(&self) -> String {
        match self {
            Error::NoActiveSession => {
                "No active session. Send me a file or /start to begin.".to_string()
            }
            Error::EmptyFileSet => {
                "No files received yet! Please send some files first.".to_string()
            }
            Error::UnsupportedFormat(f) => {
                format!("Unsupported archive format: {f}. Supported: zip, 7z.")
            }
            Error::Compilation(_) => "Failed to create archive. Please try again.".to_string(),
            Error::Storage(_) | Error::Io(_) => {
                "A storage error occurred. Please try again.".to_string()
            }
            Error::Security(reason) => format!("Rejected: {reason}"),
            other => format!("Error: {other}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
