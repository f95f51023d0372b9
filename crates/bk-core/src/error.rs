use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BkError {
    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Already exists: {} (use convert to adopt it)", path.display())]
    AlreadyExists { path: PathBuf },
    #[error("Malformed metadata at line {line_no}: {line:?}")]
    MalformedMetadata { line_no: usize, line: String },
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Missing order prefix (e.g. 12-name): {}", path.display())]
    MissingOrder { path: PathBuf },
    #[error("Not a project (no marker file): {}", path.display())]
    NotAProject { path: PathBuf },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Export error: {0}")]
    Export(String),
    #[error("Snapshot error: {0}")]
    Snapshot(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BkError {
    /// Classify an I/O error against the path it happened on.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => BkError::NotFound { path },
            io::ErrorKind::AlreadyExists => BkError::AlreadyExists { path },
            _ => BkError::Io { path, source },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BkError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, BkError>;
