use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error on {}: {source}", .path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Path error: {0}")]
    Path(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Duplicate column id value '{key}' in {}", .path.display())]
    DuplicateKey { path: PathBuf, key: String },

    #[error("Visitor error: {0}")]
    Visitor(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CompareError {
    /// Wrap a `csv::Error` raised while reading or writing `path`.
    ///
    /// I/O failures surfaced through the CSV layer become `FileIo` so callers
    /// see the same error kind as for a failed open.
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        if let csv::ErrorKind::Io(err) = source.kind() {
            let err = std::io::Error::new(err.kind(), err.to_string());
            return CompareError::file_io(path, err);
        }
        CompareError::Csv {
            path: path.into(),
            source,
        }
    }

    /// Attach the file being read or written to an I/O error.
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompareError::FileIo {
            path: path.into(),
            source,
        }
    }

    /// Whether the error comes from bad options rather than from the data.
    ///
    /// Configuration errors are never worth retrying.
    pub fn is_config(&self) -> bool {
        matches!(self, CompareError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, CompareError>;
