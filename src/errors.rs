use thiserror::Error;

pub type Result<T> = std::result::Result<T, BookstoreError>;

#[derive(Debug, Error)]
pub enum BookstoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Write error: {0}")]
    Write(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Invalid record at position {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl BookstoreError {
    pub(crate) fn not_connected() -> Self {
        Self::Connection("not connected".into())
    }

    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<std::io::Error> for BookstoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for BookstoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Io(format!("json: {e}"))
    }
}
