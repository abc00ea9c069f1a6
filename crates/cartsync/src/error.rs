use thiserror::Error;

#[derive(Error, Debug)]
pub enum CartError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    /// A directory occupies the path where a file should be.
    #[error("Location conflict: {0}")]
    LocationConflict(String),

    /// Any failure talking to the remote mirror (unreachable, revoked handle, ...).
    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A feature name that cannot be used as a file name.
    #[error("Invalid feature name: {0}")]
    InvalidFeature(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl CartError {
    /// True for failures that came from the remote side rather than local storage.
    pub fn is_remote(&self) -> bool {
        matches!(self, CartError::Remote(_))
    }
}

pub type Result<T> = std::result::Result<T, CartError>;
