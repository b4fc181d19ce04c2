use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A model or dataset file does not match the expected layout.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    /// A forward pass was handed a buffer too short for the requested batch.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    /// Open failures and short reads (`UnexpectedEof`).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
