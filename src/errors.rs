use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Cache registry is shut down")]
    ClosedRegistry,

    #[error("Cache is shut down: {0}")]
    CacheClosed(String),

    #[error("Cache name must not be empty")]
    InvalidName,

    #[error("Corrupt overflow record: {0}")]
    CorruptRecord(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
