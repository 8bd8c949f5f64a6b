use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to access title store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse title store: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Title not found: {0}")]
    TitleNotFound(u64),

    #[error("Invalid title: {0}")]
    InvalidTitle(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, Error>;
