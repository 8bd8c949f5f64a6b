use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] novelsync_core::Error),

    #[error(transparent)]
    Browser(#[from] novelsync_browser::Error),

    #[error("Unrecognized chapter label: {0}")]
    UnrecognizedChapter(String),
}

pub type Result<T> = std::result::Result<T, Error>;
