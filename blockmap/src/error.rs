use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("not enough free sectors: need {needed}, {free} free")]
    OutOfSpace { needed: usize, free: usize },
    #[error("file of {requested} bytes exceeds the {max} byte limit")]
    TooLarge { requested: usize, max: usize },
    #[error("file header already owns sectors")]
    AlreadyAllocated,
    #[error("corrupted on-disk record: {0}")]
    Corrupted(String),
    #[error("sector I/O failed")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HeaderError>;
