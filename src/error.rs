use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Out of host memory")]
    OutOfMemory,

    #[error("Operation not implemented")]
    NotImplemented,

    #[error("Driver operation failed")]
    Fail,

    #[error("Size is not a multiple of the required alignment")]
    MisalignedSize,

    #[error("Data pointer is not suitably aligned")]
    MisalignedData,

    #[error("Operation timed out")]
    Timeout,

    #[error("Bad input: {0}")]
    BadInput(String),
}

// A convenient alias
pub type Result<T> = std::result::Result<T, Error>;
