use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("packet dump: invalid option: {0}")]
    ErrInvalidOption(String),
    #[error("packet dump: read reported {0} bytes into a {1} byte buffer")]
    ErrReadLengthOutOfBounds(usize, usize),
    #[error("packet dump: sink lock poisoned: {0}")]
    PoisonError(String),

    #[error("rtp: {0}")]
    Rtp(#[source] util::Error),
    #[error("rtcp: {0}")]
    Rtcp(#[from] rtcp::Error),
    #[error("{0}")]
    Io(#[source] IoError),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}

impl From<util::Error> for Error {
    fn from(e: util::Error) -> Self {
        Error::Rtp(e)
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::PoisonError(e.to_string())
    }
}
