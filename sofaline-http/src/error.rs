use std::io;

use thiserror::Error;

/// Errors returned by the HTTP transport's setup and loop plumbing.
///
/// Failures of an individual exchange (unreachable host, timeout, bad
/// response) never appear here; they ride on the finished
/// [`Transfer`](crate::Transfer) as its
/// [`TransferResult`](crate::TransferResult).
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration value out of range.
    #[error("config: {0}")]
    Config(String),
    /// Event loop setup or polling failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<sofaline::Error> for Error {
    fn from(e: sofaline::Error) -> Self {
        match e {
            sofaline::Error::Io(e) => Error::Io(e),
        }
    }
}
