use std::io;

use sofaline_http::TransferResult;
use thiserror::Error;

/// Errors returned by the helpers that interpret a finished exchange.
///
/// Plain request builders never fail; they hand back a
/// [`Transfer`](sofaline_http::Transfer) whose result is inspected after
/// the exchange runs. These variants cover the helpers that go further,
/// reading files, parsing JSON, or pulling a value out of a response.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading an attachment from disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A body could not be encoded or a response was not the JSON we
    /// expected.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// The exchange failed before a usable response arrived.
    #[error("transfer failed: {0}")]
    Transfer(TransferResult),
    /// The server answered outside the 2xx range.
    #[error("unexpected status {0}")]
    Status(u16),
    /// A response was missing a header we depend on.
    #[error("response carried no {0} header")]
    MissingHeader(&'static str),
    /// An attachment path ends without a file name to upload under.
    #[error("attachment path has no file name: {0}")]
    BadAttachmentPath(String),
}
