//! Engine errors.

use std::io;

/// Errors surfaced by session setup and event-loop operations.
///
/// Transport-level failures never appear here: they ride on each completed
/// exchange as its result code, delivered through the completion sink.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Event-loop creation or socket registration failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
