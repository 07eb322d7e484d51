//! sofaline-http — HTTP/1.1 transport for the sofaline dispatch engine.
//!
//! Each [`Transfer`] describes one request/response exchange. Hand
//! transfers to a session backed by [`Multi`] to run any number of them
//! concurrently on one thread, or to [`perform`] to run a single one
//! blocking. Either way the outcome comes back on the transfer itself:
//! a [`TransferResult`] for the transport verdict, then status, headers,
//! and body for exchanges that completed.
//!
//! Connections are one-shot (`connection: close`), which keeps every
//! exchange independent: no pooling, no pipelining, no cross-request
//! state.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sofaline_http::{CompletionSink, Config, Method, Transfer, new_session};
//!
//! fn main() -> Result<(), sofaline_http::Error> {
//!     let sink: CompletionSink<Transfer> = Box::new(|t| {
//!         println!("{} {} -> {:?} {}", t.method().as_str(), t.url(), t.result(), t.status());
//!     });
//!     let mut session = new_session(Config::default(), Some(sink))?;
//!     session.submit(Transfer::new(Method::Get, "http://127.0.0.1:5984/_all_dbs"))?;
//!     session.submit(Transfer::new(Method::Get, "http://127.0.0.1:5984/db/_changes"))?;
//!     session.run()?;
//!     Ok(())
//! }
//! ```
//!
//! Only plain `http` URLs are supported.

// ── Internal modules ────────────────────────────────────────────────────
pub(crate) mod conn;
pub(crate) mod metrics;
pub(crate) mod wire;

// ── Public modules ──────────────────────────────────────────────────────
pub mod config;
pub mod error;
pub mod multi;
pub mod perform;
pub mod resolver;
pub mod transfer;

// ── Re-exports ──────────────────────────────────────────────────────────

/// Transport configuration: timeouts and identification.
pub use config::Config;
/// Errors from setup and loop plumbing.
pub use error::Error;
/// The HTTP/1.1 transport multiplexer.
pub use multi::Multi;
/// Run one exchange blocking, with default configuration.
pub use perform::perform;
/// Run one exchange blocking, with explicit configuration.
pub use perform::perform_with;
/// Host resolution hook.
pub use resolver::Resolver;
/// Request method, `COPY` included.
pub use transfer::Method;
/// One HTTP exchange: request out, response in.
pub use transfer::Transfer;
/// Transport verdict on a finished exchange.
pub use transfer::TransferResult;

// Engine types callers need alongside this crate.
pub use sofaline::{CompletionSink, EventLoop, Session};

/// Wire a fresh event loop and a [`Multi`] into a ready-to-use session.
pub fn new_session(
    config: Config,
    sink: Option<sofaline::CompletionSink<Transfer>>,
) -> Result<sofaline::Session<Multi>, Error> {
    let event_loop = sofaline::EventLoop::new()?;
    let multi = Multi::new(config)?;
    Ok(sofaline::Session::new(event_loop, multi, sink))
}
