//! sofaline — single-threaded dispatch engine for concurrent exchanges.
//!
//! sofaline multiplexes many request/response exchanges over non-blocking
//! sockets on one thread. The engine side ([`Session`]) owns the readiness
//! poller, the socket watches, and a single coalesced timer; the transport
//! side (anything implementing [`Multiplexer`]) owns the sockets and the
//! protocol, and tells the engine what to monitor by queueing interest and
//! timeout requests that the engine drains after every progress check.
//!
//! Nothing here is `Send`: submission, polling, and completion delivery
//! all happen on the thread that owns the [`Session`].
//!
//! # Quick Start
//!
//! ```rust
//! use std::collections::VecDeque;
//! use sofaline::{
//!     Direction, EventLoop, Multiplexer, Session, SocketAction, SocketId, TimeoutRequest,
//! };
//!
//! /// A transport with no sockets: every exchange finishes on the next
//! /// timer tick.
//! struct Loopback {
//!     queued: VecDeque<&'static str>,
//!     done: VecDeque<&'static str>,
//!     timeout: Option<TimeoutRequest>,
//! }
//!
//! impl Multiplexer for Loopback {
//!     type Transfer = &'static str;
//!
//!     fn add(&mut self, transfer: &'static str) {
//!         self.queued.push_back(transfer);
//!         self.timeout = Some(TimeoutRequest::Immediate);
//!     }
//!     fn advance_socket(&mut self, _socket: SocketId, _ready: Direction) {}
//!     fn advance_timeout(&mut self) {
//!         self.done.append(&mut self.queued);
//!     }
//!     fn next_interest(&mut self) -> Option<(SocketId, SocketAction)> {
//!         None
//!     }
//!     fn take_timeout_request(&mut self) -> Option<TimeoutRequest> {
//!         self.timeout.take()
//!     }
//!     fn next_completion(&mut self) -> Option<&'static str> {
//!         self.done.pop_front()
//!     }
//!     fn running(&self) -> usize {
//!         self.queued.len() + self.done.len()
//!     }
//! }
//!
//! fn main() -> Result<(), sofaline::Error> {
//!     let multi = Loopback {
//!         queued: VecDeque::new(),
//!         done: VecDeque::new(),
//!         timeout: None,
//!     };
//!     let mut session = Session::new(EventLoop::new()?, multi, None);
//!     session.submit("first")?;
//!     session.submit("second")?;
//!     session.run()?;
//!     assert_eq!(session.take_finished(), Some("first"));
//!     assert_eq!(session.take_finished(), Some("second"));
//!     Ok(())
//! }
//! ```
//!
//! Real transports hand the session live sockets through
//! [`SocketAction::Watch`] requests and drive I/O from
//! [`Multiplexer::advance_socket`]; the `sofaline-http` crate carries the
//! HTTP/1.1 transport built on this contract.
//!
//! # Platform
//!
//! Unix only: watches are raw file descriptors registered with the
//! platform poller through mio.

// ── Internal modules ────────────────────────────────────────────────────
pub(crate) mod metrics;
pub(crate) mod watch;

// ── Public modules ──────────────────────────────────────────────────────
pub mod error;
pub mod event_loop;
pub mod multiplexer;
pub mod session;

// ── Re-exports: Engine ──────────────────────────────────────────────────

/// Errors surfaced by the engine itself.
pub use error::Error;
/// Readiness poller plus the session's single coalesced timer.
pub use event_loop::EventLoop;
/// Callback receiving each finished exchange.
pub use session::CompletionSink;
/// Drives many exchanges to completion on one event loop.
pub use session::Session;

// ── Re-exports: Multiplexer contract ────────────────────────────────────

/// Which readiness a watch reports: read, write, or both.
pub use multiplexer::Direction;
/// Transport-side half of the engine: owns sockets, queues requests.
pub use multiplexer::Multiplexer;
/// Requested monitoring state for one socket.
pub use multiplexer::SocketAction;
/// A transport socket named by its raw file descriptor.
pub use multiplexer::SocketId;
/// Requested state for the session's single timer.
pub use multiplexer::TimeoutRequest;
