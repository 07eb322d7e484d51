//! The transport-multiplexer seam.
//!
//! A [`Multiplexer`] drives many request/response exchanges over
//! non-blocking sockets without owning an event loop. The session feeds it
//! readiness ([`advance_socket`](Multiplexer::advance_socket)) and elapsed
//! deadlines ([`advance_timeout`](Multiplexer::advance_timeout)); the
//! multiplexer hands back monitoring requests and finished exchanges
//! through drained queues. Queues instead of callback registration keep
//! every side effect on the loop thread, in call order.

use std::os::fd::RawFd;
use std::time::Duration;

// ── Socket identity and readiness ───────────────────────────────────────

/// Identifies one transport-level socket by its raw file descriptor.
///
/// Identifiers may be reused by the transport over time: a `SocketId` is
/// only meaningful between the `Watch` request that introduces it and the
/// `Remove` request that retires it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(pub RawFd);

/// Readiness direction(s) on a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
    Both,
}

impl Direction {
    /// Whether this direction includes readability.
    pub fn readable(self) -> bool {
        matches!(self, Direction::Read | Direction::Both)
    }

    /// Whether this direction includes writability.
    pub fn writable(self) -> bool {
        matches!(self, Direction::Write | Direction::Both)
    }

    /// Combine two readiness directions.
    pub fn union(self, other: Direction) -> Direction {
        if self == other { self } else { Direction::Both }
    }
}

// ── Requests drained from the multiplexer ───────────────────────────────

/// What the multiplexer wants done with monitoring on one socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketAction {
    /// Keep the watch but monitor no direction.
    Idle,
    /// Monitor the given direction(s), replacing the previous direction.
    Watch(Direction),
    /// Stop monitoring and discard the watch. A remove for a socket with
    /// no watch is a no-op, not an error.
    Remove,
}

/// How long the session may wait before the next unprompted progress check.
///
/// Later requests supersede earlier ones; the session keeps at most one
/// deadline armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutRequest {
    /// No progress check is needed until socket activity.
    Cancel,
    /// Check progress on the current tick, with no actual wait.
    Immediate,
    /// Check progress after this long, absent socket activity.
    After(Duration),
}

// ── Multiplexer ─────────────────────────────────────────────────────────

/// A non-blocking engine advancing many concurrent exchanges.
///
/// Contract, in the order a [`Session`](crate::Session) exercises it each
/// tick:
///
/// 1. [`add`](Self::add) attaches a new exchange. It never blocks and never
///    fails: setup problems (bad URL, failed resolution) surface later as
///    completed exchanges carrying a result code.
/// 2. [`advance_socket`](Self::advance_socket) and
///    [`advance_timeout`](Self::advance_timeout) drive state forward.
///    Neither blocks; all I/O inside runs to `WouldBlock`.
/// 3. [`next_interest`](Self::next_interest) yields the monitoring changes
///    the advance produced, oldest first, until `None`.
/// 4. [`take_timeout_request`](Self::take_timeout_request) yields the
///    newest deadline request; later requests supersede earlier ones.
/// 5. [`next_completion`](Self::next_completion) yields finished exchanges
///    until `None`. Each is detached for good and must not be driven again.
pub trait Multiplexer {
    /// The exchange descriptor this multiplexer drives.
    type Transfer;

    /// Attach a new exchange.
    fn add(&mut self, transfer: Self::Transfer);

    /// Progress check: this socket is ready in this direction.
    ///
    /// Unknown socket ids are tolerated; readiness may race a remove.
    fn advance_socket(&mut self, socket: SocketId, ready: Direction);

    /// Progress check with no specific socket ready: re-evaluate deadlines
    /// and internal housekeeping.
    fn advance_timeout(&mut self);

    /// Next pending monitoring change, oldest first.
    fn next_interest(&mut self) -> Option<(SocketId, SocketAction)>;

    /// Latest deadline request, if one was issued since the last take.
    fn take_timeout_request(&mut self) -> Option<TimeoutRequest>;

    /// Next finished exchange, oldest first. Ownership moves to the caller.
    fn next_completion(&mut self) -> Option<Self::Transfer>;

    /// Exchanges attached and not yet handed out via
    /// [`next_completion`](Self::next_completion).
    fn running(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_components() {
        assert!(Direction::Read.readable());
        assert!(!Direction::Read.writable());
        assert!(Direction::Write.writable());
        assert!(!Direction::Write.readable());
        assert!(Direction::Both.readable());
        assert!(Direction::Both.writable());
    }

    #[test]
    fn direction_union() {
        assert_eq!(Direction::Read.union(Direction::Read), Direction::Read);
        assert_eq!(Direction::Read.union(Direction::Write), Direction::Both);
        assert_eq!(Direction::Both.union(Direction::Read), Direction::Both);
    }
}
