//! Readiness polling and the session's single timer.

use std::io;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use crate::error::Error;
use crate::multiplexer::Direction;

/// Batch size for one poll. The kernel keeps ready descriptors queued
/// until they are returned, so overflow only costs an extra wakeup.
const EVENT_CAPACITY: usize = 256;

/// Readiness source plus the session's one deadline.
///
/// Wraps a [`mio::Poll`]. Registration is by raw descriptor, matching the
/// fd-based watch protocol of the multiplexer, and the timer is a single
/// optional [`Instant`] folded into the poll wait rather than a timer fd.
/// Re-arming replaces the previous deadline, so at most one firing is ever
/// pending.
pub struct EventLoop {
    poll: Poll,
    events: Events,
    deadline: Option<Instant>,
}

impl EventLoop {
    /// Create the poller. Failure here is fatal for the session being
    /// built; callers must not submit exchanges to a session they could
    /// not construct.
    pub fn new() -> Result<Self, Error> {
        Ok(EventLoop {
            poll: Poll::new()?,
            events: Events::with_capacity(EVENT_CAPACITY),
            deadline: None,
        })
    }

    // ── Registration ────────────────────────────────────────────────────

    pub(crate) fn register(&self, fd: RawFd, token: Token, dir: Direction) -> io::Result<()> {
        self.poll
            .registry()
            .register(&mut SourceFd(&fd), token, interest_for(dir))
    }

    pub(crate) fn reregister(&self, fd: RawFd, token: Token, dir: Direction) -> io::Result<()> {
        self.poll
            .registry()
            .reregister(&mut SourceFd(&fd), token, interest_for(dir))
    }

    pub(crate) fn deregister(&self, fd: RawFd) -> io::Result<()> {
        self.poll.registry().deregister(&mut SourceFd(&fd))
    }

    // ── Timer ───────────────────────────────────────────────────────────

    /// Replace the pending deadline. `None` cancels it.
    pub(crate) fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Clear and report a due deadline. A future deadline stays armed.
    pub(crate) fn take_due_deadline(&mut self, now: Instant) -> bool {
        if self.deadline.is_some_and(|d| d <= now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }

    // ── Polling ─────────────────────────────────────────────────────────

    /// Wait for readiness, the armed deadline, or `max_wait` (whichever is
    /// shortest), then append `(token, readiness)` pairs to `out`.
    ///
    /// Error and hang-up conditions are reported as read+write readiness
    /// so the transport discovers the failure through its own I/O paths
    /// instead of the engine guessing the cause.
    pub(crate) fn poll_ready(
        &mut self,
        max_wait: Option<Duration>,
        out: &mut Vec<(Token, Direction)>,
    ) -> Result<(), Error> {
        let now = Instant::now();
        let until_deadline = self.deadline.map(|d| d.saturating_duration_since(now));
        let timeout = match (until_deadline, max_wait) {
            (None, None) => None,
            (Some(d), None) => Some(d),
            (None, Some(w)) => Some(w),
            (Some(d), Some(w)) => Some(d.min(w)),
        };

        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            // A signal is not an error; the caller re-polls next tick.
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(Error::Io(e)),
        }

        for event in self.events.iter() {
            let readable = event.is_readable() || event.is_read_closed();
            let writable = event.is_writable() || event.is_write_closed();
            let dir = if event.is_error() || (readable && writable) {
                Direction::Both
            } else if readable {
                Direction::Read
            } else if writable {
                Direction::Write
            } else {
                continue;
            };
            out.push((event.token(), dir));
        }
        Ok(())
    }
}

fn interest_for(dir: Direction) -> Interest {
    match dir {
        Direction::Read => Interest::READABLE,
        Direction::Write => Interest::WRITABLE,
        Direction::Both => Interest::READABLE | Interest::WRITABLE,
    }
}
