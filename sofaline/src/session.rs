//! The dispatch session: one event loop, one multiplexer, many exchanges.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use mio::Token;

use crate::error::Error;
use crate::event_loop::EventLoop;
use crate::metrics::{
    PROGRESS_CHECKS, TIMER_ARMED, TIMER_FIRED, TRANSFERS_COMPLETED, TRANSFERS_IN_FLIGHT,
    TRANSFERS_SUBMITTED, WATCHES_CREATED, WATCHES_REMOVED,
};
use crate::multiplexer::{Direction, Multiplexer, SocketAction, SocketId, TimeoutRequest};
use crate::watch::WatchTable;

/// Callback receiving each finished exchange; ownership moves into it.
pub type CompletionSink<T> = Box<dyn FnMut(T)>;

/// Runs many exchanges to completion on one event loop.
///
/// A session owns the event loop, the registry of socket watches, and the
/// transport multiplexer, and is the only thing that touches them — every
/// handler below runs on the loop thread, so no locking exists anywhere.
/// Submit exchanges with [`submit`](Self::submit), then either
/// [`run`](Self::run) until all of them have been delivered or interleave
/// [`step`](Self::step) with other work.
///
/// Completed exchanges go to the completion sink exactly once each, in
/// whatever order the network finishes them. Without a sink they queue up
/// for [`take_finished`](Self::take_finished) instead.
pub struct Session<M: Multiplexer> {
    // Field order is teardown order: the poller (and its deadline) goes
    // first, watches next, the multiplexer last, so no watch outlives the
    // multiplexer it reports on.
    event_loop: EventLoop,
    watches: WatchTable,
    multi: M,
    sink: Option<CompletionSink<M::Transfer>>,
    /// Finished exchanges retained because no sink is registered.
    finished: VecDeque<M::Transfer>,
    /// Scratch for one poll's readiness batch.
    ready: Vec<(Token, Direction)>,
}

impl<M: Multiplexer> Session<M> {
    /// Wire an event loop and a multiplexer into a session.
    pub fn new(event_loop: EventLoop, multi: M, sink: Option<CompletionSink<M::Transfer>>) -> Self {
        Session {
            event_loop,
            watches: WatchTable::new(),
            multi,
            sink,
            finished: VecDeque::new(),
            ready: Vec::new(),
        }
    }

    // ── Submission ──────────────────────────────────────────────────────

    /// Attach one more concurrent exchange.
    ///
    /// There is no admission control: every submission is attached
    /// immediately, bounded only by file-descriptor limits. Host
    /// resolution runs synchronously here, on the calling thread; the
    /// loop itself never blocks.
    pub fn submit(&mut self, transfer: M::Transfer) -> Result<(), Error> {
        self.multi.add(transfer);
        TRANSFERS_SUBMITTED.increment();
        TRANSFERS_IN_FLIGHT.increment();
        self.apply_requests()
    }

    /// Exchanges attached and not yet delivered.
    pub fn in_flight(&self) -> usize {
        self.multi.running()
    }

    /// Live socket watches, idle ones included.
    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    /// Pop a finished exchange retained because no sink is registered.
    pub fn take_finished(&mut self) -> Option<M::Transfer> {
        self.finished.pop_front()
    }

    // ── Loop ────────────────────────────────────────────────────────────

    /// Drive the loop until every submitted exchange has been delivered.
    pub fn run(&mut self) -> Result<(), Error> {
        while self.multi.running() > 0 {
            self.step(None)?;
        }
        Ok(())
    }

    /// One poll cycle: wait for readiness, the armed deadline, or
    /// `max_wait`, whichever comes first, then dispatch and drain.
    pub fn step(&mut self, max_wait: Option<Duration>) -> Result<(), Error> {
        let mut ready = std::mem::take(&mut self.ready);
        ready.clear();
        if let Err(e) = self.event_loop.poll_ready(max_wait, &mut ready) {
            self.ready = ready;
            return Err(e);
        }
        let mut res = Ok(());
        for &(token, dir) in &ready {
            // Watches are only inserted at submit time, never while this
            // batch is dispatched, so a token that resolves here cannot be
            // a recycled slot; one that does not was removed earlier in
            // the batch and its event is simply dropped.
            if let Some(socket) = self.watches.socket_for(token) {
                res = self.on_socket_ready(socket, dir);
                if res.is_err() {
                    break;
                }
            }
        }
        self.ready = ready;
        res?;
        if self.event_loop.take_due_deadline(Instant::now()) {
            self.on_timer_fired()?;
        }
        Ok(())
    }

    // ── Handlers ────────────────────────────────────────────────────────

    /// Readiness handler: progress-check the multiplexer for this socket,
    /// apply the monitoring changes it produced, then drain completions.
    pub fn on_socket_ready(&mut self, socket: SocketId, ready: Direction) -> Result<(), Error> {
        PROGRESS_CHECKS.increment();
        self.multi.advance_socket(socket, ready);
        self.apply_requests()?;
        self.drain_completions();
        Ok(())
    }

    /// Timer handler: unprompted progress check, then the same apply and
    /// drain sequence as a readiness event.
    pub fn on_timer_fired(&mut self) -> Result<(), Error> {
        TIMER_FIRED.increment();
        PROGRESS_CHECKS.increment();
        self.multi.advance_timeout();
        self.apply_requests()?;
        self.drain_completions();
        Ok(())
    }

    // ── Multiplexer requests ────────────────────────────────────────────

    /// Apply queued monitoring changes, then re-arm the timer if asked.
    /// Interest changes always land before any completion is delivered,
    /// so a sink never observes a finished exchange racing a stale watch.
    fn apply_requests(&mut self) -> Result<(), Error> {
        while let Some((socket, action)) = self.multi.next_interest() {
            self.apply_interest(socket, action)?;
        }
        if let Some(request) = self.multi.take_timeout_request() {
            self.apply_timeout(request);
        }
        Ok(())
    }

    fn apply_interest(&mut self, socket: SocketId, action: SocketAction) -> Result<(), Error> {
        match action {
            SocketAction::Watch(dir) => {
                let created = !self.watches.contains(socket);
                let (token, watch) = self.watches.entry(socket);
                match watch.registered {
                    Some(current) if current == dir => {}
                    Some(_) => {
                        // Direction changes replace the registration;
                        // they are never additive.
                        self.event_loop.reregister(socket.0, token, dir)?;
                        watch.registered = Some(dir);
                    }
                    None => {
                        self.event_loop.register(socket.0, token, dir)?;
                        watch.registered = Some(dir);
                    }
                }
                if created {
                    WATCHES_CREATED.increment();
                }
            }
            SocketAction::Idle => {
                let created = !self.watches.contains(socket);
                let (_, watch) = self.watches.entry(socket);
                if watch.registered.take().is_some() {
                    self.event_loop.deregister(socket.0)?;
                }
                if created {
                    WATCHES_CREATED.increment();
                }
            }
            SocketAction::Remove => {
                if let Some(watch) = self.watches.remove(socket) {
                    if watch.registered.is_some() {
                        // The transport usually closes the fd before this
                        // request is drained, which already removed it
                        // from the poller; a miss here is expected.
                        let _ = self.event_loop.deregister(socket.0);
                    }
                    WATCHES_REMOVED.increment();
                }
            }
        }
        Ok(())
    }

    fn apply_timeout(&mut self, request: TimeoutRequest) {
        let deadline = match request {
            TimeoutRequest::Cancel => None,
            TimeoutRequest::Immediate => Some(Instant::now()),
            TimeoutRequest::After(wait) => Some(Instant::now() + wait),
        };
        if deadline.is_some() {
            TIMER_ARMED.increment();
        }
        self.event_loop.set_deadline(deadline);
    }

    // ── Completions ─────────────────────────────────────────────────────

    /// Hand out every queued completion before returning to the loop; the
    /// multiplexer will not re-signal for messages already queued.
    fn drain_completions(&mut self) {
        while let Some(transfer) = self.multi.next_completion() {
            TRANSFERS_COMPLETED.increment();
            TRANSFERS_IN_FLIGHT.decrement();
            match self.sink.as_mut() {
                Some(sink) => sink(transfer),
                None => self.finished.push_back(transfer),
            }
        }
    }

    // ── Teardown ────────────────────────────────────────────────────────

    /// Tear the session down: cancel the timer, release every watch, then
    /// release the multiplexer. Exchanges still in flight are abandoned
    /// without a sink call; callers needing a graceful drain must track
    /// outstanding counts and run the loop to idle first. Consuming `self`
    /// closes off any second teardown.
    pub fn teardown(mut self) {
        self.event_loop.set_deadline(None);
        for watch in self.watches.drain() {
            if watch.registered.is_some() {
                let _ = self.event_loop.deregister(watch.socket.0);
            }
        }
        for _ in 0..self.multi.running() {
            TRANSFERS_IN_FLIGHT.decrement();
        }
        // Dropping the fields releases the multiplexer last.
    }
}
