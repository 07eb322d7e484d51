use std::collections::{HashMap, VecDeque};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Instant;

use mio::net::TcpStream;
use slab::Slab;
use sofaline::{Direction, Multiplexer, SocketAction, SocketId, TimeoutRequest};

use crate::config::Config;
use crate::conn::Conn;
use crate::error::Error;
use crate::metrics::{EXCHANGES_FAILED, EXCHANGES_OK, EXCHANGES_STARTED};
use crate::resolver::{Resolver, pick_addr, std_resolver};
use crate::transfer::{Transfer, TransferResult};
use crate::wire;

/// An HTTP/1.1 transport multiplexer: one connection per exchange, any
/// number of exchanges at once.
///
/// `Multi` owns the sockets and the protocol; a
/// [`Session`](sofaline::Session) owns the poller and drives it through
/// the [`Multiplexer`] contract:
///
/// 1. [`add`](Multiplexer::add) resolves the URL, starts a non-blocking
///    connect, and serializes the request head. Setup failures complete
///    the exchange immediately instead of erroring.
/// 2. [`advance_socket`](Multiplexer::advance_socket) runs the
///    connect → send → receive progression as far as the socket allows.
/// 3. [`advance_timeout`](Multiplexer::advance_timeout) expires
///    exchanges that outlived their connect or transfer budget.
/// 4. The queues drained by the session then carry the monitoring
///    changes and finished exchanges those steps produced.
pub struct Multi {
    config: Config,
    resolver: Resolver,
    conns: Slab<Conn>,
    /// Maps socket fd → slab key while the exchange is in flight.
    by_fd: HashMap<RawFd, usize>,
    /// Monitoring changes waiting for the session, oldest first.
    interest: VecDeque<(SocketId, SocketAction)>,
    /// Newest timer request; later ones supersede earlier ones.
    timeout: Option<TimeoutRequest>,
    /// Finished exchanges waiting for the session.
    completions: VecDeque<Transfer>,
}

impl Multi {
    /// Build a multiplexer with the system resolver.
    pub fn new(config: Config) -> Result<Multi, Error> {
        Multi::with_resolver(config, std_resolver())
    }

    /// Build a multiplexer with a custom resolution hook.
    pub fn with_resolver(config: Config, resolver: Resolver) -> Result<Multi, Error> {
        config.validate()?;
        Ok(Multi {
            config,
            resolver,
            conns: Slab::new(),
            by_fd: HashMap::new(),
            interest: VecDeque::new(),
            timeout: None,
            completions: VecDeque::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ── Exchange lifecycle ──────────────────────────────────────────────

    fn start(&mut self, mut t: Transfer) {
        t.reset_response();
        let endpoint = match wire::split_url(&t.url) {
            Ok(endpoint) => endpoint,
            Err((result, detail)) => return self.finish_unstarted(t, result, detail),
        };
        let addrs = match (self.resolver)(&endpoint.lookup_host, endpoint.port) {
            Ok(addrs) => addrs,
            Err(e) => {
                return self.finish_unstarted(t, TransferResult::ResolveFailed, e.to_string());
            }
        };
        let Some(addr) = pick_addr(&addrs) else {
            let detail = format!("no addresses for {}", endpoint.lookup_host);
            return self.finish_unstarted(t, TransferResult::ResolveFailed, detail);
        };
        let stream = match TcpStream::connect(addr) {
            Ok(stream) => stream,
            Err(e) => {
                return self.finish_unstarted(t, TransferResult::ConnectFailed, e.to_string());
            }
        };

        let mut head = Vec::with_capacity(256);
        wire::write_request_head(&mut head, &t, &endpoint, &self.config.user_agent);

        let now = Instant::now();
        let conn = Conn::new(
            stream,
            t,
            head,
            now + self.config.connect_timeout,
            now + self.config.transfer_timeout,
        );
        let fd = conn.stream.as_raw_fd();
        let key = self.conns.insert(conn);
        self.by_fd.insert(fd, key);
        EXCHANGES_STARTED.increment();

        self.interest
            .push_back((SocketId(fd), SocketAction::Watch(Direction::Write)));
        self.reissue_timeout();
    }

    /// Complete an exchange that never got a socket. The immediate timer
    /// request makes the session check progress (and drain this
    /// completion) on its next tick even with nothing else in flight.
    fn finish_unstarted(&mut self, mut t: Transfer, result: TransferResult, detail: String) {
        t.fail(result, detail);
        EXCHANGES_FAILED.increment();
        self.completions.push_back(t);
        self.timeout = Some(TimeoutRequest::Immediate);
    }

    /// Detach a finished connection: drop the fd mapping, queue the watch
    /// removal before the socket closes, and queue the completion.
    fn finish_conn(&mut self, key: usize) {
        let conn = self.conns.remove(key);
        let fd = conn.stream.as_raw_fd();
        self.by_fd.remove(&fd);
        self.interest.push_back((SocketId(fd), SocketAction::Remove));

        // Closes the socket; the removal queued above is already ahead
        // of the completion in the session's drain order.
        let transfer = conn.into_transfer();
        if transfer.result().is_ok() {
            EXCHANGES_OK.increment();
        } else {
            EXCHANGES_FAILED.increment();
        }
        self.completions.push_back(transfer);
    }

    /// Re-arm the session timer to the earliest pending deadline.
    fn reissue_timeout(&mut self) {
        // Queued completions need a wake to get drained: the session only
        // drains after a progress check, and a setup failure may have
        // queued one with no socket to signal through.
        if !self.completions.is_empty() {
            self.timeout = Some(TimeoutRequest::Immediate);
            return;
        }
        let mut next: Option<Instant> = None;
        for (_, conn) in &self.conns {
            let (deadline, _) = conn.deadline();
            next = Some(match next {
                Some(current) => current.min(deadline),
                None => deadline,
            });
        }
        let now = Instant::now();
        self.timeout = Some(match next {
            None => TimeoutRequest::Cancel,
            Some(deadline) if deadline <= now => TimeoutRequest::Immediate,
            Some(deadline) => TimeoutRequest::After(deadline - now),
        });
    }
}

impl Multiplexer for Multi {
    type Transfer = Transfer;

    fn add(&mut self, transfer: Transfer) {
        self.start(transfer);
    }

    fn advance_socket(&mut self, socket: SocketId, ready: Direction) {
        // A miss means the watch raced its removal; drop the event.
        let Some(&key) = self.by_fd.get(&socket.0) else {
            return;
        };
        if self.conns[key].drive(ready) {
            self.finish_conn(key);
        } else {
            let conn = &mut self.conns[key];
            let desired = conn.desired_interest();
            if desired != conn.interest {
                conn.interest = desired;
                self.interest.push_back((socket, SocketAction::Watch(desired)));
            }
        }
        self.reissue_timeout();
    }

    fn advance_timeout(&mut self) {
        let now = Instant::now();
        // Collect keys to avoid borrow conflict with finish_conn.
        let keys: Vec<usize> = self.conns.iter().map(|(k, _)| k).collect();
        for key in keys {
            if !self.conns.contains(key) {
                continue;
            }
            let (deadline, result) = self.conns[key].deadline();
            if deadline <= now {
                let detail = match result {
                    TransferResult::ConnectTimedOut => {
                        format!("connect timed out after {:?}", self.config.connect_timeout)
                    }
                    _ => {
                        format!("exchange timed out after {:?}", self.config.transfer_timeout)
                    }
                };
                self.conns[key].expire(result, detail);
                self.finish_conn(key);
            }
        }
        self.reissue_timeout();
    }

    fn next_interest(&mut self) -> Option<(SocketId, SocketAction)> {
        self.interest.pop_front()
    }

    fn take_timeout_request(&mut self) -> Option<TimeoutRequest> {
        self.timeout.take()
    }

    fn next_completion(&mut self) -> Option<Transfer> {
        self.completions.pop_front()
    }

    fn running(&self) -> usize {
        self.conns.len() + self.completions.len()
    }
}
