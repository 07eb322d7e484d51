//! Socket watch registry.
//!
//! One [`SocketWatch`] per monitored socket, held in a slot table keyed by
//! poll token, plus an fd → slot map for the requests that name sockets by
//! descriptor. Ownership of every watch stays with the session.

use std::collections::HashMap;
use std::os::fd::RawFd;

use mio::Token;
use slab::Slab;

use crate::multiplexer::{Direction, SocketId};

/// One monitored socket: identity and current poller registration.
#[derive(Debug)]
pub(crate) struct SocketWatch {
    pub(crate) socket: SocketId,
    /// Direction currently registered with the poller; `None` while idle.
    pub(crate) registered: Option<Direction>,
}

pub(crate) struct WatchTable {
    slots: Slab<SocketWatch>,
    by_fd: HashMap<RawFd, usize>,
}

impl WatchTable {
    pub(crate) fn new() -> Self {
        WatchTable {
            slots: Slab::new(),
            by_fd: HashMap::new(),
        }
    }

    /// Slot for this socket, creating an idle watch on first sight.
    pub(crate) fn entry(&mut self, socket: SocketId) -> (Token, &mut SocketWatch) {
        let key = match self.by_fd.get(&socket.0) {
            Some(&key) => key,
            None => {
                let key = self.slots.insert(SocketWatch {
                    socket,
                    registered: None,
                });
                self.by_fd.insert(socket.0, key);
                key
            }
        };
        (Token(key), &mut self.slots[key])
    }

    pub(crate) fn contains(&self, socket: SocketId) -> bool {
        self.by_fd.contains_key(&socket.0)
    }

    /// Socket behind a poll token; `None` if the watch was removed after
    /// the event was collected.
    pub(crate) fn socket_for(&self, token: Token) -> Option<SocketId> {
        self.slots.get(token.0).map(|w| w.socket)
    }

    /// Drop the watch for this socket, returning it for deregistration.
    pub(crate) fn remove(&mut self, socket: SocketId) -> Option<SocketWatch> {
        let key = self.by_fd.remove(&socket.0)?;
        Some(self.slots.remove(key))
    }

    /// Remove and return every watch, for session teardown.
    pub(crate) fn drain(&mut self) -> Vec<SocketWatch> {
        self.by_fd.clear();
        self.slots.drain().collect()
    }

    /// Number of live watches, idle ones included.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
