use std::io::{self, Read, Write};
use std::time::Instant;

use mio::net::TcpStream;
use sofaline::Direction;

use crate::metrics::{BYTES_RECEIVED, BYTES_SENT};
use crate::transfer::{Transfer, TransferResult};
use crate::wire::ResponseParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connecting,
    Sending,
    Receiving,
    Done,
}

/// One in-flight exchange bound to one non-blocking socket.
///
/// `drive` runs the connect → send → receive progression as far as the
/// socket allows, always to `WouldBlock`, so edge-style readiness
/// reporting never strands it.
pub(crate) struct Conn {
    pub(crate) stream: TcpStream,
    pub(crate) transfer: Transfer,
    phase: Phase,
    head_out: Vec<u8>,
    head_sent: usize,
    parser: ResponseParser,
    connect_deadline: Instant,
    total_deadline: Instant,
    /// Direction the session currently monitors for this socket.
    pub(crate) interest: Direction,
}

impl Conn {
    pub(crate) fn new(
        stream: TcpStream,
        transfer: Transfer,
        head_out: Vec<u8>,
        connect_deadline: Instant,
        total_deadline: Instant,
    ) -> Conn {
        let head_request = transfer.method() == crate::transfer::Method::Head;
        Conn {
            stream,
            transfer,
            phase: Phase::Connecting,
            head_out,
            head_sent: 0,
            parser: ResponseParser::new(head_request),
            connect_deadline,
            total_deadline,
            interest: Direction::Write,
        }
    }

    /// Release the exchange, closing the socket.
    pub(crate) fn into_transfer(self) -> Transfer {
        self.transfer
    }

    /// Direction worth monitoring for the current phase.
    pub(crate) fn desired_interest(&self) -> Direction {
        match self.phase {
            Phase::Connecting | Phase::Sending => Direction::Write,
            Phase::Receiving | Phase::Done => Direction::Read,
        }
    }

    /// The deadline that would fail this exchange, and how.
    pub(crate) fn deadline(&self) -> (Instant, TransferResult) {
        if self.phase == Phase::Connecting && self.connect_deadline <= self.total_deadline {
            (self.connect_deadline, TransferResult::ConnectTimedOut)
        } else {
            (self.total_deadline, TransferResult::TimedOut)
        }
    }

    /// Fail the exchange from the timer path.
    pub(crate) fn expire(&mut self, result: TransferResult, detail: String) {
        self.transfer.fail(result, detail);
        self.phase = Phase::Done;
    }

    /// Make all the progress the socket allows. Returns `true` once the
    /// exchange is finished, successfully or not.
    pub(crate) fn drive(&mut self, ready: Direction) -> bool {
        if self.phase == Phase::Connecting && ready.writable() {
            match self.check_connected() {
                Ok(true) => {
                    // Small request/response pairs; do not batch them.
                    let _ = self.stream.set_nodelay(true);
                    self.phase = Phase::Sending;
                }
                Ok(false) => return false,
                Err(e) => {
                    self.transfer
                        .fail(TransferResult::ConnectFailed, e.to_string());
                    self.phase = Phase::Done;
                    return true;
                }
            }
        }
        if self.phase == Phase::Sending && ready.writable() {
            match self.drive_send() {
                Ok(true) => self.phase = Phase::Receiving,
                Ok(false) => return false,
                Err((result, detail)) => {
                    self.transfer.fail(result, detail);
                    self.phase = Phase::Done;
                    return true;
                }
            }
        }
        if self.phase == Phase::Receiving && ready.readable() {
            match self.drive_recv() {
                Ok(true) => {
                    self.transfer.result = TransferResult::Ok;
                    self.phase = Phase::Done;
                }
                Ok(false) => return false,
                Err((result, detail)) => {
                    self.transfer.fail(result, detail);
                    self.phase = Phase::Done;
                }
            }
        }
        self.phase == Phase::Done
    }

    /// A writable (or error) event on a connecting socket means the
    /// connect attempt finished; `take_error` tells us how it went.
    fn check_connected(&self) -> io::Result<bool> {
        if let Some(e) = self.stream.take_error()? {
            return Err(e);
        }
        match self.stream.peer_addr() {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn drive_send(&mut self) -> Result<bool, (TransferResult, String)> {
        loop {
            let src: &[u8] = if self.head_sent < self.head_out.len() {
                &self.head_out[self.head_sent..]
            } else {
                self.transfer.unsent_body()
            };
            if src.is_empty() {
                return Ok(true);
            }
            match self.stream.write(src) {
                Ok(0) => {
                    return Err((
                        TransferResult::SendFailed,
                        "socket write returned zero".to_string(),
                    ));
                }
                Ok(n) => {
                    BYTES_SENT.add(n as u64);
                    if self.head_sent < self.head_out.len() {
                        self.head_sent += n;
                    } else {
                        self.transfer.advance_sent(n);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err((TransferResult::SendFailed, e.to_string())),
            }
        }
    }

    fn drive_recv(&mut self) -> Result<bool, (TransferResult, String)> {
        let mut buf = [0u8; 16 * 1024];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    self.parser.finish_eof()?;
                    return Ok(true);
                }
                Ok(n) => {
                    BYTES_RECEIVED.add(n as u64);
                    let done = self
                        .parser
                        .feed(&buf[..n], &mut self.transfer)
                        .map_err(|msg| (TransferResult::BadResponse, msg.to_string()))?;
                    if done {
                        return Ok(true);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err((TransferResult::RecvFailed, e.to_string())),
            }
        }
    }
}
