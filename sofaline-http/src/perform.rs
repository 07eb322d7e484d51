//! Blocking single-exchange path: run one transfer to completion on the
//! calling thread, no session or multiplexer involved.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Instant;

use crate::config::Config;
use crate::error::Error;
use crate::metrics::{EXCHANGES_FAILED, EXCHANGES_OK, EXCHANGES_STARTED};
use crate::resolver::{pick_addr, std_resolver};
use crate::transfer::{Method, Transfer, TransferResult};
use crate::wire::{self, ResponseParser};

/// Run one exchange to completion with the default configuration.
///
/// The outcome, success or failure, lands on the transfer as its result
/// code, exactly as it would coming back from a session.
pub fn perform(t: &mut Transfer) {
    // The default configuration always validates.
    let _ = perform_with(t, &Config::default());
}

/// Run one exchange to completion, blocking the calling thread.
///
/// Only a rejected configuration errors out of band; everything that can
/// go wrong with the exchange itself is reported through
/// [`Transfer::result`].
pub fn perform_with(t: &mut Transfer, config: &Config) -> Result<(), Error> {
    config.validate()?;
    t.reset_response();
    match run_blocking(t, config) {
        Ok(()) => {
            t.result = TransferResult::Ok;
            EXCHANGES_OK.increment();
        }
        Err((result, detail)) => {
            t.fail(result, detail);
            EXCHANGES_FAILED.increment();
        }
    }
    Ok(())
}

fn run_blocking(t: &mut Transfer, config: &Config) -> Result<(), (TransferResult, String)> {
    let endpoint = wire::split_url(&t.url)?;
    let resolve = std_resolver();
    let addrs = resolve(&endpoint.lookup_host, endpoint.port)
        .map_err(|e| (TransferResult::ResolveFailed, e.to_string()))?;
    let addr = pick_addr(&addrs).ok_or_else(|| {
        (
            TransferResult::ResolveFailed,
            format!("no addresses for {}", endpoint.lookup_host),
        )
    })?;

    let deadline = Instant::now() + config.transfer_timeout;
    let mut stream = TcpStream::connect_timeout(&addr, config.connect_timeout).map_err(|e| {
        if e.kind() == io::ErrorKind::TimedOut {
            (
                TransferResult::ConnectTimedOut,
                format!("connect timed out after {:?}", config.connect_timeout),
            )
        } else {
            (TransferResult::ConnectFailed, e.to_string())
        }
    })?;
    EXCHANGES_STARTED.increment();
    let _ = stream.set_nodelay(true);

    let mut head = Vec::with_capacity(256);
    wire::write_request_head(&mut head, t, &endpoint, &config.user_agent);
    write_all_by(&mut stream, &head, deadline)?;
    write_all_by(&mut stream, &t.body_out, deadline)?;

    let mut parser = ResponseParser::new(t.method == Method::Head);
    let mut buf = [0u8; 16 * 1024];
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err((
                TransferResult::TimedOut,
                format!("exchange timed out after {:?}", config.transfer_timeout),
            ));
        }
        stream
            .set_read_timeout(Some(deadline - now))
            .map_err(|e| (TransferResult::RecvFailed, e.to_string()))?;
        match stream.read(&mut buf) {
            Ok(0) => {
                parser.finish_eof()?;
                return Ok(());
            }
            Ok(n) => {
                let done = parser
                    .feed(&buf[..n], t)
                    .map_err(|msg| (TransferResult::BadResponse, msg.to_string()))?;
                if done {
                    return Ok(());
                }
            }
            // Read timeout; the loop re-checks the deadline.
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err((TransferResult::RecvFailed, e.to_string())),
        }
    }
}

fn write_all_by(
    stream: &mut TcpStream,
    mut data: &[u8],
    deadline: Instant,
) -> Result<(), (TransferResult, String)> {
    while !data.is_empty() {
        let now = Instant::now();
        if now >= deadline {
            return Err((
                TransferResult::TimedOut,
                "exchange timed out during send".to_string(),
            ));
        }
        stream
            .set_write_timeout(Some(deadline - now))
            .map_err(|e| (TransferResult::SendFailed, e.to_string()))?;
        match stream.write(data) {
            Ok(0) => {
                return Err((
                    TransferResult::SendFailed,
                    "socket write returned zero".to_string(),
                ));
            }
            Ok(n) => data = &data[n..],
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err((TransferResult::SendFailed, e.to_string())),
        }
    }
    Ok(())
}
