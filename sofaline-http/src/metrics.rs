//! Transport counters, exported via `metriken`.

use metriken::{Counter, metric};

#[metric(
    name = "sofaline_http/exchanges/started",
    description = "Exchanges that reached the connect stage"
)]
pub static EXCHANGES_STARTED: Counter = Counter::new();

#[metric(
    name = "sofaline_http/exchanges/ok",
    description = "Exchanges that completed with a full response"
)]
pub static EXCHANGES_OK: Counter = Counter::new();

#[metric(
    name = "sofaline_http/exchanges/failed",
    description = "Exchanges that failed at the transport level, timeouts included"
)]
pub static EXCHANGES_FAILED: Counter = Counter::new();

#[metric(
    name = "sofaline_http/bytes/sent",
    description = "Request bytes written to sockets"
)]
pub static BYTES_SENT: Counter = Counter::new();

#[metric(
    name = "sofaline_http/bytes/received",
    description = "Response bytes read from sockets"
)]
pub static BYTES_RECEIVED: Counter = Counter::new();
