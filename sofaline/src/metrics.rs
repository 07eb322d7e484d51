//! Engine counters, exported via `metriken`.

use metriken::{Counter, Gauge, metric};

// ── Transfers ───────────────────────────────────────────────────────────

#[metric(
    name = "sofaline/transfers/submitted",
    description = "Exchanges submitted to a session"
)]
pub static TRANSFERS_SUBMITTED: Counter = Counter::new();

#[metric(
    name = "sofaline/transfers/completed",
    description = "Exchanges handed to the completion sink or finished queue"
)]
pub static TRANSFERS_COMPLETED: Counter = Counter::new();

#[metric(
    name = "sofaline/transfers/in_flight",
    description = "Exchanges attached and not yet delivered"
)]
pub static TRANSFERS_IN_FLIGHT: Gauge = Gauge::new();

// ── Watches ─────────────────────────────────────────────────────────────

#[metric(
    name = "sofaline/watches/created",
    description = "Socket watches allocated"
)]
pub static WATCHES_CREATED: Counter = Counter::new();

#[metric(
    name = "sofaline/watches/removed",
    description = "Socket watches removed"
)]
pub static WATCHES_REMOVED: Counter = Counter::new();

// ── Timer and progress checks ───────────────────────────────────────────

#[metric(
    name = "sofaline/timer/armed",
    description = "Timer re-arms requested by the multiplexer"
)]
pub static TIMER_ARMED: Counter = Counter::new();

#[metric(
    name = "sofaline/timer/fired",
    description = "Timer firings, immediate checks included"
)]
pub static TIMER_FIRED: Counter = Counter::new();

#[metric(
    name = "sofaline/progress_checks",
    description = "Multiplexer progress checks, socket-ready and timer driven"
)]
pub static PROGRESS_CHECKS: Counter = Counter::new();
