//! Conversions between the server's native ticks (100 ns units) and seconds.
//!
//! The two directions intentionally use different formulas. They match the
//! server's own accounting and must not be "simplified" into each other:
//! unifying them risks off-by-one drift against the backend.

/// Ticks per second in the server's native time unit.
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Convert native ticks to whole seconds, flooring.
pub fn ticks_to_seconds(ticks: u64) -> u64 {
    ticks / TICKS_PER_SECOND
}

/// Convert whole seconds to native ticks, flooring.
pub fn seconds_to_ticks(seconds: u64) -> u64 {
    seconds * 1_000_000_000 / 100
}
