//! Millisecond timeout arithmetic shared by every blocking operation.
//!
//! The whole crate speaks one timeout dialect: `0` never blocks, [`FOREVER`]
//! blocks indefinitely, and any positive value is a deadline that many
//! milliseconds from now. Deadlines are taken on the monotonic clock so a
//! wall-clock step cannot stretch or shrink a wait.

use std::time::{Duration, Instant};

/// Timeout value meaning "block until the operation can complete".
pub const FOREVER: i64 = -1;

/// Timeout value meaning "never block".
pub const NO_WAIT: i64 = 0;

/// Absolute deadline for a wait starting at `from`, or `None` for an
/// infinite wait.
///
/// Callers are expected to have handled `timeout_ms == 0` before asking for
/// a deadline; any non-positive value maps to "no deadline" here.
pub(crate) fn deadline_after(from: Instant, timeout_ms: i64) -> Option<Instant> {
    if timeout_ms < 0 {
        None
    } else {
        Some(from + Duration::from_millis(timeout_ms as u64))
    }
}

/// Milliseconds left of a `timeout_ms` budget that started at `started`,
/// clamped to zero once the budget is spent.
pub(crate) fn remaining_ms(started: Instant, timeout_ms: i64) -> i64 {
    let elapsed = started.elapsed().as_millis();
    let elapsed = i64::try_from(elapsed).unwrap_or(i64::MAX);
    (timeout_ms - elapsed).max(0)
}
