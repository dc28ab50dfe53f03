//! Wall-clock helpers. Every timestamp in the shared document set is
//! milliseconds since the Unix epoch.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

/// Milliseconds elapsed from `then` to `now`, saturating at zero for clock skew.
#[must_use]
pub fn age_ms(now: i64, then: i64) -> i64 {
    now.saturating_sub(then).max(0)
}
