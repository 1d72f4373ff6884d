use chrono::{DateTime, FixedOffset, Utc};

/// Source of "now" for the driver.
pub trait Clock: Send {
    /// Epoch milliseconds, used for countdown accounting.
    fn now_ms(&self) -> u64;
    /// Local wall-clock time, used for the feasibility window.
    fn now_local(&self) -> DateTime<FixedOffset>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        now_ms()
    }

    fn now_local(&self) -> DateTime<FixedOffset> {
        now_fixed_offset()
    }
}

/// Wall-clock now as epoch milliseconds.
pub fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

// Local -> FixedOffset (current system offset)
pub fn now_fixed_offset() -> DateTime<FixedOffset> {
    let local = chrono::Local::now();
    local.with_timezone(local.offset())
}
