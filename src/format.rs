// Time formatting shared by the task list, stats banner and feasibility text.
// Seconds are rounded up so a countdown never reads 00:00 before it is done.

const SECOND: u64 = 1_000;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;

fn ceil_secs(ms: u64) -> u64 {
    ms.div_ceil(SECOND)
}

/// Countdown display: `MM:SS`, or `H:MM:SS` from one hour up.
pub fn format_countdown(ms: u64) -> String {
    if ms == 0 {
        return "00:00".to_string();
    }
    let total = ceil_secs(ms);
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Compact display: `Xh Ym` or `Ym`.
pub fn format_compact(ms: u64) -> String {
    if ms == 0 {
        return "0m".to_string();
    }
    let (h, m) = split_hm(ms);
    if h > 0 {
        format!("{h}h {m}m")
    } else {
        format!("{m}m")
    }
}

/// Signed compact display for a surplus (`+15m`) or deficit (`-10m`).
pub fn format_signed(diff_ms: i64) -> String {
    let sign = if diff_ms < 0 { '-' } else { '+' };
    format!("{sign}{}", format_compact(diff_ms.unsigned_abs()))
}

/// Whole hours and leftover minutes, for prefilling an hours/minutes editor.
pub fn split_hm(ms: u64) -> (u64, u64) {
    let total = ceil_secs(ms);
    (total / 3600, (total % 3600) / 60)
}

/// Editor input back to milliseconds; saturates instead of overflowing.
pub fn hm_to_ms(hours: u64, minutes: u64) -> u64 {
    hours
        .saturating_mul(HOUR)
        .saturating_add(minutes.saturating_mul(MINUTE))
}
