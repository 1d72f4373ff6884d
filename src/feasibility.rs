/*
Feasibility of the remaining workload against today's window.
Independent of the driver so the arithmetic can be tested with a fixed "now".
*/

use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::format;
use crate::models::ScheduleWindow;

// Wall-clock time of day, 24h
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    // Parse "HH:MM". Empty or malformed input means "not configured".
    pub fn parse(hhmm: &str) -> Option<Self> {
        let (h, m) = hhmm.trim().split_once(':')?;
        Self::new(digits(h)?, digits(m)?)
    }

    /// This clock time on `date`, in `offset`.
    pub fn on(self, date: NaiveDate, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        let naive = date.and_hms_opt(self.hour, self.minute, 0)?;
        offset.from_local_datetime(&naive).single()
    }
}

// Plain ASCII digits only; `u32::from_str` alone would take a leading '+'.
fn digits(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeasibilityStatus {
    Ok,
    Warning,
}

/// Outcome of comparing the pending workload with the available window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feasibility {
    pub workload_ms: u64,
    /// Negative once the end time has passed.
    pub available_ms: i64,
    /// available - workload; surplus when positive, deficit when negative.
    pub diff_ms: i64,
    pub status: FeasibilityStatus,
    pub effective_start: DateTime<FixedOffset>,
    pub target_end: DateTime<FixedOffset>,
    /// effective_start + workload; None only if that overflows the calendar.
    pub projected_finish: Option<DateTime<FixedOffset>>,
}

impl Feasibility {
    pub fn is_ok(&self) -> bool {
        self.status == FeasibilityStatus::Ok
    }

    // Banner text, e.g. "15m to spare" / "10m over"
    pub fn summary(&self) -> String {
        let amount = format::format_compact(self.diff_ms.unsigned_abs());
        match self.status {
            FeasibilityStatus::Ok => format!("{amount} to spare"),
            FeasibilityStatus::Warning => format!("{amount} over"),
        }
    }
}

/// Compare the workload with today's window.
///
/// Process:
/// - No end time -> None (nothing to compare against)
/// - Window opens at max(now, start); a past start cannot reclaim elapsed time
/// - Window closes at today's end time, never rolled to the next day
pub fn evaluate(
    workload_ms: u64,
    start: Option<ClockTime>,
    end: Option<ClockTime>,
    now: DateTime<FixedOffset>,
) -> Option<Feasibility> {
    let end = end?;
    let date = now.date_naive();
    let offset = *now.offset();

    let target_end = end.on(date, offset)?;
    let start_target = start.and_then(|s| s.on(date, offset)).unwrap_or(now);
    let effective_start = if start_target > now { start_target } else { now };

    let available_ms = (target_end - effective_start).num_milliseconds();
    let workload = i64::try_from(workload_ms).unwrap_or(i64::MAX);
    let diff_ms = available_ms.saturating_sub(workload);

    let status = if diff_ms >= 0 {
        FeasibilityStatus::Ok
    } else {
        FeasibilityStatus::Warning
    };

    Some(Feasibility {
        workload_ms,
        available_ms,
        diff_ms,
        status,
        effective_start,
        target_end,
        projected_finish: Duration::try_milliseconds(workload)
            .and_then(|d| effective_start.checked_add_signed(d)),
    })
}

/// Same as [`evaluate`], reading the persisted "HH:MM" strings.
pub fn evaluate_window(
    workload_ms: u64,
    window: &ScheduleWindow,
    now: DateTime<FixedOffset>,
) -> Option<Feasibility> {
    evaluate(
        workload_ms,
        ClockTime::parse(&window.start_time),
        ClockTime::parse(&window.end_time),
        now,
    )
}
