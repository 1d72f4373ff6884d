//! Side-effect collaborators: notification, alert sound, platform alarm and
//! notification permission.
//!
//! Every call is best-effort. Implementations report failure through
//! [`EffectError`]; the driver logs it and carries on.

use std::io::Write;

use chrono::{DateTime, Duration, FixedOffset, Timelike};
use tracing::info;

use crate::clock;
use crate::error::EffectError;

const ALARM_ACTION: &str = "android.intent.action.SET_ALARM";
const EXTRA_HOUR: &str = "android.intent.extra.alarm.HOUR";
const EXTRA_MINUTES: &str = "android.intent.extra.alarm.MINUTES";
const EXTRA_MESSAGE: &str = "android.intent.extra.alarm.MESSAGE";
const EXTRA_SKIP_UI: &str = "android.intent.extra.alarm.SKIP_UI";
const FLAG_NEW_TASK: &str = "0x10000000";

pub trait Notifier: Send {
    fn notify(&self, title: &str, body: &str) -> Result<(), EffectError>;
}

pub trait AlertSound: Send {
    fn play(&self) -> Result<(), EffectError>;
}

pub trait PlatformAlarm: Send {
    fn set_alarm(&self, seconds: u64, message: &str) -> Result<(), EffectError>;
}

pub trait PermissionRequest: Send {
    /// Returns whether notifications may be shown.
    fn request(&self) -> Result<bool, EffectError>;
}

/// The collaborators a driver fires into.
pub struct Effects {
    pub notifier: Box<dyn Notifier>,
    pub sound: Box<dyn AlertSound>,
    pub alarm: Box<dyn PlatformAlarm>,
    pub permission: Box<dyn PermissionRequest>,
}

impl Effects {
    /// Collaborators for a headless host: log lines, terminal bell and a
    /// logged alarm intent.
    pub fn headless() -> Self {
        Self {
            notifier: Box::new(LogNotifier),
            sound: Box::new(TerminalBell),
            alarm: Box::new(IntentAlarm),
            permission: Box::new(AlwaysGranted),
        }
    }
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), EffectError> {
        info!(title, body, "notification");
        Ok(())
    }
}

// Rings the terminal bell on stderr; stdout is reserved for snapshots.
pub struct TerminalBell;

impl AlertSound for TerminalBell {
    fn play(&self) -> Result<(), EffectError> {
        let mut err = std::io::stderr();
        err.write_all(b"\x07")?;
        err.flush()?;
        Ok(())
    }
}

/// Hands the alarm off as an Android `SET_ALARM` intent URI.
pub struct IntentAlarm;

impl PlatformAlarm for IntentAlarm {
    fn set_alarm(&self, seconds: u64, message: &str) -> Result<(), EffectError> {
        let uri = alarm_intent_uri(seconds, message, clock::now_fixed_offset());
        info!(seconds, %uri, "alarm hand-off");
        Ok(())
    }
}

pub struct AlwaysGranted;

impl PermissionRequest for AlwaysGranted {
    fn request(&self) -> Result<bool, EffectError> {
        Ok(true)
    }
}

/// Intent URI that sets a clock alarm `seconds` from `now`.
///
/// The alarm app takes an hour/minute target, so seconds are truncated
/// to the minute of the target time.
pub fn alarm_intent_uri(seconds: u64, message: &str, now: DateTime<FixedOffset>) -> String {
    let secs = i64::try_from(seconds).unwrap_or(i64::MAX);
    let target = Duration::try_seconds(secs)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(now);

    format!(
        "intent:#Intent;action={ALARM_ACTION};launchFlags={FLAG_NEW_TASK};\
         i.{EXTRA_HOUR}={};i.{EXTRA_MINUTES}={};S.{EXTRA_MESSAGE}={};\
         B.{EXTRA_SKIP_UI}=true;end",
        target.hour(),
        target.minute(),
        urlencoding::encode(message),
    )
}
