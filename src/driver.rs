//! Driver around the pure task store.
//!
//! Owns the task list and schedule window, feeds actions through
//! [`reduce`], fires the side-effect collaborators for tasks that just
//! finished, and persists every transition through the injected
//! [`KeyValueStore`]. [`run`] adds the periodic `Sync` tick, which only
//! fires while some task is running and publishes a snapshot each time.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::effects::Effects;
use crate::feasibility::{self, ClockTime, Feasibility};
use crate::format;
use crate::logic::{self, Groups, TaskStats};
use crate::models::{Routine, ScheduleWindow, Task, TaskPatch, TaskTemplate};
use crate::reducer::{Action, Transition, reduce};
use crate::store::{self, KeyValueStore};

pub const FINISHED_TITLE: &str = "Time's up!";

/// Host-level requests. Task changes go through [`Command::Action`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Action { action: Action },
    SetWindow { start_time: String, end_time: String },
    /// Hours/minutes editor; becomes `SetInitialTime`.
    SetDuration { id: Uuid, hours: u64, minutes: u64 },
    HandOffAlarm { id: Uuid },
    SaveRoutine { name: String },
    LoadRoutine { id: Uuid },
    Snapshot,
}

/// Everything a presentation layer needs after a change.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub groups: Groups,
    pub display: Vec<TaskDisplay>,
    pub stats: TaskStats,
    pub window: ScheduleWindow,
    pub feasibility: Option<Feasibility>,
    pub banner: Option<String>,
    /// Signed surplus/deficit, e.g. "+15m".
    pub surplus: Option<String>,
}

// Pre-formatted per-task text, in task order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDisplay {
    pub id: Uuid,
    pub countdown: String,
    // editor prefill from the budget
    pub hours: u64,
    pub minutes: u64,
}

impl From<&Task> for TaskDisplay {
    fn from(task: &Task) -> Self {
        let (hours, minutes) = format::split_hm(task.initial_time);
        Self {
            id: task.id,
            countdown: format::format_countdown(task.remaining_time),
            hours,
            minutes,
        }
    }
}

pub struct Driver<S> {
    tasks: Vec<Task>,
    window: ScheduleWindow,
    routines: Vec<Routine>,
    store: S,
    effects: Effects,
    clock: Box<dyn Clock>,
}

impl<S: KeyValueStore> Driver<S> {
    /// Restore persisted state; malformed slots start empty.
    pub fn load(store: S, effects: Effects) -> Self {
        Self::with_clock(store, effects, Box::new(SystemClock))
    }

    pub fn with_clock(store: S, effects: Effects, clock: Box<dyn Clock>) -> Self {
        let tasks = store::load_tasks(&store);
        let window = store::load_window(&store);
        let routines = store::load_routines(&store);
        info!(
            tasks = tasks.len(),
            running = tasks.iter().filter(|t| t.is_running).count(),
            routines = routines.len(),
            "state loaded"
        );
        Self {
            tasks,
            window,
            routines,
            store,
            effects,
            clock,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn window(&self) -> &ScheduleWindow {
        &self.window
    }

    pub fn routines(&self) -> &[Routine] {
        &self.routines
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether the Sync tick should be running.
    pub fn is_ticking(&self) -> bool {
        logic::any_running(&self.tasks)
    }

    pub fn dispatch(&mut self, action: Action) -> Vec<Uuid> {
        let now = self.clock.now_ms();
        self.dispatch_at(action, now)
    }

    /// Apply one action at `now` and return the ids that just finished.
    ///
    /// Finished tasks are announced and their finish flag cleared before the
    /// list is persisted, so a reload never replays the announcement.
    pub fn dispatch_at(&mut self, action: Action, now: u64) -> Vec<Uuid> {
        if action == Action::Sync {
            trace!(now, "sync");
        } else {
            debug!(action = action.name(), "dispatch");
        }

        let Transition { tasks, finished } = reduce(&self.tasks, &action, now);
        let changed = tasks != self.tasks;
        self.tasks = tasks;

        for id in &finished {
            self.announce(*id);
            self.tasks = reduce(
                &self.tasks,
                &Action::UpdateFields {
                    id: *id,
                    patch: TaskPatch::clear_finished(),
                },
                now,
            )
            .tasks;
        }

        if matches!(action, Action::Add { .. }) {
            self.request_permission();
        }

        if changed {
            self.persist_tasks();
        }
        finished
    }

    /// Set the feasibility window. Malformed times are stored as unset.
    pub fn set_window(&mut self, start_time: &str, end_time: &str) {
        let normalize = |s: &str| ClockTime::parse(s).map(|c| c.to_string()).unwrap_or_default();
        self.window = ScheduleWindow {
            start_time: normalize(start_time),
            end_time: normalize(end_time),
        };
        info!(
            start = %self.window.start_time,
            end = %self.window.end_time,
            "schedule window set"
        );
        if let Err(e) = store::save_window(&mut self.store, &self.window) {
            warn!(error = %e, "failed to persist schedule window");
        }
    }

    /// Hand the task's remaining time to the platform alarm.
    pub fn hand_off_alarm(&self, id: Uuid) {
        let Some(task) = self.tasks.iter().find(|t| t.id == id) else {
            return;
        };
        if task.remaining_time == 0 {
            return;
        }
        let seconds = task.remaining_time.div_ceil(1_000);
        if let Err(e) = self.effects.alarm.set_alarm(seconds, &task.title) {
            warn!(task_id = %id, error = %e, "platform alarm failed");
        }
    }

    /// Save the current list as a named routine.
    pub fn save_routine(&mut self, name: &str) -> Option<Uuid> {
        let routine = Routine::from_tasks(name, &self.tasks)?;
        let id = routine.id;
        self.routines.push(routine);
        if let Err(e) = store::save_routines(&mut self.store, &self.routines) {
            warn!(error = %e, "failed to persist routines");
        }
        Some(id)
    }

    /// Replace the list with a saved routine.
    pub fn load_routine(&mut self, id: Uuid) -> bool {
        let Some(routine) = self.routines.iter().find(|r| r.id == id) else {
            return false;
        };
        let tasks: Vec<TaskTemplate> = routine.tasks.clone();
        self.dispatch(Action::ImportTemplate { tasks });
        true
    }

    pub fn snapshot(&self) -> Snapshot {
        let workload = logic::pending_workload_ms(&self.tasks);
        let feasibility =
            feasibility::evaluate_window(workload, &self.window, self.clock.now_local());
        Snapshot {
            tasks: self.tasks.clone(),
            groups: logic::partition(&self.tasks).ids(),
            display: self.tasks.iter().map(TaskDisplay::from).collect(),
            stats: logic::stats(&self.tasks),
            window: self.window.clone(),
            banner: feasibility.as_ref().map(Feasibility::summary),
            surplus: feasibility.as_ref().map(|f| format::format_signed(f.diff_ms)),
            feasibility,
        }
    }

    pub fn handle(&mut self, command: Command) {
        match command {
            Command::Action { action } => {
                self.dispatch(action);
            }
            Command::SetWindow {
                start_time,
                end_time,
            } => self.set_window(&start_time, &end_time),
            Command::SetDuration { id, hours, minutes } => {
                self.dispatch(Action::SetInitialTime {
                    id,
                    total_ms: format::hm_to_ms(hours, minutes),
                });
            }
            Command::HandOffAlarm { id } => self.hand_off_alarm(id),
            Command::SaveRoutine { name } => {
                if self.save_routine(&name).is_none() {
                    debug!(%name, "routine not saved: blank name or empty list");
                }
            }
            Command::LoadRoutine { id } => {
                if !self.load_routine(id) {
                    debug!(routine_id = %id, "routine not found");
                }
            }
            Command::Snapshot => {}
        }
    }

    fn announce(&self, id: Uuid) {
        let Some(task) = self.tasks.iter().find(|t| t.id == id) else {
            return;
        };
        info!(task_id = %id, title = %task.title, "task finished");

        if let Err(e) = self.effects.sound.play() {
            warn!(task_id = %id, error = %e, "alert sound failed");
        }
        let body = format!("Task \"{}\" has finished.", task.title);
        if let Err(e) = self.effects.notifier.notify(FINISHED_TITLE, &body) {
            warn!(task_id = %id, error = %e, "notification failed");
        }
    }

    fn request_permission(&self) {
        match self.effects.permission.request() {
            Ok(granted) => debug!(granted, "notification permission"),
            Err(e) => warn!(error = %e, "notification permission request failed"),
        }
    }

    fn persist_tasks(&mut self) {
        if let Err(e) = store::save_tasks(&mut self.store, &self.tasks) {
            warn!(error = %e, "failed to persist tasks");
        }
    }
}

/// Drive `driver` until the command channel closes, then hand it back.
///
/// `on_update` receives a snapshot after every command and after every tick.
/// The tick is only polled while a task is running; missed ticks are skipped
/// since each Sync accounts for the full delta.
pub async fn run<S, F>(
    mut driver: Driver<S>,
    mut commands: mpsc::Receiver<Command>,
    tick: Duration,
    mut on_update: F,
) -> Driver<S>
where
    S: KeyValueStore,
    F: FnMut(Snapshot),
{
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Reconcile tasks left running by a previous session before anything else.
    if driver.is_ticking() {
        driver.dispatch(Action::Sync);
        on_update(driver.snapshot());
    }

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                let was_ticking = driver.is_ticking();
                driver.handle(command);
                if !was_ticking && driver.is_ticking() {
                    interval.reset();
                }
                on_update(driver.snapshot());
            }
            _ = interval.tick(), if driver.is_ticking() => {
                driver.dispatch(Action::Sync);
                on_update(driver.snapshot());
            }
        }
    }

    info!("command channel closed; driver stopped");
    driver
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{AlertSound, Notifier, PermissionRequest, PlatformAlarm};
    use crate::error::EffectError;
    use crate::store::{MemoryStore, TASKS_KEY};
    use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    const T0: u64 = 1_700_000_000_000;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder(Log);

    impl Notifier for Recorder {
        fn notify(&self, title: &str, body: &str) -> Result<(), EffectError> {
            self.0.lock().unwrap().push(format!("notify:{title}:{body}"));
            Ok(())
        }
    }

    impl AlertSound for Recorder {
        fn play(&self) -> Result<(), EffectError> {
            self.0.lock().unwrap().push("sound".into());
            Ok(())
        }
    }

    impl PlatformAlarm for Recorder {
        fn set_alarm(&self, seconds: u64, message: &str) -> Result<(), EffectError> {
            self.0.lock().unwrap().push(format!("alarm:{seconds}:{message}"));
            Ok(())
        }
    }

    impl PermissionRequest for Recorder {
        fn request(&self) -> Result<bool, EffectError> {
            self.0.lock().unwrap().push("permission".into());
            Ok(true)
        }
    }

    struct Broken;

    impl Notifier for Broken {
        fn notify(&self, _: &str, _: &str) -> Result<(), EffectError> {
            Err(EffectError::Unavailable {
                collaborator: "notifier",
                reason: "blocked".into(),
            })
        }
    }

    impl AlertSound for Broken {
        fn play(&self) -> Result<(), EffectError> {
            Err(EffectError::Unavailable {
                collaborator: "sound",
                reason: "no device".into(),
            })
        }
    }

    fn recording() -> (Effects, Log) {
        let log: Log = Arc::default();
        let fx = Effects {
            notifier: Box::new(Recorder(log.clone())),
            sound: Box::new(Recorder(log.clone())),
            alarm: Box::new(Recorder(log.clone())),
            permission: Box::new(Recorder(log.clone())),
        };
        (fx, log)
    }

    #[derive(Clone)]
    struct ManualClock(Arc<AtomicU64>);

    impl Clock for ManualClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }

        fn now_local(&self) -> DateTime<FixedOffset> {
            FixedOffset::east_opt(0)
                .unwrap()
                .from_local_datetime(
                    &NaiveDate::from_ymd_opt(2024, 3, 15)
                        .unwrap()
                        .and_hms_opt(10, 0, 0)
                        .unwrap(),
                )
                .single()
                .unwrap()
        }
    }

    fn driver(store: MemoryStore, fx: Effects) -> (Driver<MemoryStore>, Arc<AtomicU64>) {
        let now = Arc::new(AtomicU64::new(T0));
        let d = Driver::with_clock(store, fx, Box::new(ManualClock(now.clone())));
        (d, now)
    }

    fn add(title: &str, ms: u64) -> Action {
        Action::Add {
            title: title.into(),
            duration_ms: ms,
        }
    }

    #[test]
    fn finish_is_announced_once_and_flag_cleared() {
        let (fx, log) = recording();
        let (mut d, now) = driver(MemoryStore::default(), fx);

        d.dispatch(add("Tea", 1_000));
        let id = d.tasks()[0].id;
        d.dispatch(Action::ToggleTimer { id });

        now.store(T0 + 5_000, Ordering::SeqCst);
        let finished = d.dispatch(Action::Sync);
        assert_eq!(finished, vec![id]);

        let t = &d.tasks()[0];
        assert_eq!(t.remaining_time, 0);
        assert_eq!(t.finished_at, None);
        assert!(t.is_completed());

        // Second sync must not re-announce.
        assert!(d.dispatch(Action::Sync).is_empty());
        let entries = log.lock().unwrap().clone();
        assert_eq!(
            entries,
            vec![
                "permission".to_string(),
                "sound".to_string(),
                "notify:Time's up!:Task \"Tea\" has finished.".to_string(),
            ]
        );
    }

    #[test]
    fn every_change_is_persisted() {
        let (fx, _) = recording();
        let (mut d, _) = driver(MemoryStore::default(), fx);
        d.dispatch(add("A", 60_000));

        let saved = store::load_tasks(d.store());
        assert_eq!(saved, d.tasks());
    }

    #[test]
    fn failing_collaborators_do_not_block_transition() {
        let fx = Effects {
            notifier: Box::new(Broken),
            sound: Box::new(Broken),
            alarm: Box::new(crate::effects::IntentAlarm),
            permission: Box::new(crate::effects::AlwaysGranted),
        };
        let (mut d, now) = driver(MemoryStore::default(), fx);
        d.dispatch(add("A", 1_000));
        let id = d.tasks()[0].id;
        d.dispatch(Action::ToggleTimer { id });
        now.store(T0 + 2_000, Ordering::SeqCst);

        assert_eq!(d.dispatch(Action::Sync), vec![id]);
        assert_eq!(d.tasks()[0].remaining_time, 0);
        assert!(!d.tasks()[0].is_running);
    }

    #[test]
    fn corrupt_state_starts_empty() {
        let mut store = MemoryStore::default();
        store.set(TASKS_KEY, "[{\"broken\":").unwrap();
        let (fx, _) = recording();
        let (d, _) = driver(store, fx);
        assert!(d.tasks().is_empty());
    }

    #[test]
    fn window_is_normalised_and_drives_feasibility() {
        let (fx, _) = recording();
        let (mut d, _) = driver(MemoryStore::default(), fx);
        d.dispatch(add("Report", 30 * 60_000));
        d.set_window("", "10:45");

        let snap = d.snapshot();
        let f = snap.feasibility.unwrap();
        assert_eq!(f.available_ms, 2_700_000);
        assert_eq!(f.diff_ms, 900_000);
        assert_eq!(snap.banner.as_deref(), Some("15m to spare"));

        d.set_window("garbage", "7:5");
        assert_eq!(d.window().start_time, "");
        assert_eq!(d.window().end_time, "07:05");
        assert_eq!(store::load_window(d.store()), d.window().clone());
    }

    #[test]
    fn alarm_hand_off_uses_remaining_seconds() {
        let (fx, log) = recording();
        let (mut d, _) = driver(MemoryStore::default(), fx);
        d.dispatch(add("Oven", 90_500));
        let id = d.tasks()[0].id;

        d.hand_off_alarm(id);
        d.hand_off_alarm(Uuid::new_v4());
        assert_eq!(log.lock().unwrap().last().unwrap(), "alarm:91:Oven");
    }

    #[test]
    fn routine_save_and_load() {
        let (fx, _) = recording();
        let (mut d, _) = driver(MemoryStore::default(), fx);
        assert!(d.save_routine("Empty").is_none());

        d.dispatch(add("Warm up", 300_000));
        d.dispatch(add("Run", 1_800_000));
        let routine_id = d.save_routine("Morning").unwrap();
        let old_ids: Vec<Uuid> = d.tasks().iter().map(|t| t.id).collect();

        d.dispatch(Action::Delete { id: old_ids[0] });
        assert!(d.load_routine(routine_id));
        assert_eq!(d.tasks().len(), 2);
        assert!(d.tasks().iter().all(|t| !old_ids.contains(&t.id)));
        assert_eq!(store::load_routines(d.store()).len(), 1);
    }

    #[test]
    fn command_json_shape() {
        let c: Command = serde_json::from_str(
            r#"{"command":"action","action":{"type":"toggle_timer","id":"6f1c1a4e-54b4-4a5e-9d5e-0c9e0f7b2d11"}}"#,
        )
        .unwrap();
        assert!(matches!(
            c,
            Command::Action {
                action: Action::ToggleTimer { .. }
            }
        ));
    }

    #[test]
    fn snapshot_carries_groups_and_display_text() {
        let (fx, _) = recording();
        let (mut d, _) = driver(MemoryStore::default(), fx);
        d.dispatch(add("Long", 90 * 60_000));
        d.dispatch(add("Short", 61_500));
        let ids: Vec<Uuid> = d.tasks().iter().map(|t| t.id).collect();
        d.dispatch(Action::SkipTask { id: ids[1] });
        d.set_window("", "10:20");

        let snap = d.snapshot();
        assert_eq!(snap.groups.pending, vec![ids[0]]);
        assert_eq!(snap.groups.skipped, vec![ids[1]]);
        assert!(snap.groups.completed.is_empty());

        assert_eq!(snap.display[0].countdown, "1:30:00");
        assert_eq!((snap.display[0].hours, snap.display[0].minutes), (1, 30));
        assert_eq!(snap.display[1].countdown, "01:02");
        assert_eq!(snap.surplus.as_deref(), Some("-1h 10m"));
    }

    #[test]
    fn set_duration_command_resets_budget() {
        let (fx, _) = recording();
        let (mut d, _) = driver(MemoryStore::default(), fx);
        d.dispatch(add("Read", 60_000));
        let id = d.tasks()[0].id;

        d.handle(Command::SetDuration {
            id,
            hours: 1,
            minutes: 15,
        });
        assert_eq!(d.tasks()[0].initial_time, 75 * 60_000);
        assert_eq!(d.tasks()[0].remaining_time, 75 * 60_000);

        let c: Command = serde_json::from_str(&format!(
            r#"{{"command":"set_duration","id":"{id}","hours":0,"minutes":5}}"#
        ))
        .unwrap();
        d.handle(c);
        assert_eq!(d.tasks()[0].initial_time, 5 * 60_000);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_publishes_countdown_while_running() {
        let (fx, _) = recording();
        let (d, now) = driver(MemoryStore::default(), fx);
        let (tx, rx) = mpsc::channel(8);
        let (snap_tx, mut snap_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(run(d, rx, Duration::from_millis(20), move |s| {
            let _ = snap_tx.send(s);
        }));

        tx.send(Command::Action {
            action: add("Focus", 60_000),
        })
        .await
        .unwrap();
        let id = snap_rx.recv().await.unwrap().tasks[0].id;

        tx.send(Command::Action {
            action: Action::ToggleTimer { id },
        })
        .await
        .unwrap();
        assert!(snap_rx.recv().await.unwrap().tasks[0].is_running);

        // No further commands: only the tick can publish from here on.
        now.store(T0 + 1_500, Ordering::SeqCst);
        let mut remaining = 60_000;
        for _ in 0..10 {
            let snap = tokio::time::timeout(Duration::from_secs(1), snap_rx.recv())
                .await
                .unwrap()
                .unwrap();
            remaining = snap.tasks[0].remaining_time;
            if remaining < 60_000 {
                assert!(snap.tasks[0].is_running);
                assert_eq!(snap.display[0].countdown, "00:59");
                break;
            }
        }
        assert_eq!(remaining, 58_500);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_ticks_until_task_finishes() {
        let (fx, log) = recording();
        let (d, now) = driver(MemoryStore::default(), fx);
        let (tx, rx) = mpsc::channel(8);
        let (snap_tx, mut snap_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(run(d, rx, Duration::from_millis(5), move |s| {
            let _ = snap_tx.send(s);
        }));

        tx.send(Command::Action {
            action: add("Tea", 1_000),
        })
        .await
        .unwrap();
        let snap = snap_rx.recv().await.unwrap();
        let id = snap.tasks[0].id;

        tx.send(Command::Action {
            action: Action::ToggleTimer { id },
        })
        .await
        .unwrap();
        let snap = snap_rx.recv().await.unwrap();
        assert!(snap.tasks[0].is_running);

        now.store(T0 + 10_000, Ordering::SeqCst);
        let mut snap = snap_rx.recv().await.unwrap();
        while snap.tasks[0].is_running {
            snap = tokio::time::timeout(Duration::from_secs(5), snap_rx.recv())
                .await
                .unwrap()
                .unwrap();
        }
        assert_eq!(snap.tasks[0].remaining_time, 0);
        assert!(!snap.tasks[0].is_running);
        assert_eq!(snap.stats.completed, 1);

        drop(tx);
        let d = handle.await.unwrap();
        assert!(!d.is_ticking());
        assert!(log.lock().unwrap().contains(&"sound".to_string()));
    }
}
