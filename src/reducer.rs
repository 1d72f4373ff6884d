/*
Task store transitions.
Pure: (current tasks, action, wall-clock now) -> new tasks.
Kept apart from the driver and storage so it can be tested on its own.
*/

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Task, TaskPatch, TaskTemplate};

// Every user or tick event the store understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Add { title: String, duration_ms: u64 },
    Delete { id: Uuid },
    UpdateFields { id: Uuid, patch: TaskPatch },
    ResetTimer { id: Uuid },
    // Reconcile running tasks against the `now` handed to `reduce`.
    Sync,
    ToggleTimer { id: Uuid },
    SetInitialTime { id: Uuid, total_ms: u64 },
    UpdateRemainingTime { id: Uuid, remaining_ms: u64 },
    MoveTask { from_id: Uuid, to_id: Uuid },
    SkipTask { id: Uuid },
    RestoreTask { id: Uuid },
    RestoreAllCompleted,
    RestoreSkipped { id: Uuid },
    RestoreAllSkipped,
    ImportTemplate { tasks: Vec<TaskTemplate> },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Add { .. } => "add",
            Action::Delete { .. } => "delete",
            Action::UpdateFields { .. } => "update_fields",
            Action::ResetTimer { .. } => "reset_timer",
            Action::Sync => "sync",
            Action::ToggleTimer { .. } => "toggle_timer",
            Action::SetInitialTime { .. } => "set_initial_time",
            Action::UpdateRemainingTime { .. } => "update_remaining_time",
            Action::MoveTask { .. } => "move_task",
            Action::SkipTask { .. } => "skip_task",
            Action::RestoreTask { .. } => "restore_task",
            Action::RestoreAllCompleted => "restore_all_completed",
            Action::RestoreSkipped { .. } => "restore_skipped",
            Action::RestoreAllSkipped => "restore_all_skipped",
            Action::ImportTemplate { .. } => "import_template",
        }
    }
}

/// Result of one transition.
///
/// `finished` lists the tasks whose countdown reached zero during this
/// transition, in sequence order. Only `Sync` ever fills it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub tasks: Vec<Task>,
    pub finished: Vec<Uuid>,
}

impl Transition {
    fn unchanged(tasks: &[Task]) -> Self {
        Self::of(tasks.to_vec())
    }

    fn of(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            finished: Vec::new(),
        }
    }
}

/// Apply one action. Unknown ids are no-ops; the input slice is never mutated.
pub fn reduce(tasks: &[Task], action: &Action, now: u64) -> Transition {
    match action {
        Action::Add { title, duration_ms } => {
            let mut next = tasks.to_vec();
            next.push(Task::new(title.as_str(), *duration_ms));
            Transition::of(next)
        }

        Action::Delete { id } => {
            Transition::of(tasks.iter().filter(|t| t.id != *id).cloned().collect())
        }

        Action::UpdateFields { id, patch } => Transition::of(update(tasks, *id, |t| {
            if let Some(title) = &patch.title {
                t.title = title.clone();
            }
            if let Some(finished_at) = patch.finished_at {
                t.finished_at = finished_at;
            }
        })),

        Action::ResetTimer { id } => Transition::of(update(tasks, *id, |t| {
            t.remaining_time = t.initial_time;
            t.stop();
        })),

        Action::Sync => sync(tasks, now),

        Action::ToggleTimer { id } => toggle(tasks, *id, now),

        Action::SetInitialTime { id, total_ms } => {
            if *total_ms == 0 {
                return Transition::unchanged(tasks);
            }
            Transition::of(update(tasks, *id, |t| {
                t.initial_time = *total_ms;
                t.remaining_time = *total_ms;
                t.stop();
            }))
        }

        Action::UpdateRemainingTime { id, remaining_ms } => {
            Transition::of(update(tasks, *id, |t| {
                t.remaining_time = (*remaining_ms).min(t.initial_time);
                // Restart the delta so time since the last sync is not taken twice.
                t.last_tick_at = if t.is_running { Some(now) } else { None };
            }))
        }

        Action::MoveTask { from_id, to_id } => move_task(tasks, *from_id, *to_id),

        Action::SkipTask { id } => Transition::of(update(tasks, *id, |t| {
            t.stop();
            t.is_skipped = true;
            t.skipped_at = Some(now);
        })),

        Action::RestoreTask { id } => Transition::of(update(tasks, *id, Task::restore)),

        Action::RestoreAllCompleted => Transition::of(
            tasks
                .iter()
                .map(|t| {
                    let mut t = t.clone();
                    if t.is_completed() {
                        t.restore();
                    }
                    t
                })
                .collect(),
        ),

        Action::RestoreSkipped { id } => Transition::of(update(tasks, *id, unskip)),

        Action::RestoreAllSkipped => Transition::of(
            tasks
                .iter()
                .map(|t| {
                    let mut t = t.clone();
                    if t.is_skipped {
                        unskip(&mut t);
                    }
                    t
                })
                .collect(),
        ),

        Action::ImportTemplate { tasks: template } => Transition::of(
            template
                .iter()
                .map(|tpl| Task::new(tpl.title.as_str(), tpl.initial_time))
                .collect(),
        ),
    }
}

fn update(tasks: &[Task], id: Uuid, f: impl FnOnce(&mut Task)) -> Vec<Task> {
    let mut next = tasks.to_vec();
    if let Some(t) = next.iter_mut().find(|t| t.id == id) {
        f(t);
    }
    next
}

fn unskip(t: &mut Task) {
    t.is_skipped = false;
    t.skipped_at = None;
}

// Delta-based: a late tick subtracts the whole gap in one step.
fn sync(tasks: &[Task], now: u64) -> Transition {
    let mut finished = Vec::new();
    let next = tasks
        .iter()
        .map(|t| {
            let mut t = t.clone();
            if !t.is_running {
                return t;
            }

            // Missing tick counts as no elapsed time; a clock going backwards too.
            let delta = now.saturating_sub(t.last_tick_at.unwrap_or(now));
            let remaining = t.remaining_time.saturating_sub(delta);

            if remaining == 0 {
                t.remaining_time = 0;
                t.stop();
                t.finished_at = Some(now);
                finished.push(t.id);
            } else {
                t.remaining_time = remaining;
                t.last_tick_at = Some(now);
            }
            t
        })
        .collect();

    Transition {
        tasks: next,
        finished,
    }
}

fn toggle(tasks: &[Task], id: Uuid, now: u64) -> Transition {
    let Some(idx) = tasks.iter().position(|t| t.id == id) else {
        return Transition::unchanged(tasks);
    };

    let mut next = tasks.to_vec();

    if next[idx].is_running {
        // Pausing leaves the task where it is.
        next[idx].stop();
        return Transition::of(next);
    }

    if next[idx].remaining_time == 0 {
        return Transition::of(next);
    }

    // Most recently started task surfaces first.
    let mut task = next.remove(idx);
    task.is_running = true;
    task.last_tick_at = Some(now);
    next.insert(0, task);
    Transition::of(next)
}

// Splice semantics: the moved task takes the target's slot, others shift.
fn move_task(tasks: &[Task], from_id: Uuid, to_id: Uuid) -> Transition {
    if from_id == to_id {
        return Transition::unchanged(tasks);
    }
    let from = tasks.iter().position(|t| t.id == from_id);
    let to = tasks.iter().position(|t| t.id == to_id);
    let (Some(from), Some(to)) = (from, to) else {
        return Transition::unchanged(tasks);
    };

    let mut next = tasks.to_vec();
    let moved = next.remove(from);
    next.insert(to, moved);
    Transition::of(next)
}
