/*
Derived views over the task list.
Display grouping and totals; nothing here changes state.
*/

use serde::Serialize;
use uuid::Uuid;

use crate::models::Task;

// Display groups. The store keeps one sequence; these preserve its order.
#[derive(Debug, Clone, Default)]
pub struct Partition<'a> {
    pub pending: Vec<&'a Task>,
    pub skipped: Vec<&'a Task>,
    pub completed: Vec<&'a Task>,
}

impl Partition<'_> {
    /// The same grouping as ids, for hosts that render from a snapshot.
    pub fn ids(&self) -> Groups {
        let ids = |v: &[&Task]| v.iter().map(|t| t.id).collect();
        Groups {
            pending: ids(&self.pending),
            skipped: ids(&self.skipped),
            completed: ids(&self.completed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Groups {
    pub pending: Vec<Uuid>,
    pub skipped: Vec<Uuid>,
    pub completed: Vec<Uuid>,
}

// Totals shown on the stats banner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub pending: usize,
    pub completed: usize,
    pub spent_ms: u64,     // sum of (initial - remaining)
    pub remaining_ms: u64, // sum of remaining, all tasks
}

// Split tasks into pending / skipped / completed.
//
// Rules:
// - pending: not completed and not skipped
// - completed: remaining hit zero or finish edge still set
// - skipped: flagged skipped (a skipped task may also be completed)
pub fn partition(tasks: &[Task]) -> Partition<'_> {
    let mut out = Partition::default();
    for t in tasks {
        if t.is_pending() {
            out.pending.push(t);
        }
        if t.is_skipped {
            out.skipped.push(t);
        }
        if t.is_completed() {
            out.completed.push(t);
        }
    }
    out
}

pub fn stats(tasks: &[Task]) -> TaskStats {
    tasks.iter().fold(TaskStats::default(), |mut acc, t| {
        if t.is_completed() {
            acc.completed += 1;
        } else {
            acc.pending += 1;
        }
        acc.spent_ms += t.spent_ms();
        acc.remaining_ms += t.remaining_time;
        acc
    })
}

/// Workload still ahead: remaining time of every pending task.
pub fn pending_workload_ms(tasks: &[Task]) -> u64 {
    tasks
        .iter()
        .filter(|t| t.is_pending())
        .map(|t| t.remaining_time)
        .sum()
}

pub fn any_running(tasks: &[Task]) -> bool {
    tasks.iter().any(|t| t.is_running)
}
