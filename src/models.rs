use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Title used when a task is added with a blank title.
pub const DEFAULT_TITLE: &str = "New task";

// Persisted task record. Field names match the stored JSON (camelCase)
// so a saved list re-serializes byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub initial_time: u64,   // budget, ms
    pub remaining_time: u64, // ms, within 0..=initial_time
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub last_tick_at: Option<u64>, // epoch ms, None whenever not running
    #[serde(default)]
    pub is_skipped: bool,
    #[serde(default)]
    pub skipped_at: Option<u64>,
    #[serde(default)]
    pub finished_at: Option<u64>, // one-shot "just completed" edge
}

impl Task {
    pub fn new(title: impl Into<String>, duration_ms: u64) -> Self {
        let title = title.into();
        let title = if title.trim().is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            title
        };
        Self {
            id: Uuid::new_v4(),
            title,
            initial_time: duration_ms,
            remaining_time: duration_ms,
            is_running: false,
            last_tick_at: None,
            is_skipped: false,
            skipped_at: None,
            finished_at: None,
        }
    }

    /// Completed either by running out or by carrying an unconsumed finish edge.
    pub fn is_completed(&self) -> bool {
        self.remaining_time == 0 || self.finished_at.is_some()
    }

    pub fn is_pending(&self) -> bool {
        !self.is_completed() && !self.is_skipped
    }

    /// Milliseconds already consumed from the budget.
    pub fn spent_ms(&self) -> u64 {
        self.initial_time.saturating_sub(self.remaining_time)
    }

    pub(crate) fn stop(&mut self) {
        self.is_running = false;
        self.last_tick_at = None;
    }

    pub(crate) fn restore(&mut self) {
        self.remaining_time = self.initial_time;
        self.finished_at = None;
        self.stop();
    }
}

/// Title/duration pair a routine is made of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub title: String,
    pub initial_time: u64,
}

impl From<&Task> for TaskTemplate {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            initial_time: task.initial_time,
        }
    }
}

/// Named, reusable list of task templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    pub id: Uuid,
    pub name: String,
    pub tasks: Vec<TaskTemplate>,
}

impl Routine {
    /// Snapshot the current list as a routine. Returns None for a blank name
    /// or an empty list.
    pub fn from_tasks(name: &str, tasks: &[Task]) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() || tasks.is_empty() {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            tasks: tasks.iter().map(TaskTemplate::from).collect(),
        })
    }
}

/// Partial update merged into a task.
///
/// `finished_at` distinguishes "absent" (leave alone) from `null` (clear).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub finished_at: Option<Option<u64>>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn clear_finished() -> Self {
        Self {
            finished_at: Some(None),
            ..Self::default()
        }
    }
}

fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

// Feasibility window as persisted: "HH:MM" strings, empty when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub start_time: String,
    pub end_time: String,
}
