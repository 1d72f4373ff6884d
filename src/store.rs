use std::{collections::HashMap, fs, io, path::PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::models::{Routine, ScheduleWindow, Task};

pub const TASKS_KEY: &str = "tasks";
pub const START_TIME_KEY: &str = "start_time";
pub const END_TIME_KEY: &str = "end_time";
pub const ROUTINES_KEY: &str = "routines";

/// Key/value slots the host offers for persistence.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

// One file per key under `dir`, replaced atomically on write
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp_path = path.with_extension("json.tmp");

        fs::create_dir_all(&self.dir)?;
        fs::write(&tmp_path, value)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// Unreadable or malformed slots fall back to the default: a corrupt list
// means a fresh start, not a crash.
fn load_json<T: DeserializeOwned + Default>(store: &impl KeyValueStore, key: &str) -> T {
    let text = match store.get(key) {
        Ok(Some(text)) => text,
        Ok(None) => return T::default(),
        Err(e) => {
            warn!(slot = key, error = %e, "failed to read slot; using empty state");
            return T::default();
        }
    };
    serde_json::from_str(&text).unwrap_or_else(|e| {
        warn!(slot = key, error = %e, "malformed slot; using empty state");
        T::default()
    })
}

fn save_json<T: Serialize + ?Sized>(store: &mut impl KeyValueStore, key: &str, value: &T) -> Result<()> {
    let text = serde_json::to_string(value)?;
    store.set(key, &text)
}

pub fn encode_tasks(tasks: &[Task]) -> Result<String> {
    Ok(serde_json::to_string(tasks)?)
}

pub fn decode_tasks(text: &str) -> Result<Vec<Task>> {
    Ok(serde_json::from_str(text)?)
}

pub fn load_tasks(store: &impl KeyValueStore) -> Vec<Task> {
    let mut tasks: Vec<Task> = load_json(store, TASKS_KEY);
    for t in &mut tasks {
        if t.remaining_time > t.initial_time {
            warn!(task_id = %t.id, "remaining time above budget; clamping");
            t.remaining_time = t.initial_time;
        }
        if !t.is_running && t.last_tick_at.is_some() {
            t.last_tick_at = None;
        }
    }
    tasks
}

pub fn save_tasks(store: &mut impl KeyValueStore, tasks: &[Task]) -> Result<()> {
    save_json(store, TASKS_KEY, tasks)
}

// Window slots hold the raw "HH:MM" text, persisted independently.
pub fn load_window(store: &impl KeyValueStore) -> ScheduleWindow {
    let read = |key: &str| match store.get(key) {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => {
            warn!(slot = key, error = %e, "failed to read slot; treating as unset");
            String::new()
        }
    };
    ScheduleWindow {
        start_time: read(START_TIME_KEY),
        end_time: read(END_TIME_KEY),
    }
}

pub fn save_window(store: &mut impl KeyValueStore, window: &ScheduleWindow) -> Result<()> {
    store.set(START_TIME_KEY, &window.start_time)?;
    store.set(END_TIME_KEY, &window.end_time)
}

pub fn load_routines(store: &impl KeyValueStore) -> Vec<Routine> {
    load_json(store, ROUTINES_KEY)
}

pub fn save_routines(store: &mut impl KeyValueStore, routines: &[Routine]) -> Result<()> {
    save_json(store, ROUTINES_KEY, routines)
}
