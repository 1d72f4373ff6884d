// Define data modules
pub mod models;      // Data structures (Task, TaskTemplate, Routine, ScheduleWindow)
pub mod reducer;     // Task store transitions
pub mod logic;       // Derived views: partition, stats, workload
pub mod feasibility; // Workload vs. today's window
pub mod format;      // Time display helpers
pub mod clock;       // Wall-clock sources
pub mod store;       // Persistent key/value slots
pub mod effects;     // Notification / sound / alarm collaborators
pub mod driver;      // Dispatch, side effects, persistence and the tick loop
pub mod config;      // Runtime settings
pub mod error;

pub use driver::{Command, Driver, Snapshot};
pub use models::{Task, TaskTemplate};
pub use reducer::{Action, Transition, reduce};
