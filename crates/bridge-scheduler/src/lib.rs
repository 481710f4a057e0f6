//! `bridge-scheduler` — polling job engine with SQLite persistence, plus
//! the in-memory heartbeat-dedupe cache and bootstrap backoff helper the
//! rest of the bridge needs for retry-safe startup (§4.2, §9).

pub mod backoff;
pub mod db;
pub mod engine;
pub mod error;
pub mod handle;
pub mod heartbeat;
pub mod schedule;
pub mod types;

pub use backoff::retry_with_backoff;
pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use handle::{SchedulerHandle, SqliteSchedulerHandle};
pub use heartbeat::HeartbeatCache;
pub use types::{Job, JobStatus, ReminderAction, Schedule, TitleGenerationAction};
