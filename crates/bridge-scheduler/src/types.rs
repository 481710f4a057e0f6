//! Job/schedule value types. Kept identical in shape to
//! `skynet_scheduler::types` — the teacher's scheduler needs no
//! generalization for the bridge's single use (reminders, title generation
//! fire-and-forget timeouts, duplicate-heartbeat TTLs all build on the same
//! `Schedule`/`Job` vocabulary).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    Once { at: DateTime<Utc> },
    Interval { every_secs: u64 },
    Daily { hour: u8, minute: u8 },
    Weekly { day: u8, hour: u8, minute: u8 },
    Cron { expression: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Missed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Missed => "missed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "missed" => Ok(JobStatus::Missed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub schedule: Schedule,
    pub action: String,
    pub status: JobStatus,
    pub last_run: Option<String>,
    pub next_run: Option<String>,
    pub run_count: u32,
    pub max_runs: Option<u32>,
    pub created_at: String,
    pub updated_at: String,
}

/// Opaque payload for a `"reminder"` job, deserialized from `Job::action`.
/// Narrower than `skynet_agent::tools::reminder::ReminderAction`: the bridge
/// has exactly one chat network and one room target per job, not a choice
/// of channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderAction {
    pub room_id: String,
    pub message: String,
    pub image_url: Option<String>,
}

/// Opaque payload for a `"title_generation"` job — §4.9 fire-and-forget
/// title generation, scheduled with a bounded timeout instead of a
/// user-facing reminder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleGenerationAction {
    pub room_id: String,
    pub portal_id: String,
}
