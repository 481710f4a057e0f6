//! Job management surface exposed to the rest of the bridge (tools, HTTP
//! admin endpoints). Split into a trait over `skynet_scheduler::engine::
//! SchedulerHandle`'s concrete struct so `bridge-tools` can depend on an
//! object-safe interface instead of a SQLite connection.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, SchedulerError};
use crate::schedule::compute_next_run;
use crate::types::{Job, JobStatus, Schedule};

pub trait SchedulerHandle: Send + Sync {
    fn add_job(&self, name: &str, schedule: Schedule, action: &str) -> Result<Job>;
    fn remove_job(&self, id: &str) -> Result<()>;
    fn list_jobs(&self) -> Result<Vec<Job>>;
}

/// SQLite-backed [`SchedulerHandle`]. Holds its own connection so job
/// management can run concurrently with the [`crate::engine::SchedulerEngine`]
/// polling loop, which owns a separate connection to the same database file.
pub struct SqliteSchedulerHandle {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSchedulerHandle {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }
}

impl SchedulerHandle for SqliteSchedulerHandle {
    fn add_job(&self, name: &str, schedule: Schedule, action: &str) -> Result<Job> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let next = compute_next_run(&schedule, now).map(|dt| dt.to_rfc3339());
        let id = Uuid::new_v4().to_string();
        let schedule_json = serde_json::to_string(&schedule)
            .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;

        conn.execute(
            "INSERT INTO jobs
             (id, name, schedule, action, status, last_run, next_run,
              run_count, max_runs, created_at, updated_at)
             VALUES (?1,?2,?3,?4,'pending',NULL,?5,0,NULL,?6,?6)",
            rusqlite::params![id, name, schedule_json, action, next, now_str],
        )?;
        info!(job_id = %id, %name, "job added via handle");
        Ok(Job {
            id,
            name: name.to_string(),
            schedule,
            action: action.to_string(),
            status: JobStatus::Pending,
            last_run: None,
            next_run: next,
            run_count: 0,
            max_runs: None,
            created_at: now_str.clone(),
            updated_at: now_str,
        })
    }

    fn remove_job(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM jobs WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(SchedulerError::JobNotFound { id: id.to_string() });
        }
        info!(job_id = %id, "job removed via handle");
        Ok(())
    }

    fn list_jobs(&self) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, schedule, action, status, last_run, next_run,
                    run_count, max_runs, created_at, updated_at
             FROM jobs ORDER BY created_at",
        )?;
        let jobs = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, u32>(7)?,
                    row.get::<_, Option<u32>>(8)?,
                    row.get::<_, String>(9)?,
                    row.get::<_, String>(10)?,
                ))
            })?
            .filter_map(|r| {
                let (id, name, sched_json, action, status_str, last_run, next_run, run_count, max_runs, created_at, updated_at) = r.ok()?;
                let schedule: Schedule = serde_json::from_str(&sched_json).ok()?;
                let status: JobStatus = status_str.parse().ok()?;
                Some(Job { id, name, schedule, action, status, last_run, next_run, run_count, max_runs, created_at, updated_at })
            })
            .collect();
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> SqliteSchedulerHandle {
        SqliteSchedulerHandle::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn add_then_list_roundtrips() {
        let h = handle();
        let job = h.add_job("reminder", Schedule::Interval { every_secs: 60 }, "{}").unwrap();
        let jobs = h.list_jobs().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, job.id);
    }

    #[test]
    fn remove_missing_job_errors() {
        let h = handle();
        assert!(matches!(h.remove_job("nope"), Err(SchedulerError::JobNotFound { .. })));
    }
}
