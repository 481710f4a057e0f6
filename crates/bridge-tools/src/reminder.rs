//! `reminder` tool — schedule a proactive reminder that the scheduler engine
//! fires back into the owning portal's room. Grounded in
//! `skynet_agent::tools::reminder::ReminderTool`, narrowed to the single
//! chat-network delivery target a portal already has (no cross-channel
//! routing, since the bridge has exactly one chat network per §1).

use async_trait::async_trait;
use bridge_scheduler::{ReminderAction, Schedule, SchedulerHandle};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::tool::{BridgeContext, Tool, ToolResult};

pub struct ReminderTool {
    scheduler: std::sync::Arc<dyn SchedulerHandle>,
}

impl ReminderTool {
    pub fn new(scheduler: std::sync::Arc<dyn SchedulerHandle>) -> Self {
        Self { scheduler }
    }

    fn parse_recurring(s: &str) -> Result<Schedule, String> {
        let mut parts = s.splitn(2, '|');
        let kind = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("");
        match kind {
            "daily" => {
                let mut time = rest.splitn(2, ':');
                let hour: u8 = time.next().unwrap_or("").parse().map_err(|_| "daily|HH:MM — invalid hour".to_string())?;
                let minute: u8 = time.next().unwrap_or("").parse().map_err(|_| "daily|HH:MM — invalid minute".to_string())?;
                if hour > 23 || minute > 59 {
                    return Err(format!("daily|HH:MM — time {hour:02}:{minute:02} is out of range"));
                }
                Ok(Schedule::Daily { hour, minute })
            }
            "interval" => {
                let secs: u64 = rest.parse().map_err(|_| "interval|N — N must be a positive integer".to_string())?;
                if secs == 0 {
                    return Err("interval|N — N must be greater than 0".to_string());
                }
                Ok(Schedule::Interval { every_secs: secs })
            }
            other => Err(format!("unknown recurring type '{other}': use 'daily|HH:MM' or 'interval|N'")),
        }
    }

    async fn add(&self, ctx: &BridgeContext, input: &Value) -> ToolResult {
        let message = match input.get("message").and_then(|v| v.as_str()) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => return ToolResult::error("'message' is required for the add action"),
        };
        let Some(room_id) = &ctx.portal.room_id else {
            return ToolResult::error("portal has no room yet");
        };

        let schedule = if let Some(recurring) = input.get("recurring").and_then(|v| v.as_str()) {
            match Self::parse_recurring(recurring) {
                Ok(s) => s,
                Err(msg) => return ToolResult::error(msg),
            }
        } else if let Some(fire_at) = input.get("fire_at").and_then(|v| v.as_str()) {
            match chrono::DateTime::parse_from_rfc3339(fire_at) {
                Ok(dt) => Schedule::Once { at: dt.with_timezone(&Utc) },
                Err(e) => return ToolResult::error(format!("invalid fire_at datetime: {e}")),
            }
        } else if let Some(secs) = input.get("fire_in_seconds").and_then(|v| v.as_i64()) {
            if secs <= 0 {
                return ToolResult::error("fire_in_seconds must be a positive integer");
            }
            Schedule::Once { at: Utc::now() + Duration::seconds(secs) }
        } else {
            return ToolResult::error("one of 'fire_at', 'fire_in_seconds', or 'recurring' is required for add");
        };

        let action = ReminderAction {
            room_id: room_id.0.clone(),
            message: message.clone(),
            image_url: input.get("image_url").and_then(|v| v.as_str()).map(String::from),
        };
        let action_json = match serde_json::to_string(&action) {
            Ok(s) => s,
            Err(e) => return ToolResult::error(format!("serialization error: {e}")),
        };

        match self.scheduler.add_job("reminder", schedule, &action_json) {
            Ok(job) => ToolResult::success(format!(
                "Reminder scheduled!\n- Job ID: {}\n- Message: {}\n- Fires at: {}",
                job.id,
                message,
                job.next_run.as_deref().unwrap_or("unknown"),
            )),
            Err(e) => ToolResult::error(format!("failed to schedule reminder: {e}")),
        }
    }

    fn list(&self) -> ToolResult {
        match self.scheduler.list_jobs() {
            Ok(jobs) if jobs.is_empty() => ToolResult::success("No reminders scheduled."),
            Ok(jobs) => {
                let mut out = format!("Scheduled reminders ({}):\n", jobs.len());
                for job in &jobs {
                    out.push_str(&format!(
                        "- ID: {} | Next: {} | Runs: {}\n",
                        job.id,
                        job.next_run.as_deref().unwrap_or("N/A"),
                        job.run_count,
                    ));
                }
                ToolResult::success(out)
            }
            Err(e) => ToolResult::error(format!("failed to list reminders: {e}")),
        }
    }

    fn remove(&self, input: &Value) -> ToolResult {
        let job_id = match input.get("job_id").and_then(|v| v.as_str()) {
            Some(id) if !id.is_empty() => id,
            _ => return ToolResult::error("'job_id' is required for the remove action"),
        };
        match self.scheduler.remove_job(job_id) {
            Ok(()) => ToolResult::success(format!("Reminder '{job_id}' removed.")),
            Err(e) => ToolResult::error(format!("failed to remove reminder: {e}")),
        }
    }
}

#[async_trait]
impl Tool for ReminderTool {
    fn name(&self) -> &str {
        "reminder"
    }

    fn description(&self) -> &str {
        "ALWAYS use this tool when the user asks to be reminded or notified at a \
         future time. Actions: 'add' (create), 'list' (view all), 'remove' (cancel by job_id)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["add", "list", "remove"] },
                "message": { "type": "string", "description": "Text to deliver when the reminder fires. Required for add." },
                "fire_at": { "type": "string", "description": "ISO-8601 UTC datetime. Mutually exclusive with fire_in_seconds." },
                "fire_in_seconds": { "type": "integer", "description": "Seconds from now. Mutually exclusive with fire_at." },
                "recurring": { "type": "string", "description": "'daily|HH:MM' (UTC) or 'interval|N' seconds. Overrides fire_at/fire_in_seconds." },
                "image_url": { "type": "string", "description": "Optional image URL to include." },
                "job_id": { "type": "string", "description": "Job ID returned by a previous add. Required for remove." }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, ctx: &BridgeContext, input: Value) -> ToolResult {
        let action = match input.get("action").and_then(|v| v.as_str()) {
            Some(a) => a,
            None => return ToolResult::error("missing required field 'action'"),
        };
        match action {
            "add" => self.add(ctx, &input).await,
            "list" => self.list(),
            "remove" => self.remove(&input),
            other => ToolResult::error(format!("unknown action '{other}': must be 'add', 'list', or 'remove'")),
        }
    }
}
