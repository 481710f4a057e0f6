//! Consumes jobs the scheduler fires back (`bridge_scheduler::engine::
//! SchedulerEngine::run`'s `fired_tx`) and routes them by `job.name`:
//! `"reminder"` becomes a direct timeline message in its room, and
//! `"title_generation"` becomes a call into [`crate::title::generate`].

use std::sync::Arc;

use bridge_chatnet::types::{Relation, TimelineEventType};
use bridge_chatnet::ChatNetwork;
use bridge_core::types::{LoginId, RoomId};
use bridge_portals::PortalStore;
use bridge_providers::LlmProvider;
use bridge_scheduler::{Job, ReminderAction, TitleGenerationAction};
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::title;

/// Drive the delivery loop until `rx` closes. One task per `(login,
/// network)` pair — the scheduler itself is shared across logins, but a
/// fired job's `action` only ever targets the room it was scheduled from.
pub async fn run(
    mut rx: mpsc::Receiver<Job>,
    store: Arc<PortalStore>,
    network: Arc<dyn ChatNetwork>,
    provider: Arc<dyn LlmProvider>,
    title_generation_model: String,
    login_id: LoginId,
) {
    while let Some(job) = rx.recv().await {
        match job.name.as_str() {
            "reminder" => {
                if let Err(e) = deliver_reminder(&network, &job.action).await {
                    error!(job_id = %job.id, error = %e, "reminder delivery failed");
                }
            }
            "title_generation" => {
                let action: TitleGenerationAction = match serde_json::from_str(&job.action) {
                    Ok(a) => a,
                    Err(e) => {
                        error!(job_id = %job.id, error = %e, "bad title_generation payload");
                        continue;
                    }
                };
                if let Err(e) = title::generate(
                    &store,
                    &network,
                    provider.as_ref(),
                    &title_generation_model,
                    &login_id,
                    &action,
                )
                .await
                {
                    error!(job_id = %job.id, error = %e, "title generation failed");
                }
            }
            other => {
                warn!(job_id = %job.id, name = %other, "unrecognized job kind, dropping");
            }
        }
    }
}

async fn deliver_reminder(
    network: &Arc<dyn ChatNetwork>,
    action_json: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let action: ReminderAction = serde_json::from_str(action_json)?;
    let room = RoomId(action.room_id);
    network
        .send_timeline_event(
            &room,
            TimelineEventType::Message {
                body: action.message,
                formatted_body: None,
                dont_render_edited: false,
                extras: None,
            },
            None::<Relation>,
        )
        .await?;
    if let Some(url) = action.image_url {
        network
            .send_timeline_event(
                &room,
                TimelineEventType::Notice { body: format!("(attachment: {url})") },
                None,
            )
            .await?;
    }
    Ok(())
}
