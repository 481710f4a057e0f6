//! §4.7.5 turn finalization: directive processing, pending-image delivery,
//! Markdown rendering, link previews, the `com.beeper.ai` metadata block,
//! the final edit event, message-log persistence, stateful
//! `last_response_id` bookkeeping, and fire-and-forget title-generation
//! scheduling, off one accumulated text buffer. Images are delivered before
//! the final edit so their event ids can be named in its metadata block.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bridge_chatnet::types::{EventId, MediaUpload, Relation, TimelineEventType};
use bridge_chatnet::ChatNetwork;
use bridge_core::types::{Message, Portal, Provider, RoomId};
use bridge_linkpreview::{fetch_all, LinkFetcher};
use bridge_portals::PortalStore;
use bridge_scheduler::SchedulerHandle;
use tracing::warn;

use crate::directive::{self, Directives};
use crate::error::Result;
use crate::markdown;
use crate::turn_state::PendingImage;

pub struct FinalizeInput {
    pub raw_text: String,
    pub turn_id: String,
    pub model: String,
    pub response_id: Option<String>,
    pub provider_is_stateless: bool,
    pub pending_images: Vec<PendingImage>,
    pub tool_call_event_ids: Vec<EventId>,
    pub max_urls_outbound: usize,
    pub fetch_timeout_ms: u64,
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// Run the full finalization pipeline for one completed turn, mutating
/// `portal` and `message` in place and persisting both.
pub async fn finalize_turn(
    network: &Arc<dyn ChatNetwork>,
    fetcher: &dyn LinkFetcher,
    scheduler: &dyn SchedulerHandle,
    store: &PortalStore,
    portal: &mut Portal,
    login_provider: Provider,
    mut message: Message,
    initial_event_id: EventId,
    input: FinalizeInput,
) -> Result<Directives> {
    let room_id = portal
        .room_id
        .clone()
        .unwrap_or_else(|| RoomId(String::new()));

    // 1. Directive processing — raw mode emits verbatim, natural mode strips.
    let (body, directives) = if portal.metadata.is_raw_mode {
        (input.raw_text.clone(), Directives::default())
    } else {
        directive::process(&input.raw_text)
    };

    // Deliver any images the model produced inline before the final edit, so
    // their event ids are known by the time the AI metadata block is built.
    let mut image_event_ids: Vec<EventId> = Vec::new();
    for image in &input.pending_images {
        let Ok(data) = BASE64.decode(image.base64.as_bytes()) else {
            warn!(turn_id = %input.turn_id, "failed to decode pending image payload, skipping");
            continue;
        };
        let filename = format!("turn-{}.{}", input.turn_id, extension_for_mime(&image.mime));
        if let Err(e) = network
            .upload_media(MediaUpload { mime: image.mime.clone(), data: data.clone(), filename })
            .await
        {
            warn!(turn_id = %input.turn_id, error = %e, "image upload failed, sending inline instead");
        }
        match network
            .send_timeline_event(
                &room_id,
                TimelineEventType::Image { body: format!("turn:{}", input.turn_id), mime: image.mime.clone(), data },
                None,
            )
            .await
        {
            Ok(id) => image_event_ids.push(id),
            Err(e) => warn!(turn_id = %input.turn_id, error = %e, "failed to deliver inline image"),
        }
    }

    if directives.silent {
        // 5 (silent variant). No visible reply: drop the streamed placeholder
        // instead of editing it into a final message.
        if let Err(e) = network.redact(&room_id, &initial_event_id).await {
            warn!(event_id = %initial_event_id, error = %e, "failed to redact silent turn's placeholder");
        }
    } else {
        // 2. Markdown render.
        let formatted_body = markdown::render(&body);

        // 3. Link previews, bounded by outbound URL count and a shared timeout.
        let previews = fetch_all(
            fetcher,
            &body,
            input.max_urls_outbound,
            Duration::from_millis(input.fetch_timeout_ms),
        )
        .await;

        // 4. AI metadata block — §6 "Message extras key `com.beeper.ai`".
        let thinking = message.metadata.thinking_content.as_ref().map(|content| {
            serde_json::json!({
                "content": content,
                "token_count": message.metadata.reasoning_tokens,
            })
        });
        let extras = serde_json::json!({
            "com.beeper.ai": {
                "turn_id": input.turn_id,
                "agent_id": message.metadata.agent_id,
                "model": input.model,
                "status": "completed",
                "finish_reason": message.metadata.finish_reason,
                "timing": {
                    "started_at": message.metadata.started_at,
                    "first_token_at": message.metadata.first_token_at,
                    "completed_at": message.metadata.completed_at,
                },
                "thinking": thinking,
                "tool_calls": input.tool_call_event_ids,
                "images": image_event_ids,
                "usage": {
                    "prompt_tokens": message.metadata.prompt_tokens,
                    "completion_tokens": message.metadata.completion_tokens,
                    "reasoning_tokens": message.metadata.reasoning_tokens,
                },
                "completion_id": message.metadata.completion_id,
                "link_previews": previews,
            }
        });

        // 5. Final edit, replacing the initial streamed event.
        let relation = Relation::Replace { event_id: initial_event_id.clone() };
        network
            .send_timeline_event(
                &room_id,
                TimelineEventType::Message {
                    body: format!("* {body}"),
                    formatted_body: Some(formatted_body),
                    dont_render_edited: true,
                    extras: Some(extras),
                },
                Some(relation),
            )
            .await?;
    }

    // 6. Persist the assistant turn to the message log — a silent turn
    // leaves no trace: no final edit, and no DB row either (§8 scenario 6).
    if !directives.silent {
        message.metadata.body = body;
        message.metadata.model = input.model.clone();
        message.metadata.turn_id = input.turn_id.clone();
        store.append_message(&message)?;
    }

    // 7. Stateful providers keep a response cursor instead of resending history.
    if portal.metadata.conversation_mode == bridge_core::types::ConversationMode::Responses
        && !input.provider_is_stateless
    {
        if let Some(response_id) = input.response_id {
            portal.metadata.last_response_id = response_id;
        }
    }
    store.save(portal)?;

    // 9. Fire-and-forget title generation — never blocks turn completion.
    if let Err(e) = crate::title::schedule(scheduler, portal, login_provider) {
        warn!(portal = %portal.key, error = %e, "failed to schedule title generation");
    }

    Ok(directives)
}
