//! `reply_to_current` — send a message that replies to the event that
//! triggered this turn, bypassing the normal final-edit flow. Named
//! alongside "react" in the "Tool execution contract" of §6 as a tool that
//! needs `bridge_context.source_event_id`.

use async_trait::async_trait;
use bridge_chatnet::types::{Relation, TimelineEventType};
use serde_json::{json, Value};

use crate::tool::{BridgeContext, Tool, ToolResult};

pub struct ReplyToCurrentTool;

#[async_trait]
impl Tool for ReplyToCurrentTool {
    fn name(&self) -> &str {
        "reply_to_current"
    }

    fn description(&self) -> &str {
        "Send a standalone message in reply to the user's triggering message, \
         instead of (or in addition to) your normal turn response."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "body": {
                    "type": "string",
                    "description": "The text to send as a reply."
                }
            },
            "required": ["body"]
        })
    }

    async fn execute(&self, ctx: &BridgeContext, input: Value) -> ToolResult {
        let body = match input.get("body").and_then(|v| v.as_str()) {
            Some(b) if !b.trim().is_empty() => b.to_string(),
            _ => return ToolResult::error("'body' is required"),
        };
        let Some(room_id) = &ctx.portal.room_id else {
            return ToolResult::error("portal has no room yet");
        };
        let event = TimelineEventType::Message {
            body: body.clone(),
            formatted_body: None,
            dont_render_edited: false,
            extras: None,
        };
        let relation = Relation::Reply {
            event_id: bridge_chatnet::types::EventId(ctx.source_event_id.clone()),
        };
        match ctx
            .network
            .send_timeline_event(room_id, event, Some(relation))
            .await
        {
            Ok(_) => ToolResult::success("Reply sent."),
            Err(e) => ToolResult::error(format!("failed to send reply: {e}")),
        }
    }
}
