//! `react` — attach an emoji reaction to the message that triggered the
//! current turn. Named explicitly in the "Tool execution contract" of §6 as
//! a tool that needs `bridge_context.source_event_id`.

use async_trait::async_trait;
use bridge_chatnet::types::{Relation, TimelineEventType};
use serde_json::{json, Value};

use crate::tool::{BridgeContext, Tool, ToolResult};

pub struct ReactTool;

#[async_trait]
impl Tool for ReactTool {
    fn name(&self) -> &str {
        "react"
    }

    fn description(&self) -> &str {
        "React to the user's triggering message with a single emoji, e.g. \
         when a joke lands or a task completes. Does not send a text reply."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "emoji": {
                    "type": "string",
                    "description": "A single emoji to react with, e.g. \"\u{1F44D}\"."
                }
            },
            "required": ["emoji"]
        })
    }

    async fn execute(&self, ctx: &BridgeContext, input: Value) -> ToolResult {
        let emoji = match input.get("emoji").and_then(|v| v.as_str()) {
            Some(e) if !e.trim().is_empty() => e.trim().to_string(),
            _ => return ToolResult::error("'emoji' is required"),
        };
        let event = TimelineEventType::Notice {
            body: emoji.clone(),
        };
        let relation = Relation::Annotation {
            event_id: bridge_chatnet::types::EventId(ctx.source_event_id.clone()),
            key: emoji.clone(),
        };
        let Some(room_id) = &ctx.portal.room_id else {
            return ToolResult::error("portal has no room yet");
        };
        match ctx
            .network
            .send_timeline_event(room_id, event, Some(relation))
            .await
        {
            Ok(_) => ToolResult::success(format!("Reacted with {emoji}")),
            Err(e) => ToolResult::error(format!("failed to send reaction: {e}")),
        }
    }
}
