//! The `Tool`/`ToolExecutor` contract — §4.7.6 and the "Tool execution
//! contract" of §6.
//!
//! Grounded in `skynet_agent::tools::{Tool, ToolResult, to_definitions}`,
//! with `BridgeContext` added to carry the portal/metadata/client/
//! triggering-event handle tools like "react" and "reply_to_current" need.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_chatnet::ChatNetwork;
use bridge_core::types::{Portal, PortalMetadata};
use bridge_providers::ToolDefinition;
use serde::{Deserialize, Serialize};

/// Result of executing a tool — becomes the `tool-result` timeline event
/// body and a `function_call_output` on the continuation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: false }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { content: format!("Error: {}", message.into()), is_error: true }
    }

    /// Special payload prefixes (§4.7.5) that mark out-of-band media
    /// delivery instead of a literal tool-result body.
    pub fn audio_payload(&self) -> Option<&str> {
        self.content.strip_prefix("AUDIO:")
    }

    pub fn image_payload(&self) -> Option<&str> {
        self.content.strip_prefix("IMAGE:")
    }
}

/// Everything a tool needs about the turn it's executing inside: the portal
/// it belongs to, that portal's metadata, a handle to the chat network, and
/// the event id of the message that triggered this turn.
pub struct BridgeContext {
    pub portal: Portal,
    pub metadata: PortalMetadata,
    pub network: Arc<dyn ChatNetwork>,
    pub source_event_id: String,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;
    async fn execute(&self, ctx: &BridgeContext, input: serde_json::Value) -> ToolResult;
}

pub fn to_definitions(tools: &[Arc<dyn Tool>]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect()
}
