//! Wire shapes for the chat-network surface named in §6 "External
//! interfaces" — custom event types, relation kinds, and the membership/media
//! primitives a `ChatNetwork` implementation must support.

use serde::{Deserialize, Serialize};

use bridge_core::types::RoomId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventId(pub String);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `m.relates_to`-style relation attached to a timeline event — §3 invariant 7.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "rel_type", rename_all = "snake_case")]
pub enum Relation {
    Reference { event_id: EventId },
    Replace { event_id: EventId },
    Reply { event_id: EventId },
    Annotation { event_id: EventId, key: String },
}

/// Custom timeline event types — §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TimelineEventType {
    #[serde(rename = "com.beeper.ai.stream_token")]
    LegacyStreamToken { content: String },
    #[serde(rename = "stream-delta")]
    StreamDelta {
        kind: StreamDeltaKind,
        content: String,
        seq: u64,
        call_id: Option<String>,
        tool_name: Option<String>,
    },
    #[serde(rename = "generation-status")]
    GenerationStatus { status: String },
    #[serde(rename = "tool-progress")]
    ToolProgress { call_id: String, status: String },
    #[serde(rename = "tool-call")]
    ToolCall {
        call_id: String,
        name: String,
        arguments: serde_json::Value,
        call_kind: ToolCallKind,
    },
    #[serde(rename = "tool-result")]
    ToolResult {
        call_id: String,
        body: String,
        is_error: bool,
    },
    #[serde(rename = "compaction-status")]
    CompactionStatus { phase: CompactionPhase },
    /// A plain chat message (initial stream message, final edit, notices).
    Message {
        body: String,
        formatted_body: Option<String>,
        dont_render_edited: bool,
        extras: Option<serde_json::Value>,
    },
    Image { body: String, mime: String, data: Vec<u8> },
    Audio { body: String, mime: String, data: Vec<u8> },
    Notice { body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamDeltaKind {
    Text,
    Reasoning,
    ToolInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallKind {
    Function,
    Provider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionPhase {
    Start,
    End,
}

/// Power level required to write a given custom state event — §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatePowerLevel {
    /// `room_capabilities`: only the bridge bot (power level 100) may write.
    BridgeOnly,
    /// `room_settings`: any member (power level 0) may write.
    AnyMember,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StateEventType {
    #[serde(rename = "room_capabilities")]
    RoomCapabilities { content: serde_json::Value },
    #[serde(rename = "room_settings")]
    RoomSettings { content: serde_json::Value },
    #[serde(rename = "m.room.name")]
    RoomName { name: String },
}

/// A ghost membership transition — §4.6 `ModelSwitchChoreography`.
#[derive(Debug, Clone)]
pub enum MembershipChange {
    Join {
        user_id: String,
        display_name: String,
        marker: String,
    },
    Leave {
        user_id: String,
    },
    /// Agent rooms keep a single ghost resident and only update its
    /// membership extras (e.g. the model id) in place.
    UpdateExtras {
        user_id: String,
        extras: serde_json::Value,
    },
}

#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub mime: String,
    pub data: Vec<u8>,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct UploadedMedia {
    pub mxc_uri: String,
}

#[derive(Debug, Clone)]
pub struct RoomCreateRequest {
    pub name: String,
    pub room_type: &'static str,
    pub other_user_id: String,
}

pub type Room = RoomId;
