//! The chat-network client library boundary — §1 "specified only as
//! interfaces the core calls into". Mirrors the shape of
//! `skynet_channels::channel::Channel`: one `Send + Sync` trait, driven from
//! many Tokio tasks, with the concrete transport (room creation, state-event
//! send, media upload, ghost intent) left to the implementation.

use async_trait::async_trait;
use bridge_core::types::RoomId;

use crate::error::Result;
use crate::types::{
    EventId, MediaUpload, MembershipChange, Relation, RoomCreateRequest, StateEventType,
    TimelineEventType, UploadedMedia,
};

/// Common interface every chat-network adapter implements.
///
/// Implementations must be `Send + Sync` so they can be stored behind an
/// `Arc` and driven from multiple turn tasks concurrently (§5).
#[async_trait]
pub trait ChatNetwork: Send + Sync {
    async fn create_room(&self, req: RoomCreateRequest) -> Result<RoomId>;

    /// Send a timeline event, optionally related to a prior event (§3
    /// invariant 7: deltas reference the initial event, the final edit
    /// replaces it).
    async fn send_timeline_event(
        &self,
        room: &RoomId,
        event: TimelineEventType,
        relation: Option<Relation>,
    ) -> Result<EventId>;

    async fn send_state_event(&self, room: &RoomId, event: StateEventType) -> Result<EventId>;

    /// Apply a ghost membership transition (join/leave/update-extras) — §4.6.
    async fn set_membership(&self, room: &RoomId, change: MembershipChange) -> Result<()>;

    async fn upload_media(&self, upload: MediaUpload) -> Result<UploadedMedia>;

    /// Redact (delete) a previously-sent event — §8 I7.
    async fn redact(&self, room: &RoomId, event_id: &EventId) -> Result<()>;
}
