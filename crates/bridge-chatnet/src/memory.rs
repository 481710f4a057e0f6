//! In-memory reference `ChatNetwork` implementation.
//!
//! Used by the test suites of `bridge-portals` and `bridge-turn` to assert on
//! the exact sequence of timeline/state/membership calls (§8 scenarios)
//! without standing up a real chat-network transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bridge_core::types::RoomId;

use crate::error::{ChatNetworkError, Result};
use crate::network::ChatNetwork;
use crate::types::{
    EventId, MediaUpload, MembershipChange, Relation, RoomCreateRequest, StateEventType,
    TimelineEventType, UploadedMedia,
};

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub room: RoomId,
    pub event_id: EventId,
    pub event: TimelineEventType,
    pub relation: Option<Relation>,
}

#[derive(Debug, Clone)]
pub struct RecordedState {
    pub room: RoomId,
    pub event: StateEventType,
}

pub struct InMemoryChatNetwork {
    next_id: AtomicU64,
    pub timeline: Mutex<Vec<RecordedEvent>>,
    pub state: Mutex<Vec<RecordedState>>,
    pub memberships: Mutex<Vec<(RoomId, MembershipChange)>>,
    pub redactions: Mutex<Vec<EventId>>,
    pub rooms: Mutex<Vec<RoomId>>,
}

impl Default for InMemoryChatNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChatNetwork {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            timeline: Mutex::new(Vec::new()),
            state: Mutex::new(Vec::new()),
            memberships: Mutex::new(Vec::new()),
            redactions: Mutex::new(Vec::new()),
            rooms: Mutex::new(Vec::new()),
        }
    }

    fn fresh_id(&self, prefix: &str) -> String {
        format!("${prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Current resident ghost user ids in `room`, replaying join/leave order.
    pub fn residents(&self, room: &RoomId) -> Vec<String> {
        let mut set: Vec<String> = Vec::new();
        for (r, change) in self.memberships.lock().unwrap().iter() {
            if r != room {
                continue;
            }
            match change {
                MembershipChange::Join { user_id, .. } => {
                    if !set.contains(user_id) {
                        set.push(user_id.clone());
                    }
                }
                MembershipChange::Leave { user_id } => {
                    set.retain(|id| id != user_id);
                }
                MembershipChange::UpdateExtras { .. } => {}
            }
        }
        set
    }
}

#[async_trait]
impl ChatNetwork for InMemoryChatNetwork {
    async fn create_room(&self, req: RoomCreateRequest) -> Result<RoomId> {
        let id = RoomId(self.fresh_id("room"));
        self.rooms.lock().unwrap().push(id.clone());
        if !req.other_user_id.is_empty() {
            self.memberships.lock().unwrap().push((
                id.clone(),
                MembershipChange::Join {
                    user_id: req.other_user_id,
                    display_name: req.name,
                    marker: "initial".to_string(),
                },
            ));
        }
        Ok(id)
    }

    async fn send_timeline_event(
        &self,
        room: &RoomId,
        event: TimelineEventType,
        relation: Option<Relation>,
    ) -> Result<EventId> {
        if !self.rooms.lock().unwrap().contains(room) {
            return Err(ChatNetworkError::RoomNotFound(room.0.clone()));
        }
        let event_id = EventId(self.fresh_id("event"));
        self.timeline.lock().unwrap().push(RecordedEvent {
            room: room.clone(),
            event_id: event_id.clone(),
            event,
            relation,
        });
        Ok(event_id)
    }

    async fn send_state_event(&self, room: &RoomId, event: StateEventType) -> Result<EventId> {
        let event_id = EventId(self.fresh_id("state"));
        self.state.lock().unwrap().push(RecordedState {
            room: room.clone(),
            event,
        });
        Ok(event_id)
    }

    async fn set_membership(&self, room: &RoomId, change: MembershipChange) -> Result<()> {
        self.memberships
            .lock()
            .unwrap()
            .push((room.clone(), change));
        Ok(())
    }

    async fn upload_media(&self, upload: MediaUpload) -> Result<UploadedMedia> {
        Ok(UploadedMedia {
            mxc_uri: format!("mxc://bridge/{}", self.fresh_id(&upload.filename)),
        })
    }

    async fn redact(&self, _room: &RoomId, event_id: &EventId) -> Result<()> {
        self.redactions.lock().unwrap().push(event_id.clone());
        Ok(())
    }
}
