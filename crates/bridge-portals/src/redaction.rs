//! Inbound redaction handling — §8 I7: a chat-network delete of a user
//! message removes the corresponding row from the message log and emits a
//! notice into the room, rather than silently forgetting the row.

use bridge_chatnet::types::TimelineEventType;
use bridge_chatnet::ChatNetwork;
use bridge_core::types::PortalKey;
use tracing::instrument;

use crate::error::{PortalError, Result};
use crate::store::PortalStore;

fn to_portal_err(e: bridge_chatnet::ChatNetworkError) -> PortalError {
    PortalError::ChatNetwork(e.to_string())
}

/// Remove `message_id` from the log for `portal_key` and notify the room.
/// Deleting a row that is already gone is not an error — redaction delivery
/// can arrive more than once for the same event.
#[instrument(skip(store, network))]
pub async fn redact_message(
    store: &PortalStore,
    network: &dyn ChatNetwork,
    portal_key: &PortalKey,
    message_id: &str,
) -> Result<()> {
    store.delete_message(portal_key, message_id)?;

    if let Some(portal) = store.get(portal_key)? {
        if let Some(room_id) = &portal.room_id {
            network
                .send_timeline_event(
                    room_id,
                    TimelineEventType::Notice { body: "A message was removed from this conversation's history.".to_string() },
                    None,
                )
                .await
                .map_err(to_portal_err)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_chatnet::types::RoomCreateRequest;
    use bridge_chatnet::InMemoryChatNetwork;
    use bridge_core::types::{LoginId, Message, MessageMetadata, Portal};
    use rusqlite::Connection;

    #[tokio::test]
    async fn redact_removes_row_and_sends_notice() {
        let conn = Connection::open_in_memory().unwrap();
        let store = PortalStore::new(conn).unwrap();
        let network = InMemoryChatNetwork::new();

        let mut portal = Portal::new(PortalKey::new("p1", LoginId::from("login1")));
        let room_id = network
            .create_room(RoomCreateRequest { name: "chat-0".to_string(), room_type: "dm", other_user_id: "ai-login1:model:gpt-4o".to_string() })
            .await
            .unwrap();
        portal.room_id = Some(room_id);
        store.save(&portal).unwrap();

        let msg = Message {
            id: "m1".to_string(),
            mxid: "$m1".to_string(),
            portal_key: portal.key.clone(),
            sender_id: "user".to_string(),
            timestamp: 0,
            metadata: MessageMetadata::default(),
        };
        store.append_message(&msg).unwrap();
        assert_eq!(store.messages_for_portal(&portal.key, 10).unwrap().len(), 1);

        redact_message(&store, &network, &portal.key, "m1").await.unwrap();

        assert!(store.messages_for_portal(&portal.key, 10).unwrap().is_empty());
        assert_eq!(network.timeline.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn redacting_an_already_gone_message_is_not_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        let store = PortalStore::new(conn).unwrap();
        let network = InMemoryChatNetwork::new();
        let portal = Portal::new(PortalKey::new("p1", LoginId::from("login1")));
        store.save(&portal).unwrap();

        redact_message(&store, &network, &portal.key, "never-existed").await.unwrap();
    }
}
