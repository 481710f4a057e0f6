//! Test-only helper for constructing a minimal `BridgeContext`.

#![cfg(test)]

use std::sync::Arc;

use bridge_chatnet::InMemoryChatNetwork;
use bridge_core::types::{Portal, PortalKey, PortalMetadata};

use crate::tool::BridgeContext;

pub fn test_context() -> BridgeContext {
    let key = PortalKey::new("portal-1", "login-1".into());
    let mut portal = Portal::new(key);
    portal.room_id = Some(bridge_core::types::RoomId("!room:test".to_string()));
    BridgeContext {
        portal,
        metadata: PortalMetadata::default(),
        network: Arc::new(InMemoryChatNetwork::new()),
        source_event_id: "$source:test".to_string(),
    }
}
