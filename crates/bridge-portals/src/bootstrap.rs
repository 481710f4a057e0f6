//! Per-login bootstrap sequence — §4.5 "Bootstrap". Runs once per login
//! after it comes online: waits for the login row to be durably persisted,
//! backfills the chat-index counter the first time, ensures the default
//! chat and Builder room exist, and never aborts the whole sequence because
//! one step failed.

use std::sync::Arc;
use std::time::Duration;

use bridge_agents::AgentStore;
use bridge_core::types::{LoginId, Provider};
use tracing::{info, instrument, warn};

use crate::factory::ChatFactory;
use crate::store::PortalStore;

const LOGIN_PERSIST_POLL_INTERVAL: Duration = Duration::from_millis(200);
const LOGIN_PERSIST_MAX_WAIT: Duration = Duration::from_secs(60);

/// Spawn `bootstrap` as a detached background task — called once per login
/// when a chat-network client comes online.
pub fn schedule_bootstrap(store: Arc<PortalStore>, factory: Arc<ChatFactory>, agent_store: Arc<AgentStore>, login_id: LoginId) {
    tokio::spawn(async move {
        if let Err(e) = bootstrap(&store, &factory, &agent_store, &login_id).await {
            warn!(login = %login_id, error = %e, "bootstrap failed");
        }
    });
}

#[instrument(skip(store, factory, agent_store), fields(login = %login_id))]
pub async fn bootstrap(store: &PortalStore, factory: &ChatFactory, agent_store: &AgentStore, login_id: &LoginId) -> crate::error::Result<()> {
    wait_for_login_persisted(store, login_id).await;

    let mut login = store.get_or_create_login(login_id.as_str(), Provider::Openai)?;

    if !login.chats_synced {
        if let Err(e) = sync_chat_index(store, login_id) {
            warn!(login = %login_id, error = %e, "failed to sync chat index, continuing bootstrap");
        } else {
            login.chats_synced = true;
            store.save_login(&login)?;
        }
    }

    match factory.ensure_default_chat(agent_store).await {
        Ok(portal) => info!(portal = %portal.key, "default chat ready"),
        Err(e) => warn!(login = %login_id, error = %e, "failed to ensure default chat"),
    }

    match factory.ensure_builder_room(agent_store).await {
        Ok(portal) => info!(portal = %portal.key, "builder room ready"),
        Err(e) => warn!(login = %login_id, error = %e, "failed to ensure builder room"),
    }

    Ok(())
}

/// Poll the login row until it shows up, up to a bound — a login is
/// persisted by an earlier step of the chat-network client's own startup,
/// which can race this task. Continuing after a timeout rather than
/// failing outright mirrors the teacher's tolerance for partial bootstrap
/// failures.
async fn wait_for_login_persisted(store: &PortalStore, login_id: &LoginId) {
    let deadline = tokio::time::Instant::now() + LOGIN_PERSIST_MAX_WAIT;
    loop {
        match store.get_login(login_id.as_str()) {
            Ok(Some(_)) => return,
            _ => {
                if tokio::time::Instant::now() >= deadline {
                    warn!(login = %login_id, "timed out waiting for login to persist, continuing anyway");
                    return;
                }
                tokio::time::sleep(LOGIN_PERSIST_POLL_INTERVAL).await;
            }
        }
    }
}

/// One-time repair for logins created before `next_chat_index` was tracked:
/// scan existing portals and set the counter past the highest slug index
/// seen, so a freshly created chat never collides with one made out of
/// band.
fn sync_chat_index(store: &PortalStore, login_id: &LoginId) -> crate::error::Result<()> {
    let portals = store.list_for_login(login_id)?;
    let max_index = portals
        .iter()
        .filter_map(|p| p.metadata.slug.strip_prefix("chat-"))
        .filter_map(|n| n.parse::<u32>().ok())
        .max();

    if let Some(max_index) = max_index {
        let mut login = store.get_or_create_login(login_id.as_str(), Provider::Openai)?;
        // A slug's numeric suffix is 1-indexed display of the `next_chat_index`
        // value consumed at creation time, so the next index to hand out is the
        // suffix itself, not suffix + 1.
        if login.next_chat_index < max_index {
            login.next_chat_index = max_index;
            store.save_login(&login)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_chatnet::InMemoryChatNetwork;
    use rusqlite::Connection;

    #[tokio::test]
    async fn bootstrap_creates_default_chat_and_builder_room() {
        let conn = Connection::open_in_memory().unwrap();
        let store = Arc::new(PortalStore::new(conn).unwrap());
        let network = Arc::new(InMemoryChatNetwork::new());
        let login_id = LoginId::from("login1");
        let factory = Arc::new(ChatFactory::new(store.clone(), network, login_id.clone()));

        let agent_conn = Connection::open_in_memory().unwrap();
        bridge_agents::db::init_db(&agent_conn).unwrap();
        let agent_store = Arc::new(AgentStore::new(agent_conn, login_id.as_str()));

        store.get_or_create_login(login_id.as_str(), Provider::Openai).unwrap();

        bootstrap(&store, &factory, &agent_store, &login_id).await.unwrap();

        let login = store.get_login(login_id.as_str()).unwrap().unwrap();
        assert!(login.default_chat_portal_id.is_some());
        assert!(login.builder_room_id.is_some());
    }

    #[test]
    fn sync_chat_index_advances_past_highest_existing_slug() {
        let conn = Connection::open_in_memory().unwrap();
        let store = PortalStore::new(conn).unwrap();
        let login_id = LoginId::from("login1");
        store.get_or_create_login(login_id.as_str(), Provider::Openai).unwrap();

        let mut portal = store
            .get_or_create(&bridge_core::types::PortalKey::new("p1", login_id.clone()))
            .unwrap();
        portal.metadata.slug = "chat-0007".to_string();
        store.save(&portal).unwrap();

        sync_chat_index(&store, &login_id).unwrap();

        let login = store.get_login(login_id.as_str()).unwrap().unwrap();
        assert_eq!(login.next_chat_index, 7);
    }
}
