//! End-to-end coverage of `TurnEngine::run_turn` against a scripted stub
//! `LlmProvider`, an `InMemoryChatNetwork`, and real SQLite-backed stores
//! (in-memory connections). Exercises §8 scenario 3 (tool-call roundtrip)
//! and scenario 6 (silent directive) without standing up any real provider
//! or chat-network transport. Follows the `StubProvider` idiom used in
//! `src/retry.rs`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bridge_chatnet::types::{Relation, RoomCreateRequest, TimelineEventType};
use bridge_chatnet::{ChatNetwork, InMemoryChatNetwork};
use bridge_core::config::{CompactionConfig, TurnConfig};
use bridge_core::types::{LoginId, MessageRole, PortalKey, Provider, UserLogin};
use bridge_linkpreview::HttpLinkFetcher;
use bridge_portals::PortalStore;
use bridge_providers::{ChatRequest, ChatResponse, LlmProvider, ProviderError, ProviderRouter, StreamEvent};
use bridge_scheduler::SqliteSchedulerHandle;
use bridge_tools::ToolRegistry;
use bridge_turn::{TurnEngine, TurnRequest};
use rusqlite::Connection;
use tokio::sync::mpsc;

/// Emits a tool call on the first round, then (once fed the tool's output
/// back as `function_call_outputs`) a plain text reply on the second.
struct ToolRoundtripProvider {
    round: AtomicUsize,
}

#[async_trait]
impl LlmProvider for ToolRoundtripProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        unreachable!("TurnEngine always drives the streaming path")
    }

    async fn send_stream(&self, _req: &ChatRequest, tx: mpsc::Sender<StreamEvent>) -> Result<(), ProviderError> {
        if self.round.fetch_add(1, Ordering::SeqCst) == 0 {
            let _ = tx.send(StreamEvent::ReasoningDelta { content: "let me check".into() }).await;
            let _ = tx
                .send(StreamEvent::ToolCallArgumentsDelta {
                    item_id: "call_1".into(),
                    name: Some("calculator".into()),
                    delta: "{\"expr\":\"2+2\"}".into(),
                })
                .await;
            let _ = tx
                .send(StreamEvent::ToolCallArgumentsDone {
                    item_id: "call_1".into(),
                    name: "calculator".into(),
                    arguments: "{\"expr\":\"2+2\"}".into(),
                })
                .await;
            let _ = tx
                .send(StreamEvent::ResponseCompleted {
                    status: "completed".into(),
                    response_id: "resp_1".into(),
                    output: Vec::new(),
                })
                .await;
        } else {
            let _ = tx.send(StreamEvent::TextDelta { content: "The answer is 4.".into() }).await;
            let _ = tx
                .send(StreamEvent::ResponseCompleted {
                    status: "completed".into(),
                    response_id: "resp_2".into(),
                    output: Vec::new(),
                })
                .await;
        }
        Ok(())
    }
}

struct SilentProvider;

#[async_trait]
impl LlmProvider for SilentProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        unreachable!("TurnEngine always drives the streaming path")
    }

    async fn send_stream(&self, _req: &ChatRequest, tx: mpsc::Sender<StreamEvent>) -> Result<(), ProviderError> {
        let _ = tx.send(StreamEvent::TextDelta { content: "[[silent]]".into() }).await;
        let _ = tx
            .send(StreamEvent::ResponseCompleted {
                status: "completed".into(),
                response_id: "resp_1".into(),
                output: Vec::new(),
            })
            .await;
        Ok(())
    }
}

/// Wires a `TurnEngine` around `provider`, with a fresh in-memory portal
/// store, scheduler, and chat network, and a portal already bound to a
/// created room.
async fn build_engine(
    provider: Arc<dyn LlmProvider>,
) -> (TurnEngine, PortalKey, Arc<InMemoryChatNetwork>, Arc<PortalStore>) {
    let network = Arc::new(InMemoryChatNetwork::new());
    let room_id = network
        .create_room(RoomCreateRequest {
            name: "test room".into(),
            room_type: "dm",
            other_user_id: "@ai:bridge".into(),
        })
        .await
        .unwrap();

    let store = Arc::new(PortalStore::new(Connection::open_in_memory().unwrap()).unwrap());
    let portal_key = PortalKey::new("portal-1", LoginId::from("login-1"));
    let mut portal = store.get_or_create(&portal_key).unwrap();
    portal.room_id = Some(room_id);
    store.save(&portal).unwrap();
    store.save_login(&UserLogin::new("login-1", Provider::Openai)).unwrap();

    let mut router = ProviderRouter::new();
    router.register(provider);

    let engine = TurnEngine {
        store: store.clone(),
        network: network.clone(),
        router: Arc::new(router),
        tool_registry: Arc::new(ToolRegistry::with_built_ins()),
        link_fetcher: Arc::new(HttpLinkFetcher::new()),
        scheduler: Arc::new(SqliteSchedulerHandle::new(Connection::open_in_memory().unwrap()).unwrap()),
        turn_config: TurnConfig::default(),
        compaction_config: CompactionConfig::default(),
    };

    (engine, portal_key, network, store)
}

fn turn_request(portal_key: PortalKey, message: &str) -> TurnRequest {
    TurnRequest {
        portal_key,
        login: UserLogin::new("login-1", Provider::Openai),
        agent: None,
        source_event_id: "$incoming1".to_string(),
        latest_user_message: message.to_string(),
    }
}

#[tokio::test]
async fn tool_call_roundtrip_delivers_result_and_continuation() {
    let provider = Arc::new(ToolRoundtripProvider { round: AtomicUsize::new(0) });
    let (engine, portal_key, network, store) = build_engine(provider).await;

    engine.run_turn(turn_request(portal_key.clone(), "What's 2+2?")).await.unwrap();

    let timeline = network.timeline.lock().unwrap();

    let tool_call = timeline.iter().find(|e| {
        matches!(&e.event, TimelineEventType::ToolCall { name, .. } if name == "calculator")
    });
    assert!(tool_call.is_some(), "expected a tool-call event for calculator");

    let tool_result = timeline.iter().find(|e| {
        matches!(&e.event, TimelineEventType::ToolResult { body, is_error, .. } if body == "4" && !is_error)
    });
    assert!(tool_result.is_some(), "expected a tool-result event with body \"4\"");

    let final_edit = timeline
        .iter()
        .find(|e| matches!(e.relation, Some(Relation::Replace { .. })))
        .expect("expected one final edit event");
    match &final_edit.event {
        TimelineEventType::Message { body, extras, .. } => {
            assert_eq!(body, "* The answer is 4.");
            let extras = extras.as_ref().expect("final edit should carry extras");
            let ai = &extras["com.beeper.ai"];
            let tool_calls = ai["tool_calls"].as_array().expect("tool_calls should be an array");
            assert!(!tool_calls.is_empty(), "tool_calls should name the tool-call event id");
        }
        other => panic!("expected a Message final edit, got {other:?}"),
    }
    drop(timeline);

    let messages = store.messages_for_portal(&portal_key, 20).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].metadata.role, MessageRole::Assistant);
    assert!(messages[0].metadata.has_tool_calls);
}

#[tokio::test]
async fn silent_directive_redacts_placeholder_and_persists_nothing() {
    let provider = Arc::new(SilentProvider);
    let (engine, portal_key, network, store) = build_engine(provider).await;

    engine.run_turn(turn_request(portal_key.clone(), "say nothing back")).await.unwrap();

    let redactions = network.redactions.lock().unwrap();
    assert_eq!(redactions.len(), 1, "the streamed placeholder should be redacted exactly once");
    drop(redactions);

    let timeline = network.timeline.lock().unwrap();
    let final_edit = timeline.iter().find(|e| matches!(e.relation, Some(Relation::Replace { .. })));
    assert!(final_edit.is_none(), "a silent turn must not send a final edit");
    drop(timeline);

    let messages = store.messages_for_portal(&portal_key, 20).unwrap();
    assert!(messages.is_empty(), "a silent turn must not persist a message-log row");
}
