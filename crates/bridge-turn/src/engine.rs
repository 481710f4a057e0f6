//! `TurnEngine` — the orchestration named in §1/§4.7: resolve effective
//! settings, build the prompt, pick an API surface, stream the provider,
//! run any tool calls it asks for, retry through compaction/truncation on
//! context overflow, and finalize. Grounded in `skynet_agent::runtime`'s
//! session loop, generalized from one fixed provider to the router/
//! fallback-chain model of §7 and from single-shot tool calls to the
//! continuation loop of §4.7.4.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bridge_agents::AgentDefinition;
use bridge_chatnet::types::{EventId, MediaUpload, Relation, TimelineEventType};
use bridge_chatnet::ChatNetwork;
use bridge_core::config::{CompactionConfig, TurnConfig};
use bridge_core::types::{
    ConversationMode, Message, MessageMetadata, MessageRole, Portal, PortalKey, Provider, RoomId,
    ToolCallRecord, UserLogin,
};
use bridge_linkpreview::LinkFetcher;
use bridge_portals::PortalStore;
use bridge_providers::{
    select_api_surface, ChatRequest, FunctionCallOutput, LlmProvider, Message as ProviderMessage,
    ProviderRouter, RouteCandidate, StreamEvent, ToolDefinition,
};
use bridge_scheduler::SchedulerHandle;
use bridge_tools::{BridgeContext, Tool, ToolResult};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{classify, classify_stream_error, format_user_facing_error, ErrorCategory, Result, TurnError};
use crate::finalize::{finalize_turn, FinalizeInput};
use crate::prompt::{build_prompt, smart_truncate};
use crate::retry::RetryDriver;
use crate::turn_state::{PendingImage, TurnAccumulator, TurnAction};

/// Maps the login's account provider to the name its adapter is registered
/// under in the [`ProviderRouter`] — the account-level identity and the
/// wire-protocol adapter are different axes (§6).
fn router_name_for(provider: Provider) -> &'static str {
    match provider {
        Provider::Openai => "openai",
        Provider::Openrouter => "openrouter",
        Provider::Beeper => "beeper",
        Provider::MagicProxy => "magic_proxy",
        Provider::Custom => "custom",
        Provider::Codex => "codex",
    }
}

fn route_candidates(
    router_name: &'static str,
    model: &str,
    agent: Option<&AgentDefinition>,
) -> Vec<RouteCandidate> {
    let mut candidates = vec![RouteCandidate {
        provider_name: router_name.to_string(),
        model: model.to_string(),
    }];
    if let Some(agent) = agent {
        for fallback in &agent.model.fallbacks {
            candidates.push(RouteCandidate {
                provider_name: router_name.to_string(),
                model: fallback.clone(),
            });
        }
    }
    candidates
}

pub struct TurnEngine {
    pub store: Arc<PortalStore>,
    pub network: Arc<dyn ChatNetwork>,
    pub router: Arc<ProviderRouter>,
    pub tool_registry: Arc<bridge_tools::ToolRegistry>,
    pub link_fetcher: Arc<dyn LinkFetcher>,
    pub scheduler: Arc<dyn SchedulerHandle>,
    pub turn_config: TurnConfig,
    pub compaction_config: CompactionConfig,
}

/// Everything one inbound user event needs to drive a turn.
pub struct TurnRequest {
    pub portal_key: PortalKey,
    pub login: UserLogin,
    pub agent: Option<AgentDefinition>,
    pub source_event_id: String,
    pub latest_user_message: String,
}

/// What one streamed exchange produced, handed off to `finalize_turn`.
struct StreamOutcome {
    initial_event_id: EventId,
    text: String,
    response_id: Option<String>,
    finish_reason: Option<String>,
    first_token_at: i64,
    pending_images: Vec<PendingImage>,
    tool_calls: Vec<ToolCallRecord>,
    tool_call_event_ids: Vec<EventId>,
}

impl TurnEngine {
    pub async fn run_turn(&self, mut req: TurnRequest) -> Result<()> {
        let mut portal = self.store.get_or_create(&req.portal_key)?;
        let room_id = portal
            .room_id
            .clone()
            .ok_or_else(|| TurnError::ChatNetwork("portal has no room yet".to_string()))?;

        let turn_id = uuid::Uuid::now_v7().to_string();

        let global_default_model = req
            .agent
            .as_ref()
            .map(|a| a.model.primary.clone())
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        let model =
            bridge_capabilities::CapabilityResolver::effective_model(&portal.metadata, &req.login, &global_default_model)
                .value;
        let capabilities = bridge_capabilities::CapabilityResolver::resolve(&model);

        let mut system =
            bridge_capabilities::CapabilityResolver::effective_system_prompt(&portal.metadata, &req.login).value;
        if system.is_empty() {
            system = req.agent.as_ref().map(|a| a.system_prompt.clone()).unwrap_or_default();
        }
        let temperature =
            bridge_capabilities::CapabilityResolver::effective_temperature(&portal.metadata, &req.login).value;

        let max_context_messages =
            bridge_capabilities::CapabilityResolver::effective_max_context_messages(&portal.metadata, &capabilities)
                .value;
        let history = self.store.messages_for_portal(&req.portal_key, max_context_messages)?;
        let (system, messages) = build_prompt(&system, &history, &req.latest_user_message, 4000);
        let messages = smart_truncate(&system, messages, capabilities.context_window.max(1) as usize);

        let router_name = router_name_for(req.login.provider);
        let candidates = route_candidates(router_name, &model, req.agent.as_ref());
        let primary_provider = self.router.get(&candidates[0].provider_name).ok_or_else(|| {
            TurnError::ChatNetwork(format!("no provider registered as '{}'", candidates[0].provider_name))
        })?;
        let is_stateless = primary_provider.is_stateless();
        let is_aggregator = primary_provider.is_aggregator();

        let max_tokens = portal.metadata.max_completion_tokens;
        let tools = self.tool_registry.allowed(&portal.metadata.tool_policy);
        let tool_defs = bridge_tools::to_definitions(&tools);

        let previous_response_id = if portal.metadata.conversation_mode == ConversationMode::Responses
            && !is_stateless
            && !portal.metadata.last_response_id.is_empty()
        {
            Some(portal.metadata.last_response_id.clone())
        } else {
            None
        };

        let retry = RetryDriver {
            provider: primary_provider.as_ref(),
            summarization_model: &self.compaction_config.summarization_model,
            context_window_tokens: capabilities.context_window.max(1) as usize,
            max_attempts: self.turn_config.max_retry_attempts,
        };

        let turn_started_at = chrono::Utc::now().timestamp_millis();
        let outcome = match retry
            .run(system, messages, |system, messages| {
                // §4.7.2: both API surfaces ride the same `ChatRequest` shape
                // here, so the selection is informative for now rather than
                // branching request construction.
                let _ = select_api_surface(&messages, is_aggregator);
                self.drive_stream(DriveStreamArgs {
                    room_id: &room_id,
                    portal: &portal,
                    req: &req,
                    candidates: &candidates,
                    system,
                    messages,
                    tool_defs: tool_defs.clone(),
                    tools: &tools,
                    max_tokens,
                    temperature,
                    previous_response_id: previous_response_id.clone(),
                    is_stateless,
                })
            })
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.report_turn_failure(&room_id, &mut req.login, e).await;
                return Ok(());
            }
        };

        let assistant_message = Message::new(
            req.portal_key.clone(),
            portal.other_user_id.clone(),
            MessageMetadata {
                role: MessageRole::Assistant,
                has_tool_calls: !outcome.tool_calls.is_empty(),
                tool_calls: outcome.tool_calls,
                model: model.clone(),
                turn_id: turn_id.clone(),
                finish_reason: outcome.finish_reason,
                agent_id: req.agent.as_ref().map(|a| a.id.clone()),
                started_at: turn_started_at,
                first_token_at: outcome.first_token_at,
                completed_at: chrono::Utc::now().timestamp_millis(),
                ..MessageMetadata::default()
            },
        );

        finalize_turn(
            &self.network,
            self.link_fetcher.as_ref(),
            self.scheduler.as_ref(),
            &self.store,
            &mut portal,
            req.login.provider,
            assistant_message,
            outcome.initial_event_id,
            FinalizeInput {
                raw_text: outcome.text,
                turn_id,
                model,
                response_id: outcome.response_id,
                provider_is_stateless: is_stateless,
                pending_images: outcome.pending_images,
                tool_call_event_ids: outcome.tool_call_event_ids,
                max_urls_outbound: self.turn_config.max_urls_outbound,
                fetch_timeout_ms: self.turn_config.fetch_timeout_ms,
            },
        )
        .await?;

        Ok(())
    }

    /// §7 error-categorization side effects for a turn that failed outright
    /// (not mid-stream, where `classify_stream_error`'s context-length retry
    /// already applies). Auth failures stop the login from retrying further;
    /// every category gets a user-facing notice in the room via
    /// `format_user_facing_error` rather than a silently dropped error.
    async fn report_turn_failure(&self, room_id: &RoomId, login: &mut UserLogin, err: TurnError) {
        let provider_err = match &err {
            TurnError::Provider(e) => Some(e),
            TurnError::NonFallback(inner) => match inner.as_ref() {
                TurnError::Provider(e) => Some(e),
                _ => None,
            },
            _ => None,
        };

        let notice = match provider_err {
            Some(e) => {
                if classify(e) == ErrorCategory::Auth {
                    login.logged_in = false;
                    if let Err(e) = self.store.save_login(login) {
                        warn!(error = %e, "failed to persist logged_in=false after auth failure");
                    }
                }
                format_user_facing_error(e)
            }
            None => format!("Something went wrong talking to the model: {err}"),
        };

        warn!(error = %err, "turn failed");
        if let Err(e) = self
            .network
            .send_timeline_event(room_id, TimelineEventType::Notice { body: notice }, None)
            .await
        {
            warn!(error = %e, "failed to deliver turn-failure notice");
        }
    }

    /// One streamed exchange, including the tool-call continuation loop
    /// (§4.7.4): function tool calls produce `function_call_outputs` fed
    /// straight back as the next round's request, without re-sending full
    /// history once a `response_id` cursor exists for a stateful provider.
    async fn drive_stream(&self, args: DriveStreamArgs<'_>) -> Result<StreamOutcome> {
        let DriveStreamArgs {
            room_id,
            portal,
            req,
            candidates,
            system,
            messages,
            tool_defs,
            tools,
            max_tokens,
            temperature,
            mut previous_response_id,
            is_stateless,
        } = args;

        let mut acc = TurnAccumulator::new();
        let mut initial_event_id: Option<EventId> = None;
        let mut function_call_outputs: Vec<FunctionCallOutput> = Vec::new();
        let mut tool_call_records: Vec<ToolCallRecord> = Vec::new();
        let mut tool_call_event_ids: Vec<EventId> = Vec::new();
        let mut first_token_at: i64 = 0;

        loop {
            let request = ChatRequest {
                model: candidates[0].model.clone(),
                system: system.clone(),
                messages: if is_stateless || previous_response_id.is_none() {
                    messages.clone()
                } else {
                    Vec::new()
                },
                max_tokens,
                temperature,
                stream: true,
                tools: tool_defs.clone(),
                previous_response_id: previous_response_id.clone(),
                function_call_outputs: std::mem::take(&mut function_call_outputs),
            };

            let provider = self.router.get(&candidates[0].provider_name).ok_or_else(|| {
                TurnError::ChatNetwork(format!("no provider registered as '{}'", candidates[0].provider_name))
            })?;
            let (tx, mut rx) = mpsc::channel(64);
            let send_task = tokio::spawn(async move { provider.send_stream(&request, tx).await });

            let mut round_had_tool_call = false;
            while let Some(event) = rx.recv().await {
                if let StreamEvent::Error { message } = &event {
                    if let Some(ctx_err) = classify_stream_error(message) {
                        return Err(wrap_if_mid_flight(ctx_err, initial_event_id.is_some()));
                    }
                    let err = TurnError::ChatNetwork(message.clone());
                    return Err(wrap_if_mid_flight(err, initial_event_id.is_some()));
                }

                for action in acc.handle_event(&event) {
                    match action {
                        TurnAction::SendInitialMessage { body } => {
                            let id = self
                                .network
                                .send_timeline_event(
                                    room_id,
                                    TimelineEventType::Message {
                                        body,
                                        formatted_body: None,
                                        dont_render_edited: false,
                                        extras: None,
                                    },
                                    None,
                                )
                                .await?;
                            initial_event_id = Some(id);
                            first_token_at = chrono::Utc::now().timestamp_millis();
                        }
                        TurnAction::SendDelta(event) => {
                            let is_tool_call = matches!(event, TimelineEventType::ToolCall { .. });
                            match self.ensure_initial_event_id(room_id, &mut initial_event_id).await {
                                Ok(id) => {
                                    match self
                                        .network
                                        .send_timeline_event(room_id, event, Some(Relation::Reference { event_id: id }))
                                        .await
                                    {
                                        Ok(sent_id) if is_tool_call => tool_call_event_ids.push(sent_id),
                                        Ok(_) => {}
                                        Err(e) => warn!(error = %e, "failed to send stream delta"),
                                    }
                                }
                                Err(e) => warn!(error = %e, "failed to create placeholder for stream delta"),
                            }
                        }
                    }
                }

                if let StreamEvent::ToolCallArgumentsDone { item_id, name, arguments } = &event {
                    round_had_tool_call = true;
                    let input: serde_json::Value =
                        serde_json::from_str(arguments).unwrap_or(serde_json::Value::Null);
                    let result = self.run_tool(portal, req, tools, name, input.clone()).await;
                    let content = self.deliver_tool_media(room_id, &initial_event_id, &result).await;
                    let tool_result_event =
                        acc.finish_function_tool_call(item_id, content.clone(), result.is_error);
                    if let Some(id) = &initial_event_id {
                        let _ = self
                            .network
                            .send_timeline_event(room_id, tool_result_event, Some(Relation::Reference { event_id: id.clone() }))
                            .await;
                    }
                    tool_call_records.push(ToolCallRecord {
                        call_id: item_id.clone(),
                        name: name.clone(),
                        arguments: input,
                        result: Some(content.clone()),
                        is_error: result.is_error,
                    });
                    function_call_outputs.push(FunctionCallOutput { call_id: item_id.clone(), output: content });
                }
            }

            match send_task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(wrap_if_mid_flight(e.into(), initial_event_id.is_some())),
                Err(e) => warn!(error = %e, "provider stream task panicked"),
            }

            previous_response_id = acc.response_id.clone();
            if !round_had_tool_call || function_call_outputs.is_empty() {
                break;
            }
            info!(event_id = %req.source_event_id, "continuing turn after tool call");
        }

        let initial_event_id = match initial_event_id {
            Some(id) => id,
            None => {
                // The model produced no visible text at all (e.g. a silent,
                // tool-only turn) — still create a placeholder so finalize
                // always has an event to edit or redact.
                self.network
                    .send_timeline_event(
                        room_id,
                        TimelineEventType::Message {
                            body: String::new(),
                            formatted_body: None,
                            dont_render_edited: false,
                            extras: None,
                        },
                        None,
                    )
                    .await?
            }
        };

        Ok(StreamOutcome {
            initial_event_id,
            text: acc.accumulated_text().to_string(),
            response_id: acc.response_id,
            finish_reason: acc.finish_reason,
            first_token_at,
            pending_images: acc.pending_images,
            tool_calls: tool_call_records,
            tool_call_event_ids,
        })
    }

    /// A tool call or reasoning delta can arrive before any visible text
    /// does (§8 scenario 3 streams reasoning and a tool call first). Every
    /// delta needs an event to relate to, so the first one lazily creates
    /// the same empty placeholder `drive_stream` would otherwise only send
    /// once the whole stream finished with no text at all.
    async fn ensure_initial_event_id(&self, room_id: &RoomId, initial_event_id: &mut Option<EventId>) -> Result<EventId> {
        if let Some(id) = initial_event_id.as_ref() {
            return Ok(id.clone());
        }
        let id = self
            .network
            .send_timeline_event(
                room_id,
                TimelineEventType::Message {
                    body: String::new(),
                    formatted_body: None,
                    dont_render_edited: false,
                    extras: None,
                },
                None,
            )
            .await?;
        *initial_event_id = Some(id.clone());
        Ok(id)
    }

    /// §4.7.3: a tool result prefixed `AUDIO:`/`IMAGE:` carries a base64
    /// media payload instead of literal text. Upload it, deliver it as its
    /// own timeline event, and replace the tool-result body with a short
    /// sentence so the continuation round doesn't echo the raw payload back
    /// to the model. Error results are never media, regardless of prefix.
    async fn deliver_tool_media(&self, room_id: &RoomId, initial_event_id: &Option<EventId>, result: &ToolResult) -> String {
        if result.is_error {
            return result.content.clone();
        }
        let (payload, mime, kind) = if let Some(b64) = result.audio_payload() {
            (b64, "audio/mpeg", "audio")
        } else if let Some(b64) = result.image_payload() {
            (b64, "image/png", "image")
        } else {
            return result.content.clone();
        };

        let data = match BASE64.decode(payload.as_bytes()) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "tool returned an undecodable {kind} payload");
                return format!("The tool produced {kind} output but it could not be decoded.");
            }
        };

        if let Err(e) = self
            .network
            .upload_media(MediaUpload { mime: mime.to_string(), data: data.clone(), filename: format!("tool-result.{kind}") })
            .await
        {
            warn!(error = %e, "tool media upload failed");
        }

        let event = if kind == "audio" {
            TimelineEventType::Audio { body: "tool-result".to_string(), mime: mime.to_string(), data }
        } else {
            TimelineEventType::Image { body: "tool-result".to_string(), mime: mime.to_string(), data }
        };
        if let Some(id) = initial_event_id {
            if let Err(e) = self
                .network
                .send_timeline_event(room_id, event, Some(Relation::Reference { event_id: id.clone() }))
                .await
            {
                warn!(error = %e, "failed to deliver tool {kind}");
                return format!("The tool produced {kind} output but it failed to send.");
            }
        }
        format!("The tool returned {kind} output, delivered above.")
    }

    async fn run_tool(
        &self,
        portal: &Portal,
        req: &TurnRequest,
        tools: &[Arc<dyn Tool>],
        name: &str,
        input: serde_json::Value,
    ) -> ToolResult {
        let Some(tool) = tools.iter().find(|t| t.name() == name).cloned() else {
            return ToolResult::error(format!("tool '{name}' is not enabled for this room"));
        };
        let ctx = BridgeContext {
            portal: portal.clone(),
            metadata: portal.metadata.clone(),
            network: self.network.clone(),
            source_event_id: req.source_event_id.clone(),
        };
        tool.execute(&ctx, input).await
    }
}

fn wrap_if_mid_flight(err: TurnError, mid_flight: bool) -> TurnError {
    if mid_flight {
        TurnError::NonFallback(Box::new(err))
    } else {
        err
    }
}

struct DriveStreamArgs<'a> {
    room_id: &'a RoomId,
    portal: &'a Portal,
    req: &'a TurnRequest,
    candidates: &'a [RouteCandidate],
    system: String,
    messages: Vec<ProviderMessage>,
    tool_defs: Vec<ToolDefinition>,
    tools: &'a [Arc<dyn Tool>],
    max_tokens: u32,
    temperature: f32,
    previous_response_id: Option<String>,
    is_stateless: bool,
}
