//! Per-turn streaming state — §4.7.3 and §4.7.6. Translates the provider's
//! `StreamEvent` vocabulary into the chat network's `TimelineEventType`
//! vocabulary, tracking the monotonic `seq` counter, the first-delta/initial-
//! message rule, and the per-item-id tool-call state machine. Pure and
//! synchronous: it never touches the network itself, only decides what the
//! caller should send next.

use std::collections::HashMap;

use bridge_chatnet::types::{StreamDeltaKind, TimelineEventType, ToolCallKind};
use bridge_providers::stream::{ResponseOutputItem, StreamEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallStatus {
    Pending,
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, Default)]
struct ToolCallState {
    name: Option<String>,
    arguments: String,
    status: Option<ToolCallStatus>,
    provider: bool,
}

#[derive(Debug, Clone)]
pub struct PendingImage {
    pub base64: String,
    pub mime: String,
}

/// Something the caller (the turn engine) must actually send. Splitting the
/// initial message out from the rest lets the engine capture the real event
/// id the chat network hands back and feed it into every later `Relation`.
#[derive(Debug, Clone)]
pub enum TurnAction {
    SendInitialMessage { body: String },
    SendDelta(TimelineEventType),
}

pub struct TurnAccumulator {
    seq: u64,
    text_started: bool,
    text: String,
    reasoning: String,
    tool_calls: HashMap<String, ToolCallState>,
    pub pending_images: Vec<PendingImage>,
    pub response_id: Option<String>,
    pub finish_reason: Option<String>,
}

impl Default for TurnAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self {
            seq: 0,
            text_started: false,
            text: String::new(),
            reasoning: String::new(),
            tool_calls: HashMap::new(),
            pending_images: Vec::new(),
            response_id: None,
            finish_reason: None,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub fn accumulated_text(&self) -> &str {
        &self.text
    }

    pub fn tool_call_status(&self, item_id: &str) -> Option<ToolCallStatus> {
        self.tool_calls.get(item_id).and_then(|c| c.status)
    }

    /// Advance the state machine for one provider event, returning the
    /// timeline actions it implies, in order.
    pub fn handle_event(&mut self, event: &StreamEvent) -> Vec<TurnAction> {
        match event {
            StreamEvent::TextDelta { content } => {
                if content.is_empty() {
                    return Vec::new();
                }
                self.text.push_str(content);
                if !self.text_started {
                    self.text_started = true;
                    // First non-empty delta becomes the initial message itself;
                    // it is not also echoed as a stream-delta.
                    vec![TurnAction::SendInitialMessage { body: content.clone() }]
                } else {
                    let seq = self.next_seq();
                    vec![TurnAction::SendDelta(TimelineEventType::StreamDelta {
                        kind: StreamDeltaKind::Text,
                        content: content.clone(),
                        seq,
                        call_id: None,
                        tool_name: None,
                    })]
                }
            }
            StreamEvent::ReasoningDelta { content } => {
                if content.is_empty() {
                    return Vec::new();
                }
                self.reasoning.push_str(content);
                let seq = self.next_seq();
                vec![TurnAction::SendDelta(TimelineEventType::StreamDelta {
                    kind: StreamDeltaKind::Reasoning,
                    content: content.clone(),
                    seq,
                    call_id: None,
                    tool_name: None,
                })]
            }
            StreamEvent::ToolCallArgumentsDelta { item_id, name, delta } => {
                let entry = self.tool_calls.entry(item_id.clone()).or_default();
                if entry.status.is_none() {
                    entry.status = Some(ToolCallStatus::Pending);
                }
                if let Some(name) = name {
                    entry.name = Some(name.clone());
                }
                entry.arguments.push_str(delta);
                let seq = self.next_seq();
                vec![TurnAction::SendDelta(TimelineEventType::StreamDelta {
                    kind: StreamDeltaKind::ToolInput,
                    content: delta.clone(),
                    seq,
                    call_id: Some(item_id.clone()),
                    tool_name: name.clone(),
                })]
            }
            StreamEvent::ToolCallArgumentsDone { item_id, name, arguments } => {
                let entry = self.tool_calls.entry(item_id.clone()).or_default();
                entry.name = Some(name.clone());
                entry.arguments = arguments.clone();
                entry.status = Some(ToolCallStatus::Running);
                let parsed = serde_json::from_str(arguments)
                    .unwrap_or_else(|_| serde_json::Value::String(arguments.clone()));
                vec![TurnAction::SendDelta(TimelineEventType::ToolCall {
                    call_id: item_id.clone(),
                    name: name.clone(),
                    arguments: parsed,
                    call_kind: ToolCallKind::Function,
                })]
            }
            StreamEvent::WebSearchSearching { item_id } => {
                self.start_provider_tool_call(item_id, "web_search")
            }
            StreamEvent::WebSearchCompleted { item_id } => {
                self.complete_provider_tool_call(item_id)
            }
            StreamEvent::ImageGenerationInProgress { item_id } => {
                self.start_provider_tool_call(item_id, "image_generation")
            }
            StreamEvent::ImageGenerationCompleted { item_id, image_b64 } => {
                if let Some(b64) = image_b64 {
                    self.pending_images.push(PendingImage {
                        base64: b64.clone(),
                        mime: "image/png".to_string(),
                    });
                }
                self.complete_provider_tool_call(item_id)
            }
            StreamEvent::ResponseCompleted { status, response_id, output } => {
                self.finish_reason = Some(status.clone());
                self.response_id = Some(response_id.clone());
                for item in output {
                    if let ResponseOutputItem::Image { base64, mime } = item {
                        self.pending_images.push(PendingImage {
                            base64: base64.clone(),
                            mime: mime.clone(),
                        });
                    }
                }
                Vec::new()
            }
            StreamEvent::Error { .. } => {
                for state in self.tool_calls.values_mut() {
                    if !matches!(state.status, Some(ToolCallStatus::Completed)) {
                        state.status = Some(ToolCallStatus::Error);
                    }
                }
                Vec::new()
            }
        }
    }

    fn start_provider_tool_call(&mut self, item_id: &str, name: &str) -> Vec<TurnAction> {
        let entry = self.tool_calls.entry(item_id.to_string()).or_default();
        entry.name = Some(name.to_string());
        entry.provider = true;
        entry.status = Some(ToolCallStatus::Running);
        vec![TurnAction::SendDelta(TimelineEventType::ToolCall {
            call_id: item_id.to_string(),
            name: name.to_string(),
            arguments: serde_json::json!({}),
            call_kind: ToolCallKind::Provider,
        })]
    }

    fn complete_provider_tool_call(&mut self, item_id: &str) -> Vec<TurnAction> {
        let entry = self.tool_calls.entry(item_id.to_string()).or_default();
        entry.status = Some(ToolCallStatus::Completed);
        vec![TurnAction::SendDelta(TimelineEventType::ToolResult {
            call_id: item_id.to_string(),
            body: String::new(),
            is_error: false,
        })]
    }

    /// Mark a user-defined function tool call completed or errored once the
    /// registry has actually run it, returning the `tool-result` event to send.
    pub fn finish_function_tool_call(
        &mut self,
        item_id: &str,
        body: String,
        is_error: bool,
    ) -> TimelineEventType {
        let entry = self.tool_calls.entry(item_id.to_string()).or_default();
        entry.status = Some(if is_error {
            ToolCallStatus::Error
        } else {
            ToolCallStatus::Completed
        });
        TimelineEventType::ToolResult {
            call_id: item_id.to_string(),
            body,
            is_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_text_delta_becomes_initial_message_not_a_stream_delta() {
        let mut acc = TurnAccumulator::new();
        let actions = acc.handle_event(&StreamEvent::TextDelta { content: "Hello".into() });
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], TurnAction::SendInitialMessage { body } if body == "Hello"));
    }

    #[test]
    fn subsequent_text_deltas_are_stream_deltas_with_increasing_seq() {
        let mut acc = TurnAccumulator::new();
        acc.handle_event(&StreamEvent::TextDelta { content: "a".into() });
        let actions = acc.handle_event(&StreamEvent::TextDelta { content: "b".into() });
        match &actions[0] {
            TurnAction::SendDelta(TimelineEventType::StreamDelta { seq, content, .. }) => {
                assert_eq!(*seq, 1);
                assert_eq!(content, "b");
            }
            other => panic!("unexpected action: {other:?}"),
        }
        assert_eq!(acc.accumulated_text(), "ab");
    }

    #[test]
    fn tool_call_moves_from_pending_to_running_on_arguments_done() {
        let mut acc = TurnAccumulator::new();
        acc.handle_event(&StreamEvent::ToolCallArgumentsDelta {
            item_id: "call_1".into(),
            name: Some("calculator".into()),
            delta: "{\"expr\"".into(),
        });
        assert_eq!(acc.tool_call_status("call_1"), Some(ToolCallStatus::Pending));

        acc.handle_event(&StreamEvent::ToolCallArgumentsDone {
            item_id: "call_1".into(),
            name: "calculator".into(),
            arguments: "{\"expr\":\"1+1\"}".into(),
        });
        assert_eq!(acc.tool_call_status("call_1"), Some(ToolCallStatus::Running));
    }

    #[test]
    fn finishing_a_function_tool_call_marks_completed() {
        let mut acc = TurnAccumulator::new();
        acc.handle_event(&StreamEvent::ToolCallArgumentsDone {
            item_id: "call_1".into(),
            name: "calculator".into(),
            arguments: "{}".into(),
        });
        let event = acc.finish_function_tool_call("call_1", "2".into(), false);
        assert!(matches!(event, TimelineEventType::ToolResult { is_error: false, .. }));
        assert_eq!(acc.tool_call_status("call_1"), Some(ToolCallStatus::Completed));
    }

    #[test]
    fn web_search_is_a_synthetic_provider_tool_call() {
        let mut acc = TurnAccumulator::new();
        let start = acc.handle_event(&StreamEvent::WebSearchSearching { item_id: "ws_1".into() });
        assert!(matches!(
            &start[0],
            TurnAction::SendDelta(TimelineEventType::ToolCall { call_kind: ToolCallKind::Provider, .. })
        ));
        acc.handle_event(&StreamEvent::WebSearchCompleted { item_id: "ws_1".into() });
        assert_eq!(acc.tool_call_status("ws_1"), Some(ToolCallStatus::Completed));
    }

    #[test]
    fn response_completed_harvests_response_id_and_inline_images() {
        let mut acc = TurnAccumulator::new();
        acc.handle_event(&StreamEvent::ResponseCompleted {
            status: "completed".into(),
            response_id: "resp_1".into(),
            output: vec![ResponseOutputItem::Image {
                base64: "abc".into(),
                mime: "image/png".into(),
            }],
        });
        assert_eq!(acc.response_id.as_deref(), Some("resp_1"));
        assert_eq!(acc.pending_images.len(), 1);
    }

    #[test]
    fn empty_deltas_are_ignored() {
        let mut acc = TurnAccumulator::new();
        let actions = acc.handle_event(&StreamEvent::TextDelta { content: String::new() });
        assert!(actions.is_empty());
    }
}
