//! OpenAI-compatible HTTP provider, speaking both wire formats named in
//! §4.7.2: the legacy Chat Completions endpoint and the newer Responses
//! endpoint. Grounded in `skynet_agent::openai::OpenAiProvider`'s reqwest
//! client setup and SSE line-splitting.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::provider::{
    ApiSurface, ChatRequest, ChatResponse, ContentPart, LlmProvider, ProviderError, Role,
    ToolCall, select_api_surface,
};
use crate::stream::StreamEvent;

pub struct OpenAiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    is_aggregator: bool,
}

impl OpenAiProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("reqwest client"),
            is_aggregator: false,
        }
    }

    pub fn as_aggregator(mut self) -> Self {
        self.is_aggregator = true;
        self
    }

    fn chat_messages_json(req: &ChatRequest) -> Vec<Value> {
        let mut out = vec![json!({"role": "system", "content": req.system})];
        for m in &req.messages {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
            };
            out.push(json!({"role": role, "content": Self::content_json(m)}));
        }
        out
    }

    fn content_json(m: &crate::provider::Message) -> Value {
        if m.parts.len() == 1 {
            if let ContentPart::Text { text } = &m.parts[0] {
                return Value::String(text.clone());
            }
        }
        let parts: Vec<Value> = m
            .parts
            .iter()
            .map(|p| match p {
                ContentPart::Text { text } => json!({"type": "text", "text": text}),
                ContentPart::ImageUrl { url, detail } => {
                    json!({"type": "image_url", "image_url": {"url": url, "detail": detail}})
                }
                ContentPart::File { filename, data_url } => {
                    json!({"type": "file", "file": {"filename": filename, "file_data": data_url}})
                }
                ContentPart::Audio { format, data_b64 } => {
                    json!({"type": "input_audio", "input_audio": {"data": data_b64, "format": format}})
                }
            })
            .collect();
        Value::Array(parts)
    }

    async fn send_chat_completions(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = json!({
            "model": req.model,
            "messages": Self::chat_messages_json(req),
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
            "stream": false,
        });
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let value: Value = resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        if !status.is_success() {
            return Err(Self::api_error(status.as_u16(), &value));
        }
        let choice = value["choices"][0].clone();
        let content = choice["message"]["content"].as_str().unwrap_or_default().to_string();
        Ok(ChatResponse {
            content,
            model: req.model.clone(),
            tokens_in: value["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            tokens_out: value["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
            finish_reason: choice["finish_reason"].as_str().unwrap_or("stop").to_string(),
            tool_calls: Vec::new(),
            response_id: value["id"].as_str().map(String::from),
        })
    }

    async fn send_responses(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut body = json!({
            "model": req.model,
            "instructions": req.system,
            "max_output_tokens": req.max_tokens,
        });
        if let Some(prev) = &req.previous_response_id {
            body["previous_response_id"] = json!(prev);
        }
        if !req.function_call_outputs.is_empty() {
            let items: Vec<Value> = req
                .function_call_outputs
                .iter()
                .map(|o| json!({"type": "function_call_output", "call_id": o.call_id, "output": o.output}))
                .collect();
            body["input"] = Value::Array(items);
        } else {
            body["input"] = Value::Array(
                req.messages
                    .iter()
                    .map(|m| {
                        json!({
                            "role": match m.role { Role::User => "user", Role::Assistant => "assistant", Role::System => "system" },
                            "content": m.plain_text(),
                        })
                    })
                    .collect(),
            );
        }
        if !req.tools.is_empty() {
            body["tools"] = Value::Array(
                req.tools
                    .iter()
                    .map(|t| json!({"type": "function", "name": t.name, "description": t.description, "parameters": t.input_schema}))
                    .collect(),
            );
        }
        let resp = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let value: Value = resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        if !status.is_success() {
            return Err(Self::api_error(status.as_u16(), &value));
        }
        Self::parse_responses_value(req, &value)
    }

    fn parse_responses_value(req: &ChatRequest, value: &Value) -> Result<ChatResponse, ProviderError> {
        let mut content = String::new();
        let mut tool_calls = Vec::new();
        if let Some(output) = value["output"].as_array() {
            for item in output {
                match item["type"].as_str() {
                    Some("message") => {
                        if let Some(parts) = item["content"].as_array() {
                            for p in parts {
                                if let Some(t) = p["text"].as_str() {
                                    content.push_str(t);
                                }
                            }
                        }
                    }
                    Some("function_call") => {
                        tool_calls.push(ToolCall {
                            id: item["call_id"].as_str().unwrap_or_default().to_string(),
                            name: item["name"].as_str().unwrap_or_default().to_string(),
                            input: serde_json::from_str(item["arguments"].as_str().unwrap_or("{}"))
                                .unwrap_or(Value::Null),
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(ChatResponse {
            content,
            model: req.model.clone(),
            tokens_in: value["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
            tokens_out: value["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
            finish_reason: value["status"].as_str().unwrap_or("completed").to_string(),
            tool_calls,
            response_id: value["id"].as_str().map(String::from),
        })
    }

    fn api_error(status: u16, value: &Value) -> ProviderError {
        let message = value["error"]["message"]
            .as_str()
            .unwrap_or("unknown provider error")
            .to_string();
        if status == 429 {
            return ProviderError::RateLimited { retry_after_ms: 1000 };
        }
        ProviderError::Api { status, message }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_aggregator(&self) -> bool {
        self.is_aggregator
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        match select_api_surface(&req.messages, self.is_aggregator) {
            ApiSurface::ChatCompletions => self.send_chat_completions(req).await,
            ApiSurface::Responses => self.send_responses(req).await,
        }
    }

    async fn send_stream(
        &self,
        req: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        if select_api_surface(&req.messages, self.is_aggregator) != ApiSurface::Responses {
            let resp = self.send_chat_completions(req).await?;
            let response_id = resp.response_id.clone().unwrap_or_default();
            let _ = tx.send(StreamEvent::TextDelta { content: resp.content }).await;
            let _ = tx
                .send(StreamEvent::ResponseCompleted {
                    status: "completed".to_string(),
                    response_id,
                    output: Vec::new(),
                })
                .await;
            return Ok(());
        }

        let mut body = json!({
            "model": req.model,
            "instructions": req.system,
            "max_output_tokens": req.max_tokens,
            "stream": true,
        });
        if let Some(prev) = &req.previous_response_id {
            body["previous_response_id"] = json!(prev);
        }
        if !req.function_call_outputs.is_empty() {
            let items: Vec<Value> = req
                .function_call_outputs
                .iter()
                .map(|o| json!({"type": "function_call_output", "call_id": o.call_id, "output": o.output}))
                .collect();
            body["input"] = Value::Array(items);
        } else {
            body["input"] = Value::Array(
                req.messages
                    .iter()
                    .map(|m| {
                        json!({
                            "role": match m.role { Role::User => "user", Role::Assistant => "assistant", Role::System => "system" },
                            "content": m.plain_text(),
                        })
                    })
                    .collect(),
            );
        }
        if !req.tools.is_empty() {
            body["tools"] = Value::Array(
                req.tools
                    .iter()
                    .map(|t| json!({"type": "function", "name": t.name, "description": t.description, "parameters": t.input_schema}))
                    .collect(),
            );
        }

        let resp = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let mut stream = resp.bytes_stream();
        let mut buf = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buf.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = buf.find("\n\n") {
                let line = buf[..pos].to_string();
                buf.drain(..pos + 2);
                let Some(data) = line.strip_prefix("data: ") else { continue };
                if data == "[DONE]" {
                    continue;
                }
                let Ok(event) = serde_json::from_str::<Value>(data) else {
                    warn!(line = data, "unparseable sse event");
                    continue;
                };
                if let Some(ev) = Self::map_sse_event(&event) {
                    if tx.send(ev).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
        debug!(provider = %self.name, "stream finished");
        Ok(())
    }
}

impl OpenAiProvider {
    fn map_sse_event(value: &Value) -> Option<StreamEvent> {
        match value["type"].as_str()? {
            "response.output_text.delta" => Some(StreamEvent::TextDelta {
                content: value["delta"].as_str().unwrap_or_default().to_string(),
            }),
            "response.reasoning_summary_text.delta" => Some(StreamEvent::ReasoningDelta {
                content: value["delta"].as_str().unwrap_or_default().to_string(),
            }),
            "response.function_call_arguments.delta" => Some(StreamEvent::ToolCallArgumentsDelta {
                item_id: value["item_id"].as_str().unwrap_or_default().to_string(),
                name: value["name"].as_str().map(String::from),
                delta: value["delta"].as_str().unwrap_or_default().to_string(),
            }),
            "response.function_call_arguments.done" => Some(StreamEvent::ToolCallArgumentsDone {
                item_id: value["item_id"].as_str().unwrap_or_default().to_string(),
                name: value["name"].as_str().unwrap_or_default().to_string(),
                arguments: value["arguments"].as_str().unwrap_or_default().to_string(),
            }),
            "response.web_search_call.searching" => Some(StreamEvent::WebSearchSearching {
                item_id: value["item_id"].as_str().unwrap_or_default().to_string(),
            }),
            "response.web_search_call.completed" => Some(StreamEvent::WebSearchCompleted {
                item_id: value["item_id"].as_str().unwrap_or_default().to_string(),
            }),
            "response.image_generation_call.in_progress" => Some(StreamEvent::ImageGenerationInProgress {
                item_id: value["item_id"].as_str().unwrap_or_default().to_string(),
            }),
            "response.image_generation_call.completed" => Some(StreamEvent::ImageGenerationCompleted {
                item_id: value["item_id"].as_str().unwrap_or_default().to_string(),
                image_b64: value["result"].as_str().map(String::from),
            }),
            "response.completed" => {
                let output = value["response"]["output"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default();
                Some(StreamEvent::ResponseCompleted {
                    status: "completed".to_string(),
                    response_id: value["response"]["id"].as_str().unwrap_or_default().to_string(),
                    output: output
                        .iter()
                        .filter_map(|item| {
                            item["content"].as_array().and_then(|parts| {
                                parts.iter().find_map(|p| {
                                    p["text"].as_str().map(|t| crate::stream::ResponseOutputItem::Text {
                                        content: t.to_string(),
                                    })
                                })
                            })
                        })
                        .collect(),
                })
            }
            "error" => Some(StreamEvent::Error {
                message: value["message"].as_str().unwrap_or("unknown error").to_string(),
            }),
            _ => None,
        }
    }
}
