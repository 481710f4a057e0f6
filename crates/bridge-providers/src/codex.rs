//! Local subprocess provider that delegates to the `codex` CLI.
//!
//! Grounded in `skynet_agent::claude_cli::ClaudeCliProvider`: spawn a child
//! process, pipe the prompt over stdin, parse a single JSON object off
//! stdout. Codex handles its own tool execution internally, so `tool_calls`
//! on the returned `ChatResponse` is always empty — §6 lists this as a
//! "non-fallback" provider for that reason (its errors should not trigger
//! the provider-fallback chain, only the codex-specific retry budget).

use async_trait::async_trait;
use tracing::debug;

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

pub struct CodexProvider {
    command: String,
    sandbox_mode: String,
}

impl CodexProvider {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            sandbox_mode: "workspace-write".to_string(),
        }
    }

    pub fn with_sandbox_mode(mut self, mode: impl Into<String>) -> Self {
        self.sandbox_mode = mode.into();
        self
    }

    fn format_prompt(req: &ChatRequest) -> String {
        let mut out = String::new();
        for m in &req.messages {
            let tag = match m.role {
                crate::provider::Role::User => "User",
                crate::provider::Role::Assistant => "Assistant",
                crate::provider::Role::System => "System",
            };
            out.push_str(tag);
            out.push_str(": ");
            out.push_str(&m.plain_text());
            out.push('\n');
        }
        out
    }
}

#[async_trait]
impl LlmProvider for CodexProvider {
    fn name(&self) -> &str {
        "codex"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let sys_file = tempfile::Builder::new()
            .prefix("bridge-codex-sys-")
            .suffix(".txt")
            .tempfile()
            .map_err(|e| ProviderError::Unavailable(format!("failed to create temp file: {e}")))?;
        std::fs::write(sys_file.path(), &req.system)
            .map_err(|e| ProviderError::Unavailable(format!("failed to write system prompt: {e}")))?;

        let prompt = Self::format_prompt(req);

        debug!(
            command = %self.command,
            model = %req.model,
            prompt_len = prompt.len(),
            "sending to codex CLI"
        );

        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.arg("exec")
            .arg("--json")
            .arg("--model")
            .arg(&req.model)
            .arg("--sandbox")
            .arg(&self.sandbox_mode)
            .arg("--system-prompt-file")
            .arg(sys_file.path())
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProviderError::Unavailable(format!(
                    "codex CLI not found at '{}' — install it first",
                    self.command
                ))
            } else {
                ProviderError::Unavailable(format!("failed to spawn codex CLI: {e}"))
            }
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            use tokio::io::AsyncWriteExt;
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| ProviderError::Unavailable(format!("failed to write to codex stdin: {e}")))?;
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("codex CLI process error: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code().unwrap_or(1) as u16;
            return Err(ProviderError::Api {
                status: code,
                message: format!("codex CLI exited with code {code}: {stderr}"),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let json: serde_json::Value = serde_json::from_str(&stdout)
            .map_err(|e| ProviderError::Parse(format!("failed to parse codex CLI JSON: {e}")))?;

        if json.get("is_error").and_then(|v| v.as_bool()).unwrap_or(false) {
            let msg = json
                .get("result")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error from codex CLI");
            return Err(ProviderError::Api {
                status: 500,
                message: msg.to_string(),
            });
        }

        let content = json.get("result").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let tokens_in = json.pointer("/usage/input_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        let tokens_out = json.pointer("/usage/output_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32;

        Ok(ChatResponse {
            content,
            model: req.model.clone(),
            tokens_in,
            tokens_out,
            finish_reason: "stop".to_string(),
            tool_calls: Vec::new(),
            response_id: None,
        })
    }

    // send_stream falls back to the default (send + single TextDelta) — the
    // codex CLI's --json mode returns one object, not an event stream.
}
