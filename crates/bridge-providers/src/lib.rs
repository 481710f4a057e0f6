pub mod codex;
pub mod openai;
pub mod provider;
pub mod registry;
pub mod router;
pub mod stream;

pub use provider::{
    ApiSurface, ChatRequest, ChatResponse, ContentPart, FunctionCallOutput, LlmProvider, Message,
    ProviderError, Role, ToolCall, ToolDefinition, select_api_surface,
};
pub use router::{ProviderRouter, RouteCandidate};
pub use stream::{ResponseOutputItem, StreamEvent};
