//! The typed streaming event vocabulary a provider adapter emits — §4.7.3.
//!
//! Grounded in `skynet_agent::stream::StreamEvent`, generalized from a single
//! text/tool-use/done/error shape to the full event set the turn engine
//! needs to drive multi-turn tool calling, web search, and image generation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamEvent {
    TextDelta {
        content: String,
    },
    ReasoningDelta {
        content: String,
    },
    ToolCallArgumentsDelta {
        item_id: String,
        name: Option<String>,
        delta: String,
    },
    ToolCallArgumentsDone {
        item_id: String,
        name: String,
        arguments: String,
    },
    WebSearchSearching {
        item_id: String,
    },
    WebSearchCompleted {
        item_id: String,
    },
    ImageGenerationInProgress {
        item_id: String,
    },
    ImageGenerationCompleted {
        item_id: String,
        /// Base64-encoded image payload, when the provider returns it inline.
        image_b64: Option<String>,
    },
    ResponseCompleted {
        status: String,
        response_id: String,
        output: Vec<ResponseOutputItem>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseOutputItem {
    /// Inline-returned image output harvested into `pending_images[]` — §4.7.3.
    Image { base64: String, mime: String },
    Text { content: String },
}
