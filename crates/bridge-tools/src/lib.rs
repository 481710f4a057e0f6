pub mod calculator;
pub mod react;
pub mod registry;
pub mod reminder;
pub mod reply_to_current;
pub mod tool;

#[cfg(test)]
mod test_support;

pub use registry::{ToolRegistry, built_in_tools};
pub use tool::{BridgeContext, Tool, ToolResult, to_definitions};
