//! Named tool profiles (§3 `tool_policy.profile`) and the per-agent subset
//! a turn actually exposes to the provider. Grounded in
//! `skynet_agent::tools::tool_catalog` plus a profile layer the teacher
//! doesn't have, since Skynet exposes every built-in tool to every session.

use std::sync::Arc;

use bridge_core::types::ToolPolicy;

use crate::calculator::CalculatorTool;
use crate::react::ReactTool;
use crate::reply_to_current::ReplyToCurrentTool;
use crate::tool::Tool;

/// All built-in tools, independent of any policy — used for `/tools` style
/// introspection and as the seed set a `ToolRegistry` filters down from.
pub fn built_in_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(CalculatorTool),
        Arc::new(ReactTool),
        Arc::new(ReplyToCurrentTool),
    ]
}

pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    pub fn with_built_ins() -> Self {
        Self::new(built_in_tools())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Tools allowed under `policy`, for building the per-turn tool list
    /// sent to the provider (§4.7.1).
    pub fn allowed(&self, policy: &ToolPolicy) -> Vec<Arc<dyn Tool>> {
        self.tools
            .iter()
            .filter(|t| policy.allows(t.name()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_profile_disables_every_tool_by_default() {
        let registry = ToolRegistry::with_built_ins();
        let policy = ToolPolicy { profile: "none".into(), overrides: Default::default() };
        assert!(registry.allowed(&policy).is_empty());
    }

    #[test]
    fn override_can_re_enable_a_single_tool_under_none_profile() {
        let registry = ToolRegistry::with_built_ins();
        let mut overrides = std::collections::BTreeMap::new();
        overrides.insert("calculator".to_string(), true);
        let policy = ToolPolicy { profile: "none".into(), overrides };
        let allowed = registry.allowed(&policy);
        assert_eq!(allowed.len(), 1);
        assert_eq!(allowed[0].name(), "calculator");
    }

    #[test]
    fn default_profile_allows_everything_not_overridden_off() {
        let registry = ToolRegistry::with_built_ins();
        let policy = ToolPolicy { profile: "default".into(), overrides: Default::default() };
        assert_eq!(registry.allowed(&policy).len(), built_in_tools().len());
    }
}
