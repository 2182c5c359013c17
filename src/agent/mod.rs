//! Agent runtime
//!
//! Every capability is a named async handler. Handlers never fail outward:
//! faults become tagged [`AgentOutcome`] failures.

pub mod contracts;
pub mod tools;

pub use contracts::{AgentContext, AgentOutcome, FailureKind};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema of the call parameters, used for tool listings.
    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn invoke(&self, ctx: &AgentContext, params: Value) -> AgentOutcome;
}

/// Ordered set of agents addressable by name.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. A later agent with the same name replaces the earlier one.
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.agents.retain(|a| a.name() != agent.name());
        self.agents.push(agent);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.iter().find(|a| a.name() == name).cloned()
    }

    pub fn agents(&self) -> impl Iterator<Item = &Arc<dyn Agent>> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Tool descriptors in MCP `tools/list` shape.
    pub fn describe(&self) -> Vec<Value> {
        self.agents
            .iter()
            .map(|a| {
                json!({
                    "name": a.name(),
                    "description": a.description(),
                    "inputSchema": a.input_schema(),
                })
            })
            .collect()
    }
}

/// Non-empty string parameter.
pub(crate) fn str_param(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    #[async_trait]
    impl Agent for Echo {
        fn name(&self) -> &'static str {
            self.0
        }

        fn description(&self) -> &'static str {
            "echo"
        }

        async fn invoke(&self, _ctx: &AgentContext, params: Value) -> AgentOutcome {
            AgentOutcome::success("echo").with("params", params)
        }
    }

    #[tokio::test]
    async fn test_registry_lookup_and_replace() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(Echo("a")));
        registry.register(Arc::new(Echo("b")));
        registry.register(Arc::new(Echo("a")));

        assert_eq!(registry.len(), 2);
        let names: Vec<&str> = registry.agents().map(|a| a.name()).collect();
        assert_eq!(names, vec!["b", "a"]);

        let agent = registry.get("b").unwrap();
        let outcome = agent.invoke(&AgentContext::default(), json!({"x": 1})).await;
        assert_eq!(outcome.payload("params"), Some(&json!({"x": 1})));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_str_param_ignores_blank() {
        let params = json!({"a": "  ", "b": " x ", "c": 3});
        assert_eq!(str_param(&params, "a"), None);
        assert_eq!(str_param(&params, "b"), Some("x".to_string()));
        assert_eq!(str_param(&params, "c"), None);
    }
}
