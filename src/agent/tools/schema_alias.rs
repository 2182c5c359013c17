use crate::agent::{Agent, AgentContext, AgentOutcome};
use crate::schema_context::SchemaContext;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Serves table aliases, phrase mappings and join predicates.
pub struct SchemaAliasContextAgent {
    context: Arc<SchemaContext>,
}

impl SchemaAliasContextAgent {
    pub fn new(context: Arc<SchemaContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Agent for SchemaAliasContextAgent {
    fn name(&self) -> &'static str {
        "schema_alias_context_agent"
    }

    fn description(&self) -> &'static str {
        "Provides table aliases and common column-value mappings for semantic query translation"
    }

    async fn invoke(&self, _ctx: &AgentContext, _params: Value) -> AgentOutcome {
        info!("Returning schema alias context");
        AgentOutcome::success("Schema alias context")
            .with("table_aliases", json!(self.context.table_aliases))
            .with("column_value_mappings", json!(self.context.column_value_mappings))
            .with("table_relationships", json!(self.context.table_relationships))
    }
}
