//! `gs_sql_generator`: natural language to SQL through the LLM.

use crate::agent::{str_param, Agent, AgentContext, AgentOutcome, FailureKind};
use crate::llm::LlmClient;
use crate::schema_context::SchemaContext;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

pub struct SqlGeneratorAgent {
    llm: LlmClient,
    context: Arc<SchemaContext>,
    schema_definition: String,
}

impl SqlGeneratorAgent {
    /// `schema_definition` is the fallback DDL used when a call omits one.
    pub fn new(llm: LlmClient, context: Arc<SchemaContext>, schema_definition: String) -> Self {
        Self {
            llm,
            context,
            schema_definition,
        }
    }

    /// Object parameters are passed to the prompt as JSON text; a missing
    /// schema context falls back to the alias context.
    fn schema_context_text(&self, params: &Value) -> String {
        match params.get("schema_context") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(v @ (Value::Object(_) | Value::Array(_))) => v.to_string(),
            _ => self.context.to_json().to_string(),
        }
    }
}

#[async_trait]
impl Agent for SqlGeneratorAgent {
    fn name(&self) -> &'static str {
        "gs_sql_generator"
    }

    fn description(&self) -> &'static str {
        "Generate SQL query based on schema context, raw schema definition, and a natural language request."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "schema_context": {
                    "type": ["string", "object"],
                    "description": "Table/column aliases and descriptions"
                },
                "schema_definition": {
                    "type": "string",
                    "description": "Raw schema, e.g. SQL DDL"
                },
                "request": {
                    "type": "string",
                    "description": "Natural language request to generate SQL for"
                }
            },
            "required": ["request"]
        })
    }

    async fn invoke(&self, _ctx: &AgentContext, params: Value) -> AgentOutcome {
        let Some(request) = str_param(&params, "request") else {
            return AgentOutcome::failure(FailureKind::InvalidArguments, "request is required");
        };
        let schema_context = self.schema_context_text(&params);
        let schema_definition =
            str_param(&params, "schema_definition").unwrap_or_else(|| self.schema_definition.clone());

        info!("Generating SQL with {} for: {}", self.llm.model(), request);
        match self
            .llm
            .generate_sql(&schema_context, &schema_definition, &request)
            .await
        {
            Ok(sql) => AgentOutcome::success("SQL generated").with("sql", sql),
            Err(e) => {
                error!("SQL generation failed: {}", e);
                AgentOutcome::failure(FailureKind::GenerationError, e.to_string())
            }
        }
    }
}
