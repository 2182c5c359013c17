//! `postgres_query_agent`: rewrite, gate, execute, optionally export.

use crate::agent::{str_param, Agent, AgentContext, AgentOutcome, FailureKind};
use crate::db::{QueryExecutor, Row};
use crate::error::{AgentError, Result};
use crate::export::{export_filename, export_rows, persist_temp, ExportFormat};
use crate::publish::ResultPublisher;
use crate::rewriter::QueryRewriter;
use async_trait::async_trait;
use chrono::Local;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct PostgresQueryAgent {
    rewriter: QueryRewriter,
    executor: Arc<dyn QueryExecutor>,
    publisher: Option<ResultPublisher>,
}

impl PostgresQueryAgent {
    pub fn new(rewriter: QueryRewriter, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            rewriter,
            executor,
            publisher: None,
        }
    }

    /// Upload exports to the file manager instead of leaving them on local disk.
    pub fn with_publisher(mut self, publisher: ResultPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub async fn run(
        &self,
        ctx: &AgentContext,
        request: &str,
        arguments: Option<&Value>,
        export_format: Option<&str>,
    ) -> AgentOutcome {
        info!("Request: {}, Arguments: {:?}", request, arguments);
        debug!("SQL: Original {}", request);

        let sql = match self.rewriter.prepare(request) {
            Ok(sql) => sql,
            Err(rejected) => {
                warn!("Rejected non-SELECT statement: {}", rejected.sql);
                return AgentOutcome::failure(FailureKind::ValidationError, rejected.to_string());
            }
        };

        let args = positional_args(arguments);
        debug!("Arguments: {:?}", args);

        let rows = match self.executor.fetch_rows(&sql, &args).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Database query failed: {}", e);
                return AgentOutcome::failure(FailureKind::DatabaseError, database_message(e));
            }
        };
        info!("Query returned {} rows", rows.len());

        let Some(format) = export_format else {
            let data: Vec<Value> = rows.into_iter().map(Value::Object).collect();
            return AgentOutcome::success("Query succeeded").with("data", data);
        };

        match self.export(ctx, &rows, format).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Export failed: {}", e);
                AgentOutcome::success("Query succeeded but export failed")
                    .with("row_count", rows.len())
                    .with("export_error", e.to_string())
            }
        }
    }

    async fn export(&self, ctx: &AgentContext, rows: &[Row], format: &str) -> Result<AgentOutcome> {
        let format: ExportFormat = format.parse()?;
        let content = export_rows(rows, format)?;
        let message = format!("Query and export to {} successful", format);

        match &self.publisher {
            Some(publisher) => {
                let filename = export_filename(format.extension(), Local::now());
                let published = publisher.publish(ctx, content, &filename).await?;
                info!("Exported result as {} with file_id {}", filename, published.file_id);
                Ok(AgentOutcome::success(message)
                    .with("row_count", rows.len())
                    .with("file_id", published.file_id)
                    .with("filename", published.filename)
                    .with("download_link", published.download_link))
            }
            None => {
                let path = persist_temp(&content, format.extension())?;
                info!("Exported result to {}", path.display());
                Ok(AgentOutcome::success(message)
                    .with("row_count", rows.len())
                    .with("file_path", path.display().to_string()))
            }
        }
    }
}

/// Bind order follows the argument object's insertion order.
fn positional_args(arguments: Option<&Value>) -> Vec<Value> {
    match arguments {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(map)) => map.values().cloned().collect(),
        Some(Value::Array(values)) => values.clone(),
        Some(other) => vec![other.clone()],
    }
}

fn database_message(err: AgentError) -> String {
    match err {
        AgentError::Database(e) => e.to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Agent for PostgresQueryAgent {
    fn name(&self) -> &'static str {
        "postgres_query_agent"
    }

    fn description(&self) -> &'static str {
        "Executes SELECT queries on PostgreSQL with provided arguments"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "request": {
                    "type": "string",
                    "description": "SQL SELECT query to execute with placeholders like $1, $2, etc."
                },
                "arguments": {
                    "type": ["object", "array", "null"],
                    "description": "Parameters to bind to the SQL query, in placeholder order"
                },
                "export_format": {
                    "type": ["string", "null"],
                    "enum": ["csv", "excel", null],
                    "description": "Optional export format (csv or excel)"
                }
            },
            "required": ["request"]
        })
    }

    async fn invoke(&self, ctx: &AgentContext, params: Value) -> AgentOutcome {
        let request = params.get("request").and_then(Value::as_str).unwrap_or_default();
        let export_format = str_param(&params, "export_format");
        self.run(ctx, request, params.get("arguments"), export_format.as_deref())
            .await
    }
}
