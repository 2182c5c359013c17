use crate::agent::{str_param, Agent, AgentContext, AgentOutcome, FailureKind};
use crate::db::Row;
use crate::error::{AgentError, Result};
use crate::export::{export_rows, persist_temp, ExportFormat};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{error, info};

/// Exports result rows into a CSV or Excel file on local disk.
#[derive(Default)]
pub struct ExportResultAgent;

impl ExportResultAgent {
    pub fn new() -> Self {
        Self
    }

    fn export(rows: &[Row], format: &str) -> Result<PathBuf> {
        let format: ExportFormat = format.parse()?;
        let content = export_rows(rows, format)?;
        persist_temp(&content, format.extension())
    }
}

#[async_trait]
impl Agent for ExportResultAgent {
    fn name(&self) -> &'static str {
        "export_result_agent"
    }

    fn description(&self) -> &'static str {
        "Exports query result into CSV or Excel format"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "data": {
                    "type": "array",
                    "items": {"type": "object"},
                    "description": "List of row objects to export"
                },
                "format": {
                    "type": "string",
                    "description": "Export format: 'csv' or 'excel'"
                }
            },
            "required": ["data", "format"]
        })
    }

    async fn invoke(&self, _ctx: &AgentContext, params: Value) -> AgentOutcome {
        let format = str_param(&params, "format").unwrap_or_else(|| "csv".to_string());
        let rows: Vec<Row> = match params.get("data") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut rows = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Object(row) => rows.push(row.clone()),
                        _ => {
                            return AgentOutcome::failure(
                                FailureKind::InvalidArguments,
                                "data must be a list of objects",
                            )
                        }
                    }
                }
                rows
            }
            Some(_) => {
                return AgentOutcome::failure(FailureKind::InvalidArguments, "data must be a list of objects")
            }
        };

        info!("Exporting {} records to format: {}", rows.len(), format);
        match Self::export(&rows, &format) {
            Ok(path) => {
                info!("Exported file saved at: {}", path.display());
                AgentOutcome::success("Export successful").with("file_path", path.display().to_string())
            }
            Err(e) => {
                error!("Export failed: {}", e);
                let message = match e {
                    AgentError::Export(msg) => msg,
                    other => other.to_string(),
                };
                AgentOutcome::failure(FailureKind::ExportError, message)
            }
        }
    }
}
