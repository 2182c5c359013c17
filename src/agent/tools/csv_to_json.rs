//! `csv_to_json`: convert an uploaded CSV file into a JSON file in the same
//! session and hand back a signed download link.

use crate::agent::{str_param, Agent, AgentContext, AgentOutcome, FailureKind};
use crate::error::Result;
use crate::export::{csv_to_records, export_filename};
use crate::publish::ResultPublisher;
use async_trait::async_trait;
use chrono::Local;
use serde_json::{json, Value};
use tracing::{debug, error, info};

const PREVIEW_CHARS: usize = 500;

pub struct CsvToJsonAgent {
    publisher: ResultPublisher,
}

impl CsvToJsonAgent {
    pub fn new(publisher: ResultPublisher) -> Self {
        Self { publisher }
    }

    async fn convert(&self, ctx: &AgentContext, file_id: &str) -> Result<AgentOutcome> {
        let files = self.publisher.file_manager(ctx);

        let content = files.get_by_id(file_id).await?;
        let records = csv_to_records(&content)?;
        let file_bytes = serde_json::to_vec_pretty(&records)?;

        let filename = export_filename("json", Local::now());
        let published = self.publisher.publish(ctx, file_bytes, &filename).await?;

        let metadata = files.get_metadata_by_id(&published.file_id).await?;
        debug!("Uploaded file metadata: {}", metadata);

        let uploaded = files.get_by_id(&published.file_id).await?;
        let preview: String = String::from_utf8_lossy(&uploaded)
            .chars()
            .take(PREVIEW_CHARS)
            .collect();

        info!(
            "Converted CSV {} into {} ({} records)",
            file_id,
            published.file_id,
            records.len()
        );
        Ok(AgentOutcome::success(format!(
            "CSV file successfully converted to JSON with {}",
            published.file_id
        ))
        .with("file_id", published.file_id)
        .with("filename", published.filename)
        .with("record_count", records.len())
        .with("metadata", metadata)
        .with("content_preview", preview)
        .with("download_link", published.download_link))
    }
}

#[async_trait]
impl Agent for CsvToJsonAgent {
    fn name(&self) -> &'static str {
        "csv_to_json"
    }

    fn description(&self) -> &'static str {
        "Accepts an uploaded CSV file via file_id and returns the parsed JSON data."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_id": {"type": "string", "description": "Id of the uploaded CSV file"}
            },
            "required": ["file_id"]
        })
    }

    async fn invoke(&self, ctx: &AgentContext, params: Value) -> AgentOutcome {
        let Some(file_id) = str_param(&params, "file_id") else {
            return AgentOutcome::failure(FailureKind::InvalidArguments, "file_id is required");
        };
        match self.convert(ctx, &file_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("CSV conversion failed for {}: {}", file_id, e);
                AgentOutcome::failure(FailureKind::FileError, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_manager::FileManager;
    use crate::signing::UrlSigner;

    #[tokio::test]
    async fn test_file_id_required() {
        let agent = CsvToJsonAgent::new(ResultPublisher::new(
            FileManager::new("http://127.0.0.1:9", None),
            UrlSigner::new("k"),
            "http://localhost:9999",
            600,
        ));
        let outcome = agent.invoke(&AgentContext::default(), json!({"file_id": ""})).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidArguments));
        assert_eq!(outcome.message(), "file_id is required");
    }
}
