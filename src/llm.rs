use crate::error::{AgentError, Result};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Chat-completion client for an OpenAI-compatible API.
#[derive(Clone)]
pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate a SQL query from natural language given the schema information.
    pub async fn generate_sql(
        &self,
        schema_context: &str,
        schema_definition: &str,
        request: &str,
    ) -> Result<String> {
        let prompt = build_sql_prompt(schema_context, schema_definition, request);
        let response = self.call_llm("You're a helpful assistant", &prompt).await?;
        Ok(extract_sql(&response))
    }

    async fn call_llm(&self, system: &str, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt}
            ]
        });

        debug!("Calling {} at {}", self.model, self.base_url);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::Llm(format!("LLM API returned {}: {}", status, text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AgentError::Llm("No content in LLM response".to_string()))?;

        Ok(content.to_string())
    }
}

pub fn build_sql_prompt(schema_context: &str, schema_definition: &str, request: &str) -> String {
    format!(
        r#"
You are an expert data engineer. Given the following schema context and raw schema definition,
generate a valid SQL query to satisfy the request.

Schema Context:
{}

Raw Schema Definition:
{}

Request:
{}

SQL Query:
"#,
        schema_context, schema_definition, request
    )
}

/// Strip a surrounding markdown code fence, if the model added one.
pub fn extract_sql(response: &str) -> String {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (```sql) on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_sections_in_order() {
        let prompt = build_sql_prompt("{\"users\": \"amf_user\"}", "CREATE TABLE amf_user();", "count users");
        let ctx = prompt.find("Schema Context:\n{\"users\"").unwrap();
        let def = prompt.find("Raw Schema Definition:\nCREATE TABLE").unwrap();
        let req = prompt.find("Request:\ncount users").unwrap();
        assert!(ctx < def && def < req);
        assert!(prompt.trim_end().ends_with("SQL Query:"));
    }

    #[test]
    fn test_extract_sql_strips_fence() {
        assert_eq!(
            extract_sql("```sql\nSELECT count(*) FROM amf_user;\n```"),
            "SELECT count(*) FROM amf_user;"
        );
        assert_eq!(extract_sql("  SELECT 1  "), "SELECT 1");
        assert_eq!(extract_sql("```\nSELECT 2\n```\n"), "SELECT 2");
    }
}
