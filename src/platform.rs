//! Agent directory lookups against the orchestration platform API.

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: String,
    pub agent_name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub agent_description: Option<String>,
}

pub struct PlatformClient {
    client: reqwest::Client,
    api_base_url: String,
    jwt_token: Option<String>,
}

impl PlatformClient {
    pub fn new(api_base_url: impl Into<String>, jwt_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            jwt_token,
        }
    }

    /// Agents previously registered under the current token.
    pub async fn list_agents(&self) -> Result<Vec<AgentInfo>> {
        let token = self
            .jwt_token
            .as_deref()
            .ok_or_else(|| AgentError::Config("GENAI_JWT_TOKEN environment variable is not set".to_string()))?;
        if self.api_base_url.is_empty() {
            return Err(AgentError::Config("API URL is not set".to_string()));
        }

        let agents = self
            .client
            .get(format!("{}/api/agents", self.api_base_url))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<AgentInfo>>()
            .await?;
        Ok(agents)
    }
}

/// Id of the first active agent with the given name.
pub fn active_agent_id_by_name(agents: &[AgentInfo], target_name: &str) -> Option<String> {
    agents
        .iter()
        .find(|a| a.agent_name == target_name && a.is_active)
        .map(|a| a.agent_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_skips_inactive_and_defaults_active() {
        let agents: Vec<AgentInfo> = serde_json::from_str(
            r#"[
                {"agent_id": "1", "agent_name": "export_result_agent", "is_active": false},
                {"agent_id": "2", "agent_name": "export_result_agent"},
                {"agent_id": "3", "agent_name": "gs_sql_generator", "is_active": true}
            ]"#,
        )
        .unwrap();

        assert_eq!(active_agent_id_by_name(&agents, "export_result_agent"), Some("2".to_string()));
        assert_eq!(active_agent_id_by_name(&agents, "gs_sql_generator"), Some("3".to_string()));
        assert_eq!(active_agent_id_by_name(&agents, "missing"), None);
    }

    #[tokio::test]
    async fn test_list_agents_requires_token() {
        let client = PlatformClient::new("http://localhost:8000", None);
        let err = client.list_agents().await.unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }
}
