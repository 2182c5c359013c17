//! Process configuration
//!
//! Read once from the environment (after `.env` is loaded) and handed to the
//! agents that need it.

use crate::db::PgExecutor;
use crate::error::{AgentError, Result};
use crate::file_manager::FileManager;
use crate::llm::{self, LlmClient};
use crate::rewriter::RewriteMode;
use crate::schema_context::SchemaContext;
use crate::signing::{self, UrlSigner};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

const DEV_SIGNING_SECRET: &str = "very long secret key for download file securely";

#[derive(Debug, Clone)]
pub struct Settings {
    pub jwt_token: Option<String>,
    pub api_base_url: String,
    pub database_url: Option<String>,
    pub schema_sql_path: Option<PathBuf>,
    pub schema_alias_file: Option<PathBuf>,
    pub schema_alias_url: Option<String>,
    pub rewrite_mode: RewriteMode,
    pub query_timeout: Option<Duration>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub signing_secret: String,
    pub signed_url_ttl_secs: i64,
    pub public_base_url: String,
    pub bind_addr: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let parse = |key: &str| -> Result<Option<i64>> {
            get(key)
                .map(|v| {
                    v.parse::<i64>()
                        .map_err(|_| AgentError::Config(format!("{} must be an integer, got {:?}", key, v)))
                })
                .transpose()
        };

        let rewrite_mode = match get("QUERY_REWRITE_MODE") {
            Some(v) => RewriteMode::from_str(&v).map_err(AgentError::Config)?,
            None => RewriteMode::Basic,
        };

        let signing_secret = get("SIGNED_SECRET_KEY").unwrap_or_else(|| {
            warn!("SIGNED_SECRET_KEY not set - using the development signing secret");
            DEV_SIGNING_SECRET.to_string()
        });

        Ok(Self {
            jwt_token: get("GENAI_JWT_TOKEN"),
            api_base_url: get("GENAI_API_BASE_URL").unwrap_or_else(|| "http://localhost:8000".to_string()),
            database_url: get("GOLDEN_SAPPHIRE_DB_URL"),
            schema_sql_path: get("GOLDEN_SAPPHIRE_DB_SCHEMA").map(PathBuf::from),
            schema_alias_file: get("SCHEMA_ALIAS_FILE").map(PathBuf::from),
            schema_alias_url: get("SCHEMA_ALIAS_URL"),
            rewrite_mode,
            query_timeout: parse("QUERY_TIMEOUT_SECS")?
                .filter(|secs| *secs > 0)
                .map(|secs| Duration::from_secs(secs as u64)),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| llm::DEFAULT_BASE_URL.to_string()),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| llm::DEFAULT_MODEL.to_string()),
            signing_secret,
            signed_url_ttl_secs: parse("SIGNED_URL_TTL_SECS")?.unwrap_or(signing::DEFAULT_TTL_SECS),
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:9999".to_string())
                .trim_end_matches('/')
                .to_string(),
            bind_addr: get("MCP_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:9999".to_string()),
        })
    }

    /// Alias file, then alias service, then the builtin mappings.
    pub async fn schema_context(&self) -> Result<SchemaContext> {
        if let Some(path) = &self.schema_alias_file {
            return SchemaContext::load(path);
        }
        if let Some(url) = &self.schema_alias_url {
            return SchemaContext::fetch(url).await;
        }
        info!("Using builtin schema alias context");
        Ok(SchemaContext::builtin())
    }

    /// Raw schema DDL used as LLM prompt context; empty when not configured.
    pub fn schema_definition(&self) -> Result<String> {
        match &self.schema_sql_path {
            Some(path) => Ok(std::fs::read_to_string(path)?),
            None => Ok(String::new()),
        }
    }

    pub fn executor(&self) -> Option<PgExecutor> {
        self.database_url
            .as_ref()
            .map(|url| PgExecutor::new(url.clone()).with_statement_timeout(self.query_timeout))
    }

    pub fn llm_client(&self) -> Option<LlmClient> {
        self.openai_api_key.as_ref().map(|key| {
            LlmClient::new(key.clone())
                .with_base_url(self.openai_base_url.clone())
                .with_model(self.openai_model.clone())
        })
    }

    pub fn signer(&self) -> UrlSigner {
        UrlSigner::new(&self.signing_secret)
    }

    pub fn file_manager(&self) -> FileManager {
        FileManager::new(self.api_base_url.clone(), self.jwt_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.api_base_url, "http://localhost:8000");
        assert_eq!(s.rewrite_mode, RewriteMode::Basic);
        assert_eq!(s.signed_url_ttl_secs, 600);
        assert_eq!(s.bind_addr, "0.0.0.0:9999");
        assert_eq!(s.openai_model, "gpt-4");
        assert!(s.executor().is_none());
        assert!(s.llm_client().is_none());
        assert_eq!(s.schema_definition().unwrap(), "");
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let s = settings(&[
            ("QUERY_REWRITE_MODE", "semantic"),
            ("QUERY_TIMEOUT_SECS", "30"),
            ("GENAI_JWT_TOKEN", "  "),
            ("PUBLIC_BASE_URL", "https://svc.example.com/"),
            ("OPENAI_API_KEY", "sk-test"),
        ])
        .unwrap();
        assert_eq!(s.rewrite_mode, RewriteMode::Semantic);
        assert_eq!(s.query_timeout, Some(Duration::from_secs(30)));
        assert!(s.jwt_token.is_none());
        assert_eq!(s.public_base_url, "https://svc.example.com");
        assert!(s.llm_client().is_some());
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let err = settings(&[("SIGNED_URL_TTL_SECS", "ten")]).unwrap_err();
        assert!(err.to_string().contains("SIGNED_URL_TTL_SECS"));
        assert!(settings(&[("QUERY_REWRITE_MODE", "fuzzy")]).is_err());
    }

    #[tokio::test]
    async fn test_schema_context_prefers_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctx.json");
        std::fs::write(&path, r#"{"table_aliases": {"orders": "tbl_order"}}"#).unwrap();
        let s = settings(&[("SCHEMA_ALIAS_FILE", path.to_str().unwrap())]).unwrap();
        let ctx = s.schema_context().await.unwrap();
        assert_eq!(ctx.table_aliases.len(), 1);

        let builtin = settings(&[]).unwrap().schema_context().await.unwrap();
        assert_eq!(builtin, SchemaContext::builtin());
    }
}
