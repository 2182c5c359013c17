//! Schema alias context
//!
//! Static alias, phrase and relationship metadata used to translate
//! user-facing names into the physical Golden Sapphire schema. Built once at
//! startup and shared read-only by every agent.

use crate::error::{AgentError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Logical table name -> physical table name.
pub type TableAliasMap = IndexMap<String, String>;

/// Physical table -> (logical phrase -> physical SQL fragment).
pub type ColumnValueMap = IndexMap<String, IndexMap<String, String>>;

/// Physical table -> (relationship description -> join predicate).
pub type RelationshipMap = IndexMap<String, IndexMap<String, String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaContext {
    #[serde(default)]
    pub table_aliases: TableAliasMap,
    #[serde(default)]
    pub column_value_mappings: ColumnValueMap,
    #[serde(default)]
    pub table_relationships: RelationshipMap,
}

fn pairs<const N: usize>(entries: [(&str, &str); N]) -> IndexMap<String, String> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl SchemaContext {
    /// The hardcoded Golden Sapphire mappings.
    pub fn builtin() -> Self {
        let table_aliases = pairs([
            ("users", "amf_user"),
            ("messages", "amf_message"),
            ("deliveries", "amf_delivery"),
            ("customers", "amf_customer"),
        ]);

        let mut column_value_mappings = ColumnValueMap::new();
        column_value_mappings.insert(
            "amf_user".to_string(),
            pairs([
                ("active", "active=true"),
                ("inactive", "active = false"),
                ("first_name", "given_name"),
                ("last_name", "surname"),
                ("email_address", "email"),
                ("phone", "phone_number"),
            ]),
        );
        column_value_mappings.insert(
            "amf_message".to_string(),
            pairs([
                ("message_id", "message_id::text"),
                ("delivered", "status = 'Delivered'"),
                ("failed", "status = 'Failed'"),
                ("held", "status = 'Held'"),
                ("queued", "status = 'Queued'"),
                ("date", "create_time"),
                ("message_type", "msg_type"),
                ("id", "message_id"),
                ("create_time", "create_time::text"),
                ("file_size", "file_size"),
            ]),
        );
        column_value_mappings.insert(
            "amf_delivery".to_string(),
            pairs([
                ("delivered", "status = 'Delivered'"),
                ("failed", "status = 'Failed'"),
                ("held", "status = 'Held'"),
                ("queued", "status = 'Queued'"),
                ("date", "create_time"),
                ("active", "deleted= false"),
                ("deleted", "deleted= true"),
            ]),
        );
        column_value_mappings.insert(
            "amf_customer".to_string(),
            pairs([("customer_name", "customer"), ("billing_id", "billing_id")]),
        );

        let mut table_relationships = RelationshipMap::new();
        table_relationships.insert(
            "amf_user".to_string(),
            pairs([("customer → amf_customer.customer_id", "u.customer_id = c.customer_id")]),
        );
        table_relationships.insert(
            "amf_message".to_string(),
            pairs([
                ("sender → amf_user.user_name", "m.sender = u.user_name"),
                ("receiver → amf_user.user_name", "m.receiver = u.user_name"),
            ]),
        );
        table_relationships.insert(
            "amf_delivery".to_string(),
            pairs([
                ("sender → amf_user.user_name", "d.sender = u.user_name"),
                ("receiver → amf_user.user_name", "d.receiver = u.user_name"),
                ("file_size → amf_message.file_size", "d.message_id = m.message_id"),
                ("message_id → amf_message.message_id", "d.message_id = m.message_id"),
                ("status → amf_message.status", "d.message_id = m.message_id"),
            ]),
        );

        Self {
            table_aliases,
            column_value_mappings,
            table_relationships,
        }
    }

    /// Load the context from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let context: SchemaContext = serde_json::from_str(&content)?;
        info!(
            "Loaded schema context from {} ({} aliases)",
            path.display(),
            context.table_aliases.len()
        );
        Ok(context)
    }

    /// Fetch the context from a sibling service that returns the same JSON shape.
    pub async fn fetch(url: &str) -> Result<Self> {
        let response = reqwest::get(url).await?;
        if !response.status().is_success() {
            return Err(AgentError::Config(format!(
                "Schema context service at {} returned {}",
                url,
                response.status()
            )));
        }
        let context: SchemaContext = response.json().await?;
        info!("Fetched schema context from {}", url);
        Ok(context)
    }

    /// JSON form handed to callers as prompt context.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "table_aliases": self.table_aliases,
            "column_value_mappings": self.column_value_mappings,
            "table_relationships": self.table_relationships,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_keeps_declaration_order() {
        let ctx = SchemaContext::builtin();
        let aliases: Vec<&str> = ctx.table_aliases.keys().map(String::as_str).collect();
        assert_eq!(aliases, vec!["users", "messages", "deliveries", "customers"]);
        assert_eq!(ctx.column_value_mappings["amf_user"]["active"], "active=true");
        assert_eq!(ctx.column_value_mappings["amf_delivery"]["active"], "deleted= false");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        std::fs::write(
            &path,
            r#"{"table_aliases": {"orders": "tbl_order", "items": "tbl_item"}}"#,
        )
        .unwrap();

        let ctx = SchemaContext::load(&path).unwrap();
        assert_eq!(ctx.table_aliases["orders"], "tbl_order");
        assert_eq!(ctx.table_aliases.get_index(1).unwrap().0, "items");
        assert!(ctx.column_value_mappings.is_empty());
        assert!(ctx.table_relationships.is_empty());
    }

    #[test]
    fn test_json_shape_matches_alias_agent_reply() {
        let json = SchemaContext::builtin().to_json();
        assert_eq!(json["table_aliases"]["users"], "amf_user");
        assert_eq!(
            json["table_relationships"]["amf_message"]["sender → amf_user.user_name"],
            "m.sender = u.user_name"
        );
    }
}
