//! Query Rewriter
//!
//! Translates user-facing table names and column/value phrases into the
//! physical schema before a statement reaches the database, then gates the
//! result behind a read-only check.
//!
//! Matching is token-approximate on purpose: there is no SQL tokenizer, so
//! aliases inside string literals or comments are rewritten too, and an alias
//! at the very start or end of the statement is left alone by
//! [`resolve_table_alias`].

use crate::schema_context::{ColumnValueMap, SchemaContext, TableAliasMap};
use lazy_static::lazy_static;
use regex::{NoExpand, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

lazy_static! {
    // `.` stops at the newline, so the condition is the rest of the WHERE line.
    static ref WHERE_CLAUSE: Regex = Regex::new(r"(?i)\bWHERE\b\s+(.+)").unwrap();
}

pub const READ_ONLY_MESSAGE: &str = "Only SELECT statements are allowed.";

/// Replace `" alias "`, `" alias\n"` and `" alias,"` with the physical name,
/// one alias at a time in map order.
pub fn resolve_table_alias(sql: &str, aliases: &TableAliasMap) -> String {
    let mut sql = sql.to_string();
    for (alias, actual) in aliases {
        for tail in [" ", "\n", ","] {
            sql = sql.replace(&format!(" {alias}{tail}"), &format!(" {actual}{tail}"));
        }
    }
    sql
}

/// Whole-word, case-insensitive alias replacement.
pub fn rewrite_table_aliases(sql: &str, aliases: &TableAliasMap) -> String {
    let mut sql = sql.to_string();
    for (alias, actual) in aliases {
        if let Some(re) = word_regex(&regex::escape(alias)) {
            sql = re.replace_all(&sql, NoExpand(actual)).into_owned();
        }
    }
    sql
}

/// Rewrite phrases in the first WHERE clause using every table's phrase map.
///
/// `<phrase> = true` collapses into the mapped fragment first, then any bare
/// `<phrase>` left over is replaced. Statements without a WHERE clause come
/// back untouched.
pub fn rewrite_column_value_clauses(sql: &str, value_mappings: &ColumnValueMap) -> String {
    let Some(caps) = WHERE_CLAUSE.captures(sql) else {
        return sql.to_string();
    };
    let (Some(clause), Some(condition)) = (caps.get(0), caps.get(1)) else {
        return sql.to_string();
    };

    let mut condition = condition.as_str().to_string();
    for mappings in value_mappings.values() {
        for (user_term, db_condition) in mappings {
            let term = regex::escape(user_term);
            if let Some(re) = word_regex(&format!(r"{term}\s*=\s*true")) {
                condition = re.replace_all(&condition, NoExpand(db_condition)).into_owned();
            }
            if let Some(re) = word_regex(&term) {
                condition = re.replace_all(&condition, NoExpand(db_condition)).into_owned();
            }
        }
    }

    format!(
        "{}WHERE {}{}",
        &sql[..clause.start()],
        condition,
        &sql[clause.end()..]
    )
}

/// Only statements starting with `select` may reach the database.
pub fn validate_read_only(sql: &str) -> bool {
    sql.trim().to_lowercase().starts_with("select")
}

fn word_regex(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(&format!(r"\b{pattern}\b"))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Which rewrite pipeline the query agent runs before validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RewriteMode {
    /// Space-delimited alias substitution only.
    #[default]
    Basic,
    /// Word-boundary alias substitution plus WHERE phrase rewriting.
    Semantic,
}

impl FromStr for RewriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(RewriteMode::Basic),
            "semantic" => Ok(RewriteMode::Semantic),
            other => Err(format!("Unknown rewrite mode: {}", other)),
        }
    }
}

/// A statement that failed the read-only gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedQuery {
    pub sql: String,
}

impl fmt::Display for RejectedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(READ_ONLY_MESSAGE)
    }
}

impl std::error::Error for RejectedQuery {}

/// Rewriter bound to one immutable schema context.
#[derive(Debug, Clone)]
pub struct QueryRewriter {
    context: Arc<SchemaContext>,
    mode: RewriteMode,
}

impl QueryRewriter {
    pub fn new(context: Arc<SchemaContext>, mode: RewriteMode) -> Self {
        Self { context, mode }
    }

    pub fn mode(&self) -> RewriteMode {
        self.mode
    }

    pub fn context(&self) -> &SchemaContext {
        &self.context
    }

    /// Apply the configured pipeline to a trimmed statement.
    pub fn rewrite(&self, sql: &str) -> String {
        let sql = sql.trim();
        match self.mode {
            RewriteMode::Basic => resolve_table_alias(sql, &self.context.table_aliases),
            RewriteMode::Semantic => {
                let aliased = rewrite_table_aliases(sql, &self.context.table_aliases);
                rewrite_column_value_clauses(&aliased, &self.context.column_value_mappings)
            }
        }
    }

    /// Rewrite, then reject anything that is not a SELECT.
    pub fn prepare(&self, sql: &str) -> std::result::Result<String, RejectedQuery> {
        let resolved = self.rewrite(sql);
        debug!("Resolved SQL ({:?}): {}", self.mode, resolved);
        if validate_read_only(&resolved) {
            Ok(resolved)
        } else {
            Err(RejectedQuery { sql: resolved })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn aliases() -> TableAliasMap {
        SchemaContext::builtin().table_aliases
    }

    fn active_only() -> ColumnValueMap {
        let mut inner = IndexMap::new();
        inner.insert("active".to_string(), "active=true".to_string());
        let mut map = ColumnValueMap::new();
        map.insert("amf_user".to_string(), inner);
        map
    }

    #[test]
    fn test_only_first_where_line_is_rewritten() {
        let sql = "SELECT * FROM amf_user WHERE active\nAND id IN (SELECT user_id FROM amf_message\nWHERE active)";
        assert_eq!(
            rewrite_column_value_clauses(sql, &active_only()),
            "SELECT * FROM amf_user WHERE active=true\nAND id IN (SELECT user_id FROM amf_message\nWHERE active)"
        );
    }

    #[test]
    fn test_resolve_space_delimited_alias() {
        let sql = resolve_table_alias("SELECT * FROM users WHERE id = 1", &aliases());
        assert_eq!(sql, "SELECT * FROM amf_user WHERE id = 1");
        assert!(!sql.contains(" users "));
    }

    #[test]
    fn test_resolve_alias_before_newline_and_comma() {
        let sql = resolve_table_alias("SELECT * FROM users\nJOIN messages, deliveries d", &aliases());
        assert_eq!(sql, "SELECT * FROM amf_user\nJOIN amf_message, amf_delivery d");
    }

    #[test]
    fn test_resolve_skips_alias_at_end_of_string() {
        let sql = "SELECT * FROM users";
        assert_eq!(resolve_table_alias(sql, &aliases()), sql);
    }

    #[test]
    fn test_resolve_is_identity_on_physical_names() {
        let sql = "SELECT u.given_name FROM amf_user u JOIN amf_message m ON m.sender = u.user_name";
        assert_eq!(resolve_table_alias(sql, &aliases()), sql);
    }

    #[test]
    fn test_resolve_rewrites_inside_literals() {
        let sql = resolve_table_alias("SELECT * FROM amf_user WHERE note = ' users '", &aliases());
        assert_eq!(sql, "SELECT * FROM amf_user WHERE note = ' amf_user '");
    }

    #[test]
    fn test_rewrite_table_aliases_word_boundary() {
        let sql = rewrite_table_aliases("select * from USERS join superusers s", &aliases());
        assert_eq!(sql, "select * from amf_user join superusers s");
    }

    #[test]
    fn test_value_clause_equals_true() {
        let sql = rewrite_column_value_clauses(
            "SELECT * FROM amf_user WHERE active = true",
            &active_only(),
        );
        assert_eq!(sql, "SELECT * FROM amf_user WHERE active=true");
    }

    #[test]
    fn test_value_clause_without_where_is_unchanged() {
        let sql = "SELECT active FROM amf_user ORDER BY active";
        assert_eq!(rewrite_column_value_clauses(sql, &active_only()), sql);
    }

    #[test]
    fn test_value_clause_only_touches_where_line() {
        let sql = "SELECT first_name FROM amf_user WHERE first_name = 'Ann'\nORDER BY first_name";
        let ctx = SchemaContext::builtin();
        let rewritten = rewrite_column_value_clauses(sql, &ctx.column_value_mappings);
        assert_eq!(
            rewritten,
            "SELECT first_name FROM amf_user WHERE given_name = 'Ann'\nORDER BY first_name"
        );
    }

    #[test]
    fn test_value_clause_case_insensitive_keyword() {
        let sql = rewrite_column_value_clauses("select * from amf_user where Active", &active_only());
        assert_eq!(sql, "select * from amf_user WHERE active=true");
    }

    #[test]
    fn test_validate_read_only() {
        assert!(validate_read_only("  select * from amf_user"));
        assert!(validate_read_only("SELECT 1"));
        assert!(!validate_read_only("insert into amf_user values (1)"));
        assert!(!validate_read_only(""));
        assert!(!validate_read_only("with x as (select 1) select * from x"));
        assert!(!validate_read_only("-- comment\nselect 1"));
    }

    #[test]
    fn test_prepare_rejects_writes() {
        let rewriter = QueryRewriter::new(Arc::new(SchemaContext::builtin()), RewriteMode::Basic);
        let rejected = rewriter.prepare("DELETE FROM users WHERE id = 1").unwrap_err();
        assert_eq!(rejected.to_string(), READ_ONLY_MESSAGE);
        assert_eq!(
            rewriter.prepare("  SELECT * FROM users WHERE id = $1 ").unwrap(),
            "SELECT * FROM amf_user WHERE id = $1"
        );
    }

    #[test]
    fn test_semantic_mode_pipeline() {
        let mut ctx = SchemaContext::builtin();
        ctx.column_value_mappings = active_only();
        let rewriter = QueryRewriter::new(Arc::new(ctx), RewriteMode::Semantic);
        assert_eq!(
            rewriter.rewrite("SELECT * FROM Users WHERE active = true"),
            "SELECT * FROM amf_user WHERE active=true"
        );
    }

    #[test]
    fn test_rewrite_mode_from_str() {
        assert_eq!("Semantic".parse::<RewriteMode>().unwrap(), RewriteMode::Semantic);
        assert_eq!(" basic ".parse::<RewriteMode>().unwrap(), RewriteMode::Basic);
        assert!("fancy".parse::<RewriteMode>().is_err());
    }
}
