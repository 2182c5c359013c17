//! Golden Sapphire agent services
//!
//! Read-only SQL rewriting against the sales database, plus the small agents
//! around it (schema context, SQL generation, export, CSV conversion) and an
//! HTTP tool server that exposes them.

pub mod agent;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod file_manager;
pub mod llm;
pub mod logging;
pub mod mcp;
pub mod platform;
pub mod publish;
pub mod rewriter;
pub mod schema_context;
pub mod signing;

pub use agent::{Agent, AgentContext, AgentOutcome, AgentRegistry, FailureKind};
pub use error::{AgentError, Result};
pub use rewriter::{QueryRewriter, RewriteMode};
pub use schema_context::SchemaContext;
