//! HTTP tool server
//!
//! Exposes every registered agent as an MCP tool (`POST /mcp`, JSON-RPC) and
//! as a plain `POST /tools/{name}` endpoint, plus the signed download proxy.

pub mod jsonrpc;
pub mod proxy;

use crate::agent::tools::{
    CsvToJsonAgent, ExportResultAgent, PostgresQueryAgent, SchemaAliasContextAgent, SqlGeneratorAgent,
};
use crate::agent::{AgentContext, AgentRegistry};
use crate::config::Settings;
use crate::db::QueryExecutor;
use crate::error::Result;
use crate::file_manager::FileManager;
use crate::publish::ResultPublisher;
use crate::rewriter::QueryRewriter;
use crate::schema_context::SchemaContext;
use crate::signing::UrlSigner;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const SERVER_NAME: &str = "golden_sapphire_mcp";
pub const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AgentRegistry>,
    pub signer: UrlSigner,
    pub files: FileManager,
}

impl AppState {
    /// Wire every agent the configuration allows.
    pub fn from_settings(settings: &Settings, context: Arc<SchemaContext>) -> Result<Self> {
        let signer = settings.signer();
        let files = settings.file_manager();
        let publisher = ResultPublisher::new(
            files.clone(),
            signer.clone(),
            settings.public_base_url.clone(),
            settings.signed_url_ttl_secs,
        );

        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(SchemaAliasContextAgent::new(context.clone())));

        match settings.executor() {
            Some(executor) => {
                let executor: Arc<dyn QueryExecutor> = Arc::new(executor);
                let rewriter = QueryRewriter::new(context.clone(), settings.rewrite_mode);
                registry.register(Arc::new(
                    PostgresQueryAgent::new(rewriter, executor).with_publisher(publisher.clone()),
                ));
            }
            None => warn!("GOLDEN_SAPPHIRE_DB_URL not set - postgres_query_agent disabled"),
        }

        match settings.llm_client() {
            Some(llm) => {
                let schema_definition = settings.schema_definition()?;
                registry.register(Arc::new(SqlGeneratorAgent::new(llm, context, schema_definition)));
            }
            None => warn!("OPENAI_API_KEY not set - gs_sql_generator disabled"),
        }

        registry.register(Arc::new(ExportResultAgent::new()));
        registry.register(Arc::new(CsvToJsonAgent::new(publisher)));

        info!("Registered {} tools", registry.len());
        Ok(Self {
            registry: Arc::new(registry),
            signer,
            files,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/mcp", post(jsonrpc::handle))
        .route("/tools/:name", post(call_tool))
        .route("/proxy/download/:file_id", get(proxy::download))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, bind_addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("MCP server listening on {}", bind_addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub(crate) fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

pub(crate) fn parse_arguments(body: &[u8]) -> std::result::Result<Value, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// `POST /tools/{name}`: body is the argument object, reply is the outcome.
async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(agent) = state.registry.get(&name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Unknown tool: {}", name)})),
        )
            .into_response();
    };
    let arguments = match parse_arguments(&body) {
        Ok(arguments) => arguments,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("Invalid JSON body: {}", e)})),
            )
                .into_response()
        }
    };

    let ctx = AgentContext::new(session_id(&headers));
    info!("Tool call {} (request {})", name, ctx.request_id);
    let outcome = agent.invoke(&ctx, arguments).await;
    Json(outcome.to_json()).into_response()
}
