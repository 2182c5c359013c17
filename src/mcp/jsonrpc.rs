//! Minimal MCP JSON-RPC 2.0 endpoint: initialize, ping, tools/list, tools/call.

use super::{parse_arguments, session_id, AppState, SERVER_NAME, SESSION_HEADER};
use crate::agent::AgentContext;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

pub const PROTOCOL_VERSION: &str = "2025-03-26";

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

fn rpc_result(id: Value, result: Value) -> Response {
    Json(json!({"jsonrpc": "2.0", "id": id, "result": result})).into_response()
}

fn rpc_error(id: Value, code: i64, message: impl Into<String>) -> Response {
    Json(json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message.into()}
    }))
    .into_response()
}

pub async fn handle(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return rpc_error(Value::Null, PARSE_ERROR, format!("Parse error: {}", e)),
    };
    let id = request.id.clone().unwrap_or(Value::Null);
    let session = session_id(&headers);
    debug!("MCP {} (session {:?})", request.method, session);

    match request.method.as_str() {
        "initialize" => {
            let session = session.unwrap_or_else(|| Uuid::new_v4().to_string());
            let mut response = rpc_result(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {"listChanged": false}},
                    "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")}
                }),
            );
            if let Ok(value) = HeaderValue::from_str(&session) {
                response.headers_mut().insert(SESSION_HEADER, value);
            }
            info!("MCP session {} initialized", session);
            response
        }
        method if method.starts_with("notifications/") => StatusCode::ACCEPTED.into_response(),
        "ping" => rpc_result(id, json!({})),
        "tools/list" => rpc_result(id, json!({"tools": state.registry.describe()})),
        "tools/call" => {
            let Some(name) = request.params.get("name").and_then(Value::as_str) else {
                return rpc_error(id, INVALID_PARAMS, "Missing tool name");
            };
            let Some(agent) = state.registry.get(name) else {
                return rpc_error(id, INVALID_PARAMS, format!("Unknown tool: {}", name));
            };
            let arguments = match request.params.get("arguments") {
                None | Some(Value::Null) => json!({}),
                Some(Value::String(raw)) => match parse_arguments(raw.as_bytes()) {
                    Ok(arguments) => arguments,
                    Err(e) => return rpc_error(id, INVALID_PARAMS, format!("Invalid arguments: {}", e)),
                },
                Some(arguments) => arguments.clone(),
            };

            let ctx = AgentContext::new(session);
            info!("Tool call {} (request {})", name, ctx.request_id);
            let outcome = agent.invoke(&ctx, arguments).await;
            let structured = outcome.to_json();
            rpc_result(
                id,
                json!({
                    "content": [{"type": "text", "text": structured.to_string()}],
                    "structuredContent": structured,
                    "isError": !outcome.is_success()
                }),
            )
        }
        other => rpc_error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
    }
}
