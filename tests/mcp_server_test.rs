use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use sapphire_agents::agent::tools::{ExportResultAgent, SchemaAliasContextAgent};
use sapphire_agents::file_manager::FileManager;
use sapphire_agents::mcp::{router, AppState};
use sapphire_agents::signing::UrlSigner;
use sapphire_agents::{AgentRegistry, SchemaContext};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "test-secret";

fn app() -> Router {
    let mut registry = AgentRegistry::new();
    registry.register(Arc::new(SchemaAliasContextAgent::new(Arc::new(SchemaContext::builtin()))));
    registry.register(Arc::new(ExportResultAgent::new()));
    router(AppState {
        registry: Arc::new(registry),
        signer: UrlSigner::new(SECRET),
        // Nothing listens on the discard port.
        files: FileManager::new("http://127.0.0.1:9", None),
    })
}

async fn send(request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn rpc(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .header("mcp-session-id", "session-1")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (status, _, body) = send(get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_initialize_echoes_session() {
    let (status, headers, body) = send(rpc(json!({
        "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}
    })))
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["mcp-session-id"], "session-1");
    assert_eq!(body["result"]["serverInfo"]["name"], "golden_sapphire_mcp");
}

#[tokio::test]
async fn test_notifications_are_accepted() {
    let (status, _, body) = send(rpc(json!({
        "jsonrpc": "2.0", "method": "notifications/initialized"
    })))
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_tools_list_in_registration_order() {
    let (_, _, body) = send(rpc(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))).await;
    let names: Vec<&str> = body["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["schema_alias_context_agent", "export_result_agent"]);
    assert_eq!(body["result"]["tools"][1]["inputSchema"]["required"], json!(["data", "format"]));
}

#[tokio::test]
async fn test_tools_call_returns_structured_content() {
    let (_, _, body) = send(rpc(json!({
        "jsonrpc": "2.0", "id": 3, "method": "tools/call",
        "params": {"name": "schema_alias_context_agent", "arguments": {}}
    })))
    .await;
    let result = &body["result"];
    assert_eq!(result["isError"], false);
    assert_eq!(result["structuredContent"]["table_aliases"]["users"], "amf_user");
    let text: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(text, result["structuredContent"]);
}

#[tokio::test]
async fn test_tools_call_failure_sets_is_error() {
    let (_, _, body) = send(rpc(json!({
        "jsonrpc": "2.0", "id": 4, "method": "tools/call",
        "params": {"name": "export_result_agent", "arguments": {"data": [], "format": "csv"}}
    })))
    .await;
    assert_eq!(body["result"]["isError"], true);
    assert_eq!(body["result"]["structuredContent"]["message"], "No data to export");
}

#[tokio::test]
async fn test_rpc_errors() {
    let (_, _, body) = send(rpc(json!({"jsonrpc": "2.0", "id": 5, "method": "resources/list"}))).await;
    assert_eq!(body["error"]["code"], -32601);

    let (_, _, body) = send(rpc(json!({
        "jsonrpc": "2.0", "id": 6, "method": "tools/call", "params": {"name": "nope"}
    })))
    .await;
    assert_eq!(body["error"]["code"], -32602);
    assert_eq!(body["id"], 6);
}

#[tokio::test]
async fn test_rest_tool_endpoint() {
    let request = Request::builder()
        .method("POST")
        .uri("/tools/schema_alias_context_agent")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let request = Request::builder()
        .method("POST")
        .uri("/tools/unknown")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _, body) = send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Unknown tool: unknown");
}

#[tokio::test]
async fn test_proxy_requires_signature_and_expiry() {
    let (status, _, _) = send(get("/proxy/download/file-1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(get("/proxy/download/file-1?expires=9999999999")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_proxy_rejects_bad_signature() {
    let link = UrlSigner::new("other-secret").sign("file-1", 600);
    let (status, _, body) = send(get(&link)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Invalid signature");
}

#[tokio::test]
async fn test_proxy_rejects_expired_link() {
    let now = chrono::Utc::now().timestamp();
    let link = UrlSigner::new(SECRET).sign_at("file-1", 60, now - 3600);
    let (status, _, body) = send(get(&link)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Link expired");
}

#[tokio::test]
async fn test_proxy_reports_unreachable_upstream() {
    let link = UrlSigner::new(SECRET).sign("file-1", 600);
    let (status, _, body) = send(get(&link)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().is_some());
}
