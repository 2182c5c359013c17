//! Signed, streaming download proxy in front of the platform file service.

use super::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub expires: Option<String>,
    pub signature: Option<String>,
}

fn json_error(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

pub async fn download(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    let expires = query.expires.filter(|s| !s.is_empty());
    let signature = query.signature.filter(|s| !s.is_empty());
    let (Some(expires), Some(signature)) = (expires, signature) else {
        return json_error(
            StatusCode::BAD_REQUEST,
            json!({"error": "Missing signature or expiration"}),
        );
    };

    if let Err(e) = state.signer.verify(&file_id, &expires, &signature) {
        warn!("Rejected download of {}: {}", file_id, e);
        return json_error(StatusCode::FORBIDDEN, json!({"error": e.to_string()}));
    }

    let upstream = match state.files.open_stream(&file_id).await {
        Ok(response) => response,
        Err(e) => return json_error(StatusCode::BAD_GATEWAY, json!({"error": e.to_string()})),
    };

    let status = upstream.status();
    if status != reqwest::StatusCode::OK {
        let details = upstream.text().await.unwrap_or_default();
        return json_error(
            StatusCode::BAD_GATEWAY,
            json!({
                "error": format!("Failed to fetch file: {}", status.as_u16()),
                "details": details
            }),
        );
    }

    let upstream_header = |name: reqwest::header::HeaderName| {
        upstream
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let content_type = upstream_header(reqwest::header::CONTENT_TYPE)
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = upstream_header(reqwest::header::CONTENT_DISPOSITION)
        .unwrap_or_else(|| format!("attachment; filename=\"{}\"", file_id));

    info!("Streaming file {} ({})", file_id, content_type);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(upstream.bytes_stream()))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
