//! Platform file manager client
//!
//! Uploads and downloads session files through the platform's HTTP file
//! service (`{base}/files`).

use crate::error::{AgentError, Result};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, info};

#[derive(Clone)]
pub struct FileManager {
    client: reqwest::Client,
    api_base_url: String,
    jwt_token: Option<String>,
    session_id: Option<String>,
    request_id: Option<String>,
}

impl FileManager {
    pub fn new(api_base_url: impl Into<String>, jwt_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            jwt_token,
            session_id: None,
            request_id: None,
        }
    }

    /// Same client, scoped to one session/request.
    pub fn for_session(&self, session_id: Option<String>, request_id: impl Into<String>) -> Self {
        Self {
            session_id,
            request_id: Some(request_id.into()),
            ..self.clone()
        }
    }

    pub fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.api_base_url, file_id)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.jwt_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn ensure_success(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AgentError::FileManager(format!("{} failed with {}: {}", what, status, body)))
    }

    /// Upload a file into the current session and return its id.
    pub async fn save(&self, content: Vec<u8>, filename: &str) -> Result<String> {
        let part = Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")?;
        let mut form = Form::new().part("file", part);
        if let Some(session_id) = &self.session_id {
            form = form.text("session_id", session_id.clone());
        }
        if let Some(request_id) = &self.request_id {
            form = form.text("request_id", request_id.clone());
        }

        let request = self
            .client
            .post(format!("{}/files", self.api_base_url))
            .multipart(form);
        let response = self.authorized(request).send().await?;
        let response = Self::ensure_success(response, "Upload").await?;

        let body: Value = response.json().await?;
        let file_id = body
            .get("id")
            .or_else(|| body.get("file_id"))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| AgentError::FileManager(format!("Upload reply has no file id: {}", body)))?;

        info!("Uploaded {} as file {}", filename, file_id);
        Ok(file_id)
    }

    pub async fn get_metadata_by_id(&self, file_id: &str) -> Result<Value> {
        let request = self.client.get(format!("{}/metadata", self.file_url(file_id)));
        let response = self.authorized(request).send().await?;
        let response = Self::ensure_success(response, "Metadata lookup").await?;
        Ok(response.json().await?)
    }

    pub async fn get_by_id(&self, file_id: &str) -> Result<Bytes> {
        let response = self.open_stream(file_id).await?;
        let response = Self::ensure_success(response, "Download").await?;
        let content = response.bytes().await?;
        debug!("Downloaded file {} ({} bytes)", file_id, content.len());
        Ok(content)
    }

    /// Issue the download request and hand back the unread response, whatever
    /// its status, so the caller can stream or report it.
    pub async fn open_stream(&self, file_id: &str) -> Result<Response> {
        let request = self.client.get(self.file_url(file_id));
        Ok(self.authorized(request).send().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_ignore_trailing_slash() {
        let fm = FileManager::new("http://files.local/", None);
        assert_eq!(fm.file_url("abc"), "http://files.local/files/abc");
    }

    #[test]
    fn test_for_session_keeps_base_and_token() {
        let fm = FileManager::new("http://files.local", Some("jwt".to_string()));
        let scoped = fm.for_session(Some("s-1".to_string()), "r-1");
        assert_eq!(scoped.session_id.as_deref(), Some("s-1"));
        assert_eq!(scoped.request_id.as_deref(), Some("r-1"));
        assert_eq!(scoped.jwt_token.as_deref(), Some("jwt"));
        assert_eq!(scoped.file_url("x"), "http://files.local/files/x");
        assert!(fm.session_id.is_none());
    }
}
