//! Uploads generated files into the caller's session and mints signed
//! download links for them.

use crate::agent::AgentContext;
use crate::error::Result;
use crate::file_manager::FileManager;
use crate::signing::UrlSigner;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedFile {
    pub file_id: String,
    pub filename: String,
    pub download_link: String,
}

#[derive(Clone)]
pub struct ResultPublisher {
    files: FileManager,
    signer: UrlSigner,
    public_base_url: String,
    ttl_secs: i64,
}

impl ResultPublisher {
    pub fn new(files: FileManager, signer: UrlSigner, public_base_url: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            files,
            signer,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            ttl_secs,
        }
    }

    /// File manager scoped to the caller's session.
    pub fn file_manager(&self, ctx: &AgentContext) -> FileManager {
        self.files.for_session(ctx.session_id.clone(), ctx.request_id.clone())
    }

    pub fn download_link(&self, file_id: &str) -> String {
        format!("{}{}", self.public_base_url, self.signer.sign(file_id, self.ttl_secs))
    }

    pub async fn publish(&self, ctx: &AgentContext, content: Vec<u8>, filename: &str) -> Result<PublishedFile> {
        let file_id = self.file_manager(ctx).save(content, filename).await?;
        Ok(PublishedFile {
            download_link: self.download_link(&file_id),
            file_id,
            filename: filename.to_string(),
        })
    }
}
