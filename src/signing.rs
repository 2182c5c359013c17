//! Signed download URLs
//!
//! `HMAC-SHA256(secret, "{file_id}:{expires}")`, base64url without padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TTL_SECS: i64 = 600;
pub const PROXY_PREFIX: &str = "/proxy/download";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Link expired")]
    Expired,

    #[error("Invalid signature")]
    Invalid,
}

#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, file_id: &str, expires: i64) -> HmacSha256 {
        // HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC key length is unrestricted"));
        mac.update(format!("{}:{}", file_id, expires).as_bytes());
        mac
    }

    pub fn signature(&self, file_id: &str, expires: i64) -> String {
        URL_SAFE_NO_PAD.encode(self.mac(file_id, expires).finalize().into_bytes())
    }

    /// Relative proxy path valid until `now + expires_in` (saturating).
    pub fn sign_at(&self, file_id: &str, expires_in: i64, now: i64) -> String {
        let expires = now.saturating_add(expires_in);
        format!(
            "{}/{}?expires={}&signature={}",
            PROXY_PREFIX,
            file_id,
            expires,
            self.signature(file_id, expires)
        )
    }

    pub fn sign(&self, file_id: &str, expires_in: i64) -> String {
        self.sign_at(file_id, expires_in, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(
        &self,
        file_id: &str,
        expires: &str,
        signature: &str,
        now: i64,
    ) -> Result<(), SignatureError> {
        let expires: i64 = expires.trim().parse().map_err(|_| SignatureError::Invalid)?;
        if expires < now {
            return Err(SignatureError::Expired);
        }
        let provided = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SignatureError::Invalid)?;
        self.mac(file_id, expires)
            .verify_slice(&provided)
            .map_err(|_| SignatureError::Invalid)
    }

    pub fn verify(&self, file_id: &str, expires: &str, signature: &str) -> Result<(), SignatureError> {
        self.verify_at(file_id, expires, signature, chrono::Utc::now().timestamp())
    }
}
