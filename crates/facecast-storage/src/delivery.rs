//! Opaque, HMAC-signed artifact tokens.
//!
//! A token names one `(job_id, layout)` artifact and carries its own expiry,
//! so downloads can be served without exposing storage paths.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use facecast_models::{JobId, LayoutId};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::DEFAULT_ARTIFACT_TTL_SECS;
use crate::error::{StorageError, StorageResult};

type HmacSha256 = Hmac<Sha256>;

/// Token signing configuration.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Secret key for HMAC signing.
    pub signing_secret: String,
    /// Token lifetime.
    pub token_expiry: Duration,
}

impl DeliveryConfig {
    pub fn new(signing_secret: impl Into<String>, token_expiry: Duration) -> Self {
        Self {
            signing_secret: signing_secret.into(),
            token_expiry,
        }
    }

    /// Create config from environment variables.
    ///
    /// Without `DELIVERY_SIGNING_SECRET` a random per-process secret is used,
    /// so tokens do not survive a restart.
    pub fn from_env() -> Self {
        let signing_secret = std::env::var("DELIVERY_SIGNING_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                tracing::warn!("DELIVERY_SIGNING_SECRET not set, using an ephemeral secret");
                format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
            });

        let expiry_secs = std::env::var("ARTIFACT_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|s: &u64| *s > 0)
            .unwrap_or(DEFAULT_ARTIFACT_TTL_SECS);

        Self::new(signing_secret, Duration::from_secs(expiry_secs))
    }

    /// Issue a signed token for an artifact.
    pub fn issue(&self, job_id: &JobId, layout: LayoutId) -> StorageResult<String> {
        ArtifactToken::new(job_id, layout, self.token_expiry).sign(&self.signing_secret)
    }

    /// Verify a signed token. `None` for forged, malformed or expired tokens.
    pub fn verify(&self, signed: &str) -> StorageResult<Option<ArtifactToken>> {
        ArtifactToken::verify(signed, &self.signing_secret)
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactToken {
    /// Job ID.
    pub jid: String,
    /// Layout.
    pub layout: LayoutId,
    /// Expiry timestamp (Unix seconds).
    pub exp: u64,
}

impl ArtifactToken {
    pub fn new(job_id: &JobId, layout: LayoutId, expiry: Duration) -> Self {
        Self {
            jid: job_id.to_string(),
            layout,
            exp: now_secs() + expiry.as_secs(),
        }
    }

    pub fn job_id(&self) -> JobId {
        JobId::from_string(self.jid.clone())
    }

    pub fn is_expired(&self) -> bool {
        now_secs() >= self.exp
    }

    fn encode(&self) -> StorageResult<String> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    fn decode(encoded: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn mac(secret: &str) -> StorageResult<HmacSha256> {
        HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| StorageError::config_error(format!("Invalid HMAC key: {}", e)))
    }

    /// Sign with HMAC-SHA256 as `payload.signature`.
    pub fn sign(&self, secret: &str) -> StorageResult<String> {
        let payload = self.encode()?;
        let mut mac = Self::mac(secret)?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!("{}.{}", payload, URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Verify a signed token.
    ///
    /// Returns `None` if the token is malformed, expired, or the signature does
    /// not match. Errors only on configuration problems.
    pub fn verify(signed: &str, secret: &str) -> StorageResult<Option<Self>> {
        let Some((payload, sig_encoded)) = signed.split_once('.') else {
            return Ok(None);
        };
        let Ok(sig_bytes) = URL_SAFE_NO_PAD.decode(sig_encoded) else {
            return Ok(None);
        };

        let mut mac = Self::mac(secret)?;
        mac.update(payload.as_bytes());
        if mac.verify_slice(&sig_bytes).is_err() {
            return Ok(None);
        }

        Ok(Self::decode(payload).filter(|t| !t.is_expired()))
    }
}
