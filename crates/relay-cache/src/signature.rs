//! Artifact signing and verification.
//!
//! A tag is an HMAC-SHA256 over a small JSON document naming the artifact
//! key and team, followed by the archive bytes. Tags travel base64 encoded.

use base64::{Engine, prelude::BASE64_STANDARD};
use hmac::{Hmac, Mac};
use relay_core::{ArtifactKey, Error, Result};
use serde::Serialize;
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Environment variable holding the shared signing secret.
pub const SIGNATURE_KEY_ENV: &str = "RELAY_REMOTE_CACHE_SIGNATURE_KEY";

/// Whether artifacts are signed on upload and verified on download.
#[derive(Debug, Clone, Default)]
pub enum SignatureConfig {
    #[default]
    Disabled,
    Enabled(ArtifactSigner),
}

impl SignatureConfig {
    pub fn is_enabled(&self) -> bool {
        matches!(self, SignatureConfig::Enabled(_))
    }

    pub fn signer(&self) -> Option<&ArtifactSigner> {
        match self {
            SignatureConfig::Enabled(signer) => Some(signer),
            SignatureConfig::Disabled => None,
        }
    }
}

#[derive(Serialize)]
struct ArtifactMetadata<'a> {
    hash: &'a str,
    #[serde(rename = "teamId")]
    team_id: &'a str,
}

/// Computes and checks integrity tags with a shared secret.
#[derive(Clone)]
pub struct ArtifactSigner {
    team_id: String,
    secret: Vec<u8>,
}

impl ArtifactSigner {
    pub fn new(team_id: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            team_id: team_id.into(),
            secret: secret.into(),
        }
    }

    /// Build a signer whose secret comes from [`SIGNATURE_KEY_ENV`].
    pub fn from_env(team_id: impl Into<String>) -> Result<Self> {
        let secret = std::env::var(SIGNATURE_KEY_ENV).map_err(|_| {
            Error::Signature(format!(
                "signature secret key not found. You must specify a secret key in the {} \
                 environment variable",
                SIGNATURE_KEY_ENV
            ))
        })?;
        Ok(Self::new(team_id, secret))
    }

    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    fn mac_for(&self, key: &ArtifactKey, body: &[u8]) -> Result<HmacSha256> {
        let metadata = serde_json::to_string(&ArtifactMetadata {
            hash: key.as_str(),
            team_id: &self.team_id,
        })?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Signature(format!("unusable secret key: {}", e)))?;
        mac.update(metadata.as_bytes());
        mac.update(body);
        Ok(mac)
    }

    /// Produce the base64 tag for `body` stored under `key`.
    pub fn generate(&self, key: &ArtifactKey, body: &[u8]) -> Result<String> {
        let tag = self.mac_for(key, body)?.finalize().into_bytes();
        Ok(BASE64_STANDARD.encode(tag))
    }

    /// Check `tag` against `body`.
    ///
    /// Returns `Ok(false)` on a mismatch; a tag that cannot be decoded is an
    /// error rather than a mismatch.
    pub fn validate(&self, key: &ArtifactKey, body: &[u8], tag: &str) -> Result<bool> {
        let expected = BASE64_STANDARD
            .decode(tag.trim())
            .map_err(|e| Error::Signature(format!("base64 decoding error: {}", e)))?;
        Ok(self.mac_for(key, body)?.verify_slice(&expected).is_ok())
    }
}

impl fmt::Debug for ArtifactSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactSigner")
            .field("team_id", &self.team_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}
