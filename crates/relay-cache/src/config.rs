//! Remote cache configuration.

use crate::limiter::DEFAULT_MAX_CONCURRENT_REQUESTS;
use crate::signature::{ArtifactSigner, SignatureConfig};
use relay_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Remote cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCacheConfig {
    /// Root every cached path is anchored at.
    pub repo_root: PathBuf,
    /// Maximum concurrent put/fetch/exists calls.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Sign uploads and verify downloads. The secret comes from the environment.
    #[serde(default)]
    pub signature: bool,
    /// Artifact API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token for the artifact API.
    #[serde(default)]
    pub token: Option<String>,
    /// Team the artifacts belong to.
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub team_slug: Option<String>,
    /// Client timeout in seconds. `0` disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_concurrent_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}

fn default_api_url() -> String {
    "https://cache.relay.dev".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

impl Default for RemoteCacheConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            max_concurrent_requests: default_max_concurrent_requests(),
            signature: false,
            api_url: default_api_url(),
            token: None,
            team_id: None,
            team_slug: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteCacheConfig {
    /// Create a new config anchored at `repo_root`.
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_team_id(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn with_team_slug(mut self, slug: impl Into<String>) -> Self {
        self.team_slug = Some(slug.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    /// Enable or disable artifact signing.
    pub fn with_signature(mut self, enable: bool) -> Self {
        self.signature = enable;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_requests == 0 {
            return Err(Error::Config(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if !self.repo_root.is_absolute() {
            return Err(Error::Config(format!(
                "repo_root must be absolute, got {}",
                self.repo_root.display()
            )));
        }
        Ok(())
    }

    /// Resolve the signing mode, reading the secret from the environment when
    /// signing is on. Enabled signing without a secret is an error.
    pub fn signature_config(&self) -> Result<SignatureConfig> {
        if !self.signature {
            return Ok(SignatureConfig::Disabled);
        }
        let team_id = self.team_id.clone().unwrap_or_default();
        Ok(SignatureConfig::Enabled(ArtifactSigner::from_env(team_id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RemoteCacheConfig::default();
        assert_eq!(config.max_concurrent_requests, 20);
        assert!(!config.signature);
        assert_eq!(config.timeout_secs, 20);
    }

    #[test]
    fn test_yaml_applies_defaults() {
        let config: RemoteCacheConfig = serde_yaml::from_str(
            r#"
repo_root: /repo
token: abc
team_id: team_123
"#,
        )
        .unwrap();

        assert_eq!(config.repo_root, PathBuf::from("/repo"));
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.max_concurrent_requests, 20);
        assert_eq!(config.api_url, "https://cache.relay.dev");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.yaml");
        std::fs::write(&path, "repo_root: /repo\nmax_concurrent_requests: 4\n").unwrap();

        let config = RemoteCacheConfig::from_file(&path).unwrap();
        assert_eq!(config.max_concurrent_requests, 4);
    }

    #[test]
    fn test_from_file_reports_bad_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.yaml");
        std::fs::write(&path, "repo_root: [unterminated").unwrap();

        assert!(matches!(
            RemoteCacheConfig::from_file(&path),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(RemoteCacheConfig::new("/repo").validate().is_ok());
        assert!(RemoteCacheConfig::new("relative").validate().is_err());
        assert!(RemoteCacheConfig::new("/repo")
            .with_max_concurrent_requests(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_signature_disabled_needs_no_secret() {
        let config = RemoteCacheConfig::new("/repo");
        assert!(!config.signature_config().unwrap().is_enabled());
    }
}
