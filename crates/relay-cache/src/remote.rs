//! Remote cache store backed by an artifact transport.

use crate::archiver;
use crate::config::RemoteCacheConfig;
use crate::limiter::ConcurrencyLimiter;
use crate::pipe::{self, DEFAULT_PIPE_CAPACITY};
use crate::provider::CacheProvider;
use crate::signature::SignatureConfig;
use async_trait::async_trait;
use bytes::Bytes;
use relay_core::cache::{CacheEvent, FetchOutcome};
use relay_core::ports::{
    ARTIFACT_DURATION_HEADER, ARTIFACT_TAG_HEADER, AnalyticsRecorder, ArtifactTransport,
    TransportResponse,
};
use relay_core::{AnchoredPath, ArtifactKey, Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cache backend that stores artifacts in a network-accessible store.
///
/// Safe to share between concurrent callers; every put, fetch and exists call
/// holds one limiter permit for its whole duration.
pub struct RemoteCacheStore {
    repo_root: PathBuf,
    transport: Arc<dyn ArtifactTransport>,
    recorder: Arc<dyn AnalyticsRecorder>,
    limiter: ConcurrencyLimiter,
    signature: SignatureConfig,
}

impl RemoteCacheStore {
    /// Create a store with the default limiter and signing disabled.
    pub fn new(
        repo_root: impl Into<PathBuf>,
        transport: Arc<dyn ArtifactTransport>,
        recorder: Arc<dyn AnalyticsRecorder>,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            transport,
            recorder,
            limiter: ConcurrencyLimiter::default(),
            signature: SignatureConfig::Disabled,
        }
    }

    /// Create a store from configuration, resolving the signing secret.
    pub fn from_config(
        config: &RemoteCacheConfig,
        transport: Arc<dyn ArtifactTransport>,
        recorder: Arc<dyn AnalyticsRecorder>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.repo_root.clone(), transport, recorder)
            .with_limiter(ConcurrencyLimiter::new(config.max_concurrent_requests))
            .with_signature(config.signature_config()?))
    }

    pub fn with_signature(mut self, signature: SignatureConfig) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_limiter(mut self, limiter: ConcurrencyLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Pack `files` on a blocking thread while this task collects the bytes.
    async fn archive(&self, files: &[AnchoredPath]) -> Result<Vec<u8>> {
        let (writer, reader) = pipe::pipe(DEFAULT_PIPE_CAPACITY);
        let failure = writer.failure_handle();
        let root = self.repo_root.clone();
        let files = files.to_vec();

        let producer = tokio::task::spawn_blocking(move || {
            let packed = archiver::pack(&root, &files, writer)
                .and_then(|mut writer| writer.flush().map_err(Error::from));
            if let Err(err) = packed {
                failure.fail(err);
            }
        });

        // The whole archive is needed before it can be signed.
        let body = reader.read_to_end().await;
        producer
            .await
            .map_err(|e| Error::Internal(format!("archive producer failed: {}", e)))?;
        body
    }

    async fn retrieve(&self, key: &ArtifactKey) -> Result<FetchOutcome> {
        let response = self.transport.fetch_artifact(key).await?;

        if response.is_not_found() {
            return Ok(FetchOutcome::miss());
        }
        if !response.is_success() {
            return Err(Error::UnexpectedStatus {
                status: response.status,
                body: response.text(),
            });
        }

        let duration = artifact_duration(&response)?;

        if let Some(signer) = self.signature.signer() {
            let tag = response
                .header(ARTIFACT_TAG_HEADER)
                .ok_or(Error::ArtifactTagMissing)?;
            if !signer.validate(key, &response.body, tag)? {
                return Err(Error::InvalidTag);
            }
        }

        let root = self.repo_root.clone();
        let body = response.body;
        let files = tokio::task::spawn_blocking(move || archiver::restore(&root, &body[..]))
            .await
            .map_err(|e| Error::Internal(format!("archive restore failed: {}", e)))??;

        Ok(FetchOutcome::hit(files, duration))
    }

    async fn probe(&self, key: &ArtifactKey) -> Result<bool> {
        let response = self.transport.artifact_exists(key).await?;
        if response.is_not_found() {
            return Ok(false);
        }
        if !response.is_success() {
            return Err(Error::UnexpectedStatus {
                status: response.status,
                body: response.text(),
            });
        }
        Ok(true)
    }

    fn log_fetch(&self, hit: bool, key: &ArtifactKey, duration: u64) {
        self.recorder
            .log_event(CacheEvent::remote(hit, key.clone(), duration));
    }
}

fn artifact_duration(response: &TransportResponse) -> Result<u64> {
    match response.header(ARTIFACT_DURATION_HEADER) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::InvalidDuration(value.to_string())),
        None => Ok(0),
    }
}

#[async_trait]
impl CacheProvider for RemoteCacheStore {
    async fn put(&self, key: &ArtifactKey, duration_ms: u64, files: &[AnchoredPath]) -> Result<()> {
        let _permit = self.limiter.acquire().await?;

        let body = self.archive(files).await?;
        let tag = match self.signature.signer() {
            Some(signer) => Some(signer.generate(key, &body)?),
            None => None,
        };

        let size = body.len();
        self.transport
            .put_artifact(key, Bytes::from(body), duration_ms, tag.as_deref())
            .await?;

        info!(key = %key, files = files.len(), bytes = size, "Stored artifact in remote cache");
        Ok(())
    }

    async fn fetch(&self, key: &ArtifactKey) -> Result<FetchOutcome> {
        let _permit = self.limiter.acquire().await?;

        match self.retrieve(key).await {
            Ok(outcome) => {
                if outcome.hit {
                    info!(key = %key, files = outcome.files.len(), "Remote cache hit");
                } else {
                    debug!(key = %key, "Remote cache miss");
                }
                self.log_fetch(outcome.hit, key, outcome.duration_ms);
                Ok(outcome)
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Failed to retrieve files from remote cache");
                self.log_fetch(false, key, 0);
                Err(err)
            }
        }
    }

    async fn exists(&self, key: &ArtifactKey) -> bool {
        let Ok(_permit) = self.limiter.acquire().await else {
            return false;
        };

        match self.probe(key).await {
            Ok(hit) => hit,
            Err(err) => {
                warn!(key = %key, error = %err, "Remote cache existence check failed, treating as missing");
                false
            }
        }
    }

    /// A remote store cannot purge by path.
    async fn clean(&self, _path: &Path) {}

    /// A remote store cannot purge globally.
    async fn clean_all(&self) {}
}
