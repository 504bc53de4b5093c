//! Shared fixtures for relay-cache integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use relay_cache::RemoteCacheStore;
use relay_core::cache::CacheEvent;
use relay_core::ports::{
    ARTIFACT_DURATION_HEADER, ARTIFACT_TAG_HEADER, AnalyticsRecorder, ArtifactTransport,
    TransportResponse,
};
use relay_core::{AnchoredPath, ArtifactKey, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,relay_cache=debug")),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub body: Bytes,
    pub duration_ms: u64,
    pub tag: Option<String>,
}

/// In-memory artifact store that also tracks how many calls overlap.
#[derive(Default)]
pub struct MemoryTransport {
    artifacts: Mutex<HashMap<String, StoredArtifact>>,
    forced_response: Mutex<Option<TransportResponse>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call for `delay` so concurrent callers overlap.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Answer every fetch and probe with `status` and `body`.
    pub fn respond_with(&self, status: u16, body: &str) {
        self.respond_with_response(TransportResponse::new(status, body.to_string()));
    }

    pub fn respond_with_response(&self, response: TransportResponse) {
        *self.forced_response.lock().unwrap() = Some(response);
    }

    pub fn insert(&self, key: &str, artifact: StoredArtifact) {
        self.artifacts
            .lock()
            .unwrap()
            .insert(key.to_string(), artifact);
    }

    pub fn stored(&self, key: &str) -> Option<StoredArtifact> {
        self.artifacts.lock().unwrap().get(key).cloned()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        InFlight(&self.in_flight)
    }

    fn forced(&self) -> Option<TransportResponse> {
        self.forced_response.lock().unwrap().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtifactTransport for MemoryTransport {
    async fn put_artifact(
        &self,
        key: &ArtifactKey,
        body: Bytes,
        duration_ms: u64,
        tag: Option<&str>,
    ) -> Result<()> {
        let _guard = self.enter().await;
        self.insert(
            key.as_str(),
            StoredArtifact {
                body,
                duration_ms,
                tag: tag.map(str::to_string),
            },
        );
        Ok(())
    }

    async fn fetch_artifact(&self, key: &ArtifactKey) -> Result<TransportResponse> {
        let _guard = self.enter().await;
        if let Some(response) = self.forced() {
            return Ok(response);
        }
        Ok(match self.stored(key.as_str()) {
            Some(artifact) => {
                let mut response = TransportResponse::new(200, artifact.body)
                    .with_header(ARTIFACT_DURATION_HEADER, artifact.duration_ms.to_string());
                if let Some(tag) = artifact.tag {
                    response = response.with_header(ARTIFACT_TAG_HEADER, tag);
                }
                response
            }
            None => TransportResponse::new(404, ""),
        })
    }

    async fn artifact_exists(&self, key: &ArtifactKey) -> Result<TransportResponse> {
        let _guard = self.enter().await;
        if let Some(response) = self.forced() {
            return Ok(response);
        }
        let status = if self.stored(key.as_str()).is_some() { 200 } else { 404 };
        Ok(TransportResponse::new(status, ""))
    }
}

/// Recorder that keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingRecorder {
    events: Mutex<Vec<CacheEvent>>,
}

impl RecordingRecorder {
    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AnalyticsRecorder for RecordingRecorder {
    fn log_event(&self, event: CacheEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn store(
    root: &Path,
    transport: &Arc<MemoryTransport>,
    recorder: &Arc<RecordingRecorder>,
) -> RemoteCacheStore {
    RemoteCacheStore::new(root, transport.clone(), recorder.clone())
}

pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

pub fn anchored(paths: &[&str]) -> Vec<AnchoredPath> {
    paths.iter().map(|p| AnchoredPath::new(p).unwrap()).collect()
}
