//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the cache core and the
//! collaborators it does not own: the network transport and the analytics
//! recorder.

use crate::Result;
use crate::cache::CacheEvent;
use crate::ids::ArtifactKey;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

/// Header carrying the producing task's duration in milliseconds.
pub const ARTIFACT_DURATION_HEADER: &str = "x-artifact-duration";
/// Header carrying the base64 integrity tag of a signed artifact.
pub const ARTIFACT_TAG_HEADER: &str = "x-artifact-tag";

/// Raw response from the artifact store.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    /// Header names are stored lowercased.
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Body as text, for error reporting.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Network access to the remote artifact store.
#[async_trait]
pub trait ArtifactTransport: Send + Sync {
    /// Upload an artifact. `tag` is `None` when signing is disabled.
    async fn put_artifact(
        &self,
        key: &ArtifactKey,
        body: Bytes,
        duration_ms: u64,
        tag: Option<&str>,
    ) -> Result<()>;

    /// Download an artifact. Status interpretation is left to the caller.
    async fn fetch_artifact(&self, key: &ArtifactKey) -> Result<TransportResponse>;

    /// Probe for an artifact without downloading it.
    async fn artifact_exists(&self, key: &ArtifactKey) -> Result<TransportResponse>;
}

/// Sink for cache analytics. Best-effort: implementations must not block or fail.
pub trait AnalyticsRecorder: Send + Sync {
    fn log_event(&self, event: CacheEvent);
}

/// Recorder that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl AnalyticsRecorder for NoopRecorder {
    fn log_event(&self, _event: CacheEvent) {}
}
