//! Cache capability trait shared by every cache backend.

use async_trait::async_trait;
use relay_core::cache::FetchOutcome;
use relay_core::{AnchoredPath, ArtifactKey, Result};
use std::path::Path;

/// Trait for cache storage backends.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Store `files` under `key`. `duration_ms` is how long the producing task took.
    async fn put(&self, key: &ArtifactKey, duration_ms: u64, files: &[AnchoredPath]) -> Result<()>;

    /// Restore the artifact stored under `key`. A miss is not an error.
    async fn fetch(&self, key: &ArtifactKey) -> Result<FetchOutcome>;

    /// Check if a key exists.
    async fn exists(&self, key: &ArtifactKey) -> bool;

    /// Remove cached content for a path.
    async fn clean(&self, path: &Path);

    /// Remove all cached content.
    async fn clean_all(&self);
}
