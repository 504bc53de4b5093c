//! Cache types.

use crate::ids::ArtifactKey;
use crate::path::AnchoredPath;
use serde::{Deserialize, Serialize};

/// Where a cache event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEventKind {
    Hit,
    Miss,
}

/// Analytics record emitted after every remote fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEvent {
    pub source: CacheSource,
    pub event: CacheEventKind,
    pub hash: ArtifactKey,
    /// Time the producing task took, in milliseconds.
    pub duration: u64,
}

impl CacheEvent {
    pub fn remote(hit: bool, hash: ArtifactKey, duration: u64) -> Self {
        Self {
            source: CacheSource::Remote,
            event: if hit {
                CacheEventKind::Hit
            } else {
                CacheEventKind::Miss
            },
            hash,
            duration,
        }
    }
}

/// Result of fetching one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Whether the store had content for the key.
    pub hit: bool,
    /// Restored paths, in archive order.
    pub files: Vec<AnchoredPath>,
    /// Time the producing task took, in milliseconds.
    pub duration_ms: u64,
}

impl FetchOutcome {
    pub fn miss() -> Self {
        Self::default()
    }

    pub fn hit(files: Vec<AnchoredPath>, duration_ms: u64) -> Self {
        Self {
            hit: true,
            files,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cache_event_serialization() {
        let event = CacheEvent::remote(true, ArtifactKey::from("abc123"), 42);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "source": "remote",
                "event": "hit",
                "hash": "abc123",
                "duration": 42,
            })
        );
    }

    #[test]
    fn test_miss_outcome_is_empty() {
        let outcome = FetchOutcome::miss();
        assert!(!outcome.hit);
        assert!(outcome.files.is_empty());
        assert_eq!(outcome.duration_ms, 0);
    }
}
