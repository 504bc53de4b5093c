//! Serialization tests for relay-core types.

use relay_core::cache::{CacheEvent, CacheEventKind, CacheSource};
use relay_core::{AnchoredPath, ArtifactKey};

#[test]
fn test_cache_event_roundtrip() {
    let event = CacheEvent::remote(false, ArtifactKey::from("abc123"), 0);

    let json = serde_json::to_string(&event).expect("serialize");
    let parsed: CacheEvent = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(event, parsed);
    assert_eq!(parsed.source, CacheSource::Remote);
    assert_eq!(parsed.event, CacheEventKind::Miss);
}

#[test]
fn test_artifact_key_is_transparent() {
    let key = ArtifactKey::from("abc123");
    assert_eq!(serde_json::to_string(&key).expect("serialize"), "\"abc123\"");
}

#[test]
fn test_anchored_path_roundtrip() {
    let path = AnchoredPath::new("dist/./out.js").expect("valid path");

    let json = serde_json::to_string(&path).expect("serialize");
    assert_eq!(json, "\"dist/out.js\"");

    let parsed: AnchoredPath = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(parsed, path);
}

#[test]
fn test_anchored_path_rejects_empty_on_deserialize() {
    let parsed: Result<AnchoredPath, _> = serde_json::from_str("\"\"");
    assert!(parsed.is_err());
}
