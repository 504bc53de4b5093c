//! Strongly-typed identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque key of one cached artifact, a content hash computed by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ArtifactKey {
    fn from(hash: &str) -> Self {
        Self::new(hash)
    }
}

impl From<String> for ArtifactKey {
    fn from(hash: String) -> Self {
        Self(hash)
    }
}

impl AsRef<str> for ArtifactKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
