//! Paths anchored at a fixed root.
//!
//! An [`AnchoredPath`] is held in a canonical forward-slash form so that the
//! same artifact produces the same archive names on every host. Conversion to
//! a native path only happens through [`AnchoredPath::resolve`], which refuses
//! to produce anything outside the root.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A path relative to a fixed root, in canonical `/`-separated form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AnchoredPath(String);

impl AnchoredPath {
    /// Build an anchored path from a canonical or native string.
    ///
    /// Backslashes are treated as separators, `.` and empty segments are
    /// dropped and interior `..` segments are folded. Leading `..` segments
    /// and absolute forms are kept as-is so that [`resolve`](Self::resolve)
    /// can reject them.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        if raw.contains('\0') {
            return Err(Error::InvalidPath(raw.replace('\0', "\\0")));
        }

        let unified = raw.replace('\\', "/");
        let absolute = unified.starts_with('/');

        let mut segments: Vec<&str> = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => {}
                ".." => match segments.last() {
                    Some(last) if *last != ".." => {
                        segments.pop();
                    }
                    _ => segments.push(".."),
                },
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            return Err(Error::InvalidPath(format!(
                "'{}' does not name anything below the root",
                raw
            )));
        }

        let joined = segments.join("/");
        Ok(Self(if absolute {
            format!("/{}", joined)
        } else {
            joined
        }))
    }

    /// Build an anchored path from a native relative path.
    pub fn from_system_path(path: &Path) -> Result<Self> {
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => parts.push(
                    part.to_str()
                        .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?
                        .to_string(),
                ),
                Component::ParentDir => parts.push("..".to_string()),
                Component::CurDir => {}
                Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::InvalidPath(format!(
                        "{} is absolute, expected a path relative to the root",
                        path.display()
                    )));
                }
            }
        }
        Self::new(parts.join("/"))
    }

    /// The canonical `/`-separated form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The parent path, or `None` for a top-level entry.
    pub fn parent(&self) -> Option<AnchoredPath> {
        self.0
            .rsplit_once('/')
            .filter(|(parent, _)| !parent.is_empty())
            .map(|(parent, _)| Self(parent.to_string()))
    }

    /// Append a relative child.
    pub fn join(&self, child: impl AsRef<str>) -> Result<AnchoredPath> {
        Self::new(format!("{}/{}", self.0, child.as_ref()))
    }

    /// Resolve against `root`, refusing any result outside of it.
    pub fn resolve(&self, root: &Path) -> Result<PathBuf> {
        let escapes = || Error::PathEscapesRoot(format!("{} (root {})", self.0, root.display()));

        if self.0.starts_with('/') || self.0 == ".." || self.0.starts_with("../") {
            return Err(escapes());
        }

        let mut resolved = root.to_path_buf();
        for segment in self.0.split('/') {
            let native = Path::new(segment);
            // Drive prefixes and other non-normal forms only show up on Windows.
            if !matches!(native.components().next(), Some(Component::Normal(_)))
                || native.components().count() != 1
            {
                return Err(escapes());
            }
            resolved.push(segment);
        }

        if !resolved.starts_with(root) {
            return Err(escapes());
        }
        Ok(resolved)
    }
}

impl fmt::Display for AnchoredPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for AnchoredPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for AnchoredPath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AnchoredPath> for String {
    fn from(path: AnchoredPath) -> Self {
        path.0
    }
}
