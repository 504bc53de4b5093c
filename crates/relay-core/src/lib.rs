//! Relay Core
//!
//! Core domain types, port traits, and error handling for the relay remote
//! artifact cache. This crate has minimal dependencies and defines the shared
//! vocabulary used by the archive codec, the remote store and the transport.

pub mod cache;
pub mod error;
pub mod ids;
pub mod path;
pub mod ports;

pub use error::{Error, Result};
pub use ids::ArtifactKey;
pub use path::AnchoredPath;
