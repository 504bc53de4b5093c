//! Remote artifact cache for relay.
//!
//! Packs build outputs into a reproducible zstd-compressed tar stream, ships
//! them through an [`ArtifactTransport`](relay_core::ports::ArtifactTransport)
//! and restores them safely on the way back.

pub mod archiver;
pub mod config;
pub mod limiter;
pub mod pipe;
pub mod provider;
pub mod remote;
pub mod signature;

pub use archiver::{ArchiveReader, ArchiveWriter};
pub use config::RemoteCacheConfig;
pub use limiter::{ConcurrencyLimiter, RequestPermit};
pub use provider::CacheProvider;
pub use remote::RemoteCacheStore;
pub use signature::{ArtifactSigner, SignatureConfig};
