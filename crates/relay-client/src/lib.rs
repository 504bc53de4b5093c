//! Relay Client
//!
//! reqwest-backed [`ArtifactTransport`](relay_core::ports::ArtifactTransport)
//! speaking the `/v8/artifacts` HTTP API.

pub mod client;

pub use client::{ApiClient, user_agent};
