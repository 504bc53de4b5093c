use async_trait::async_trait;
use bytes::Bytes;
use relay_cache::RemoteCacheConfig;
use relay_core::ports::{
    ARTIFACT_DURATION_HEADER, ARTIFACT_TAG_HEADER, ArtifactTransport, TransportResponse,
};
use relay_core::{ArtifactKey, Error, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use std::time::Duration;
use tracing::debug;

/// `User-Agent` sent with every request.
pub fn user_agent() -> String {
    format!(
        "relay {} {} {}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    team_id: Option<String>,
    team_slug: Option<String>,
}

impl ApiClient {
    pub fn new(config: &RemoteCacheConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(user_agent());
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            team_id: config.team_id.clone(),
            team_slug: config.team_slug.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, key: &ArtifactKey) -> RequestBuilder {
        let url = format!("{}/v8/artifacts/{}", self.base_url, key);
        let mut req = self.client.request(method, &url);

        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        let mut query = Vec::new();
        if let Some(team_id) = &self.team_id {
            query.push(("teamId", team_id.as_str()));
        }
        if let Some(slug) = &self.team_slug {
            query.push(("slug", slug.as_str()));
        }
        if !query.is_empty() {
            req = req.query(&query);
        }

        req
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        req.send().await.map_err(request_failed)
    }
}

fn request_failed(err: reqwest::Error) -> Error {
    Error::Transport(err.to_string())
}

/// Collect status, headers and body without interpreting the status.
async fn into_transport_response(res: Response) -> Result<TransportResponse> {
    let status = res.status().as_u16();
    let headers = res
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let body = res.bytes().await.map_err(request_failed)?;

    Ok(TransportResponse {
        status,
        headers,
        body,
    })
}

#[async_trait]
impl ArtifactTransport for ApiClient {
    async fn put_artifact(
        &self,
        key: &ArtifactKey,
        body: Bytes,
        duration_ms: u64,
        tag: Option<&str>,
    ) -> Result<()> {
        let size = body.len();
        let mut req = self
            .request(Method::PUT, key)
            .header("Content-Type", "application/octet-stream")
            .header(ARTIFACT_DURATION_HEADER, duration_ms.to_string())
            .body(body);
        if let Some(tag) = tag.filter(|tag| !tag.is_empty()) {
            req = req.header(ARTIFACT_TAG_HEADER, tag);
        }

        let res = self.send(req).await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.map_err(request_failed)?;
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        debug!(key = %key, bytes = size, "Uploaded artifact");
        Ok(())
    }

    async fn fetch_artifact(&self, key: &ArtifactKey) -> Result<TransportResponse> {
        let res = self.send(self.request(Method::GET, key)).await?;
        debug!(key = %key, status = res.status().as_u16(), "Fetched artifact");
        into_transport_response(res).await
    }

    async fn artifact_exists(&self, key: &ArtifactKey) -> Result<TransportResponse> {
        let res = self.send(self.request(Method::HEAD, key)).await?;
        into_transport_response(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_names_platform() {
        let agent = user_agent();
        assert!(agent.starts_with("relay "));
        assert!(agent.ends_with(std::env::consts::ARCH));
        assert!(agent.contains(std::env::consts::OS));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let config = RemoteCacheConfig::new("/repo").with_api_url("http://cache.local/");
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://cache.local");
    }
}
