//! HTTP client for the POTA read API.

use crate::error::FetchError;
use crate::models::ParkRecord;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Settings for [`PotaClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.pota.app".to_string(),
            timeout_seconds: 15,
            user_agent: format!("pota-sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&crate::config::ApiConfig> for ClientConfig {
    fn from(config: &crate::config::ApiConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout_seconds: config.timeout_seconds,
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Thin wrapper over the two upstream endpoints the mirror consumes.
///
/// Each call is a single attempt; pacing and retries are layered on by the
/// caller.
pub struct PotaClient {
    http: reqwest::Client,
    base_url: String,
}

impl PotaClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_http(http, &config.base_url))
    }

    /// Use an already configured `reqwest::Client`.
    pub fn with_http(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn region_url(&self, region: &str) -> String {
        format!("{}/program/parks/{}", self.base_url, region)
    }

    pub fn activations_url(&self, reference: &str) -> String {
        format!("{}/park/activations/{}?count=all", self.base_url, reference)
    }

    /// All parks of one region partition.
    pub async fn fetch_region(&self, region: &str) -> Result<Vec<ParkRecord>, FetchError> {
        self.get_json(self.region_url(region)).await
    }

    /// Raw activation payload for one park, in whatever shape upstream sends.
    pub async fn fetch_activations(&self, reference: &str) -> Result<Value, FetchError> {
        self.get_json(self.activations_url(reference)).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, FetchError> {
        debug!("GET {}", url);

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(source) => return Err(FetchError::Transport { url, source }),
        };

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
                retry_after,
            });
        }

        response.json::<T>().await.map_err(|source| {
            if source.is_decode() {
                FetchError::Decode { url, source }
            } else {
                FetchError::Transport { url, source }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response on a random local port.
    async fn serve_once(status_line: &str, headers: &[(&str, &str)], body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut response = format!("HTTP/1.1 {}\r\n", status_line);
        for (name, value) in headers {
            response.push_str(&format!("{}: {}\r\n", name, value));
        }
        response.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ));

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}", addr)
    }

    /// Local test servers must not be routed through an ambient proxy.
    fn client(base_url: String) -> PotaClient {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        PotaClient::with_http(http, &base_url)
    }

    #[test]
    fn test_endpoint_urls() {
        let client = PotaClient::new(&ClientConfig {
            base_url: "https://api.pota.app/".to_string(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.region_url("US"),
            "https://api.pota.app/program/parks/US"
        );
        assert_eq!(
            client.activations_url("US-0001"),
            "https://api.pota.app/park/activations/US-0001?count=all"
        );
    }

    #[tokio::test]
    async fn test_fetch_region_parses_parks() {
        let body = r#"[{"reference": "US-0001", "name": "Acadia", "qsos": 10, "activations": 2}]"#;
        let base = serve_once("200 OK", &[("Content-Type", "application/json")], body).await;

        let parks = client(base).fetch_region("US").await.unwrap();
        assert_eq!(parks.len(), 1);
        assert_eq!(parks[0].reference, "US-0001");
        assert_eq!(parks[0].qsos, Some(10));
    }

    #[tokio::test]
    async fn test_status_carries_retry_after() {
        let base = serve_once("429 Too Many Requests", &[("Retry-After", "3")], "").await;

        let err = client(base).fetch_activations("US-0001").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::RateLimited);
        match err {
            FetchError::Status {
                status,
                retry_after,
                ..
            } => {
                assert_eq!(status, 429);
                assert_eq!(retry_after.as_deref(), Some("3"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let base = serve_once("200 OK", &[], "<html>maintenance</html>").await;

        let err = client(base).fetch_activations("US-0001").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Malformed);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{}", addr))
            .fetch_region("US")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::TransientNetwork);
    }
}
