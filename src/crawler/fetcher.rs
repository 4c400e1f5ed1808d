//! HTTP transport
//!
//! A transport performs exactly one GET and reports what happened. It never
//! retries or sleeps; pacing and the retry policy belong to the scheduler.

use crate::config::{IdentityProfile, SchedulerConfig};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONNECTION, USER_AGENT};
use reqwest::Client;
use std::time::Duration;

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One HTTP GET with a given client-identity profile
#[async_trait]
pub trait Transport: Send + Sync {
    /// Any status is a response; only network-level faults are errors
    async fn get(&self, url: &str, profile: &IdentityProfile) -> Result<TransportResponse>;
}

/// `Transport` backed by a pooled reqwest client
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds the client with the configured request timeout
    pub fn new(config: &SchedulerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.request_timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    fn headers(profile: &IdentityProfile) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&profile.user_agent) {
            headers.insert(USER_AGENT, value);
        }
        if let Ok(value) = HeaderValue::from_str(&profile.accept) {
            headers.insert(ACCEPT, value);
        }
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, profile: &IdentityProfile) -> Result<TransportResponse> {
        let response = self
            .client
            .get(url)
            .headers(Self::headers(profile))
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| classify_error(url, e))?;

        Ok(TransportResponse { status, body })
    }
}

/// Maps a reqwest failure onto the crate taxonomy
///
/// Timeouts and connection-level faults are transient. A request that could
/// not even be built (bad URL, bad header) will never succeed.
fn classify_error(url: &str, error: reqwest::Error) -> HarvestError {
    if error.is_timeout() {
        return HarvestError::Timeout {
            url: url.to_string(),
        };
    }
    HarvestError::Transport {
        url: url.to_string(),
        message: error.to_string(),
        retryable: !error.is_builder(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_transport() {
        let transport = HttpTransport::new(&SchedulerConfig::default());
        assert!(transport.is_ok());
    }

    #[test]
    fn test_identity_headers() {
        let profile = IdentityProfile::new("Mozilla/5.0 (Test)");
        let headers = HttpTransport::headers(&profile);

        assert_eq!(headers.get(USER_AGENT).unwrap(), "Mozilla/5.0 (Test)");
        assert_eq!(headers.get(CONNECTION).unwrap(), "keep-alive");
        assert!(headers.get(ACCEPT).is_some());
    }

    #[test]
    fn test_response_success_range() {
        let ok = TransportResponse {
            status: 204,
            body: String::new(),
        };
        let not_found = TransportResponse {
            status: 404,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!not_found.is_success());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_retryable_transport_error() {
        let transport = HttpTransport::new(&SchedulerConfig {
            request_timeout_secs: 1,
            ..SchedulerConfig::default()
        })
        .unwrap();
        let profile = IdentityProfile::new("test");

        let err = transport
            .get("http://127.0.0.1:1/unreachable", &profile)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
