// crates/network/src/client.rs
//! HTTP client wrapper

use crate::error::{NetworkError, NetworkResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client as ReqwestClient, Response, Url};
use serde::Serialize;
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Bearer token sent with every request
    pub bearer_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("Fairway/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 10,
            bearer_token: None,
        }
    }
}

impl ClientConfig {
    /// Sets the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the bearer token
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

/// HTTP client shared by the remote API and the connectivity probe
///
/// Retries are not performed here; the sync engine schedules them from
/// the queue so they survive restarts.
#[derive(Clone)]
pub struct Client {
    inner: ReqwestClient,
    config: ClientConfig,
}

impl Client {
    /// Creates a new client with default configuration
    pub fn new() -> NetworkResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> NetworkResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| NetworkError::InvalidUrl("bearer token is not a valid header".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .default_headers(headers)
            .build()
            .map_err(NetworkError::Http)?;

        Ok(Self {
            inner: client,
            config,
        })
    }

    /// Returns the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Performs a GET request
    pub async fn get(&self, url: Url) -> NetworkResult<Response> {
        Ok(self.inner.get(url).send().await?)
    }

    /// Performs a HEAD request
    pub async fn head(&self, url: Url) -> NetworkResult<Response> {
        Ok(self.inner.head(url).send().await?)
    }

    /// Posts a JSON body with extra headers
    ///
    /// Non-2xx responses are returned, not turned into errors, so callers
    /// can classify the status themselves.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
        extra_headers: &[(HeaderName, HeaderValue)],
    ) -> NetworkResult<Response> {
        let mut request = self.inner.post(url).json(body);
        for (name, value) in extra_headers {
            request = request.header(name.clone(), value.clone());
        }
        Ok(request.send().await?)
    }

    /// Checks if a URL answers with a non-5xx status
    pub async fn is_accessible(&self, url: Url) -> bool {
        match self.get(url).await {
            Ok(response) => !response.status().is_server_error(),
            Err(e) => {
                log::debug!("Probe failed: {}", e);
                false
            }
        }
    }
}

/// Parses a base URL that paths can be appended to
pub fn parse_base_url(raw: &str) -> NetworkResult<Url> {
    let url = Url::parse(raw).map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", raw, e)))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(NetworkError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// Appends path segments to a base URL, percent-encoding each one
pub fn join_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_redirects, 10);
        assert!(config.bearer_token.is_none());
    }

    #[test]
    fn test_client_creation() {
        let client = Client::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_with_token() {
        let config = ClientConfig::default()
            .with_timeout(Duration::from_secs(10))
            .with_bearer_token("abc123");

        let client = Client::with_config(config).unwrap();
        assert_eq!(client.config().timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_client_rejects_bad_token() {
        let config = ClientConfig::default().with_bearer_token("line\nbreak");
        assert!(Client::with_config(config).is_err());
    }

    #[test]
    fn test_parse_base_url() {
        assert!(parse_base_url("https://api.fairway.golf/v1").is_ok());
        assert!(parse_base_url("not a url").is_err());
        assert!(parse_base_url("mailto:ops@fairway.golf").is_err());
    }

    #[test]
    fn test_join_segments_encodes() {
        let base = parse_base_url("https://api.fairway.golf/v1/").unwrap();
        let url = join_segments(&base, &["trips", "ryder cup/26", "mutations"]);
        assert_eq!(
            url.as_str(),
            "https://api.fairway.golf/v1/trips/ryder%20cup%2F26/mutations"
        );
    }
}
