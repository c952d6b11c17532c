//! HTTP client implementation.

use std::sync::Arc;
use std::time::Duration;

use homehub_core::logging::targets;
use serde::de::DeserializeOwned;

use crate::error::{NetworkError, Result};

/// Configuration for the HTTP client.
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    /// Request timeout.
    pub timeout: Option<Duration>,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Default user agent.
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(15)),
            connect_timeout: Some(Duration::from_secs(5)),
            user_agent: Some(format!("HomeHub/{} (Rust)", env!("CARGO_PKG_VERSION"))),
        }
    }
}

/// Builder for creating an HTTP client with custom configuration.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
    default_headers: http::HeaderMap,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClientBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
            default_headers: http::HeaderMap::new(),
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Disable the request timeout.
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Add a header sent with every request.
    pub fn default_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = http::HeaderName::from_bytes(name.as_bytes())?;
        let value = http::HeaderValue::from_str(value)?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Build the HTTP client.
    pub fn build(self) -> Result<HttpClient> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = self.config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        if let Some(ref ua) = self.config.user_agent {
            builder = builder.user_agent(ua);
        }
        builder = builder.default_headers(self.default_headers);

        let client = builder.build()?;

        Ok(HttpClient {
            inner: Arc::new(HttpClientInner {
                client,
                config: self.config,
            }),
        })
    }
}

struct HttpClientInner {
    client: reqwest::Client,
    config: HttpClientConfig,
}

/// A small HTTP client for JSON APIs.
///
/// The client is cheaply cloneable and thread-safe. Clones share the same
/// underlying connection pool and configuration.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<HttpClientInner>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration.
    pub fn new() -> Result<Self> {
        HttpClientBuilder::new().build()
    }

    /// Create a builder for configuring a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Get the client's configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.inner.config
    }

    /// Issue a GET request with query parameters and decode the JSON body.
    ///
    /// Non-2xx responses become [`NetworkError::HttpStatus`] carrying the
    /// response text (when there is any) as the message.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut url = url::Url::parse(url)?;
        for (key, value) in query {
            url.query_pairs_mut().append_pair(key, value);
        }

        tracing::debug!(target: targets::NET, %url, "GET");
        let response = self.inner.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!(target: targets::NET, status = status.as_u16(), "request failed");
            return Err(NetworkError::HttpStatus {
                status: status.as_u16(),
                message: (!body.trim().is_empty()).then(|| body.trim().to_string()),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.inner.config)
            .finish()
    }
}
