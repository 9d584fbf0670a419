// src/utils/http.rs

//! HTTP client utilities.
//!
//! Upstream access goes through the [`HttpSource`] trait so the resolver and
//! fetchers can run against recorded documents in tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// A successfully fetched document.
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    pub body: String,

    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,
}

impl Fetched {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// Read access to upstream documents.
#[async_trait]
pub trait HttpSource: Send + Sync {
    /// GET a document. Non-success statuses are errors.
    async fn get(&self, url: &str) -> Result<Fetched>;

    /// Whether a HEAD request for `url` succeeds.
    async fn head_exists(&self, url: &str) -> bool;
}

/// reqwest-backed [`HttpSource`].
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a configured asynchronous HTTP client.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl HttpSource for HttpClient {
    async fn get(&self, url: &str) -> Result<Fetched> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;
        Ok(Fetched { body, headers })
    }

    async fn head_exists(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("HEAD {} failed: {}", url, e);
                false
            }
        }
    }
}
