// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Best-effort verification against the public repository page.

use regex::RegexBuilder;
use std::time::Duration;
use tracing::{debug, instrument};

/// Fetch public rendering of repository.
#[allow(async_fn_in_trait)]
pub trait Verifier {
    /// Fetch body of page at `url`.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Verification over plain HTTPS.
#[derive(Debug, Clone)]
pub struct HttpVerifier {
    client: reqwest::Client,
}

impl HttpVerifier {
    /// Construct new verifier.
    ///
    /// # Errors
    ///
    /// - Return [`NetworkError::Client`] if HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("spillway/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(NetworkError::Client)?;

        Ok(Self { client })
    }
}

impl Verifier for HttpVerifier {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, url: &str) -> Result<String> {
        let fetch = |source| NetworkError::Fetch {
            source,
            url: url.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(fetch)?;
        let response = response.error_for_status().map_err(fetch)?;
        let body = response.text().await.map_err(fetch)?;
        debug!("fetched {} bytes from {url}", body.len());

        Ok(body)
    }
}

/// Identity marker appears in page body, ignoring case.
pub fn mentions(body: &str, marker: &str) -> bool {
    RegexBuilder::new(&regex::escape(marker))
        .case_insensitive(true)
        .build()
        .map(|regex| regex.is_match(body))
        .unwrap_or_else(|_| body.to_lowercase().contains(&marker.to_lowercase()))
}

/// Network error types.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// HTTP client cannot be set up.
    #[error("failed to set up http client")]
    Client(#[source] reqwest::Error),

    /// Page cannot be fetched.
    #[error("failed to fetch {url}")]
    Fetch {
        #[source]
        source: reqwest::Error,
        url: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = NetworkError> = std::result::Result<T, E>;
