// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Client for the remote release registry.
//!
//! The registry is anything that answers `GET <url>` with a JSON array of
//! releases in the GitHub releases API shape, newest first.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::error::RegistryError;
use super::types::Release;

/// Default registry endpoint.
pub const DEFAULT_RELEASES_URL: &str = "https://api.github.com/repos/joyme123/thrift-ls/releases";

/// How long to wait for the registry before falling back to the cache.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of published releases.
pub trait ReleaseRegistry: Send + Sync {
    /// Lists all releases, newest first.
    fn releases(&self) -> impl Future<Output = Result<Vec<Release>, RegistryError>> + Send;
}

/// Registry backed by an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: reqwest::Client,
    url: String,
}

impl HttpRegistry {
    /// Creates a registry for `url`, or the default endpoint when `None` or
    /// empty.
    #[must_use]
    pub fn new(client: reqwest::Client, url: Option<&str>) -> Self {
        let url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_RELEASES_URL)
            .to_string();
        Self { client, url }
    }

    /// The endpoint this registry queries.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ReleaseRegistry for HttpRegistry {
    async fn releases(&self) -> Result<Vec<Release>, RegistryError> {
        debug!("Querying release registry {}", self.url);

        let request_err = |source| RegistryError::Request {
            url: self.url.clone(),
            source,
        };

        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(request_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(request_err)?;
        serde_json::from_slice(&body).map_err(|source| RegistryError::Decode {
            url: self.url.clone(),
            source,
        })
    }
}

/// Builds the HTTP client shared by the registry and the artifact fetcher.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("thriftls-client/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
}
