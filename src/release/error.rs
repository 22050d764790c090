// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Error types for release resolution, caching and download.

use std::path::PathBuf;
use thiserror::Error;

/// Failure talking to the release registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("request to {url} failed: {source}")]
    Request {
        /// Registry endpoint.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The registry answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Registry endpoint.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The body was not a release list.
    #[error("unexpected release list from {url}: {source}")]
    Decode {
        /// Registry endpoint.
        url: String,
        /// JSON decoding error.
        #[source]
        source: serde_json::Error,
    },
}

/// Failure anywhere in the resolve/fetch pipeline.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// No pre-built binaries exist for this OS/architecture.
    #[error("couldn't find any pre-built thriftls binaries for {os} ({arch})")]
    UnsupportedPlatform {
        /// Operating system as reported by the host.
        os: String,
        /// CPU architecture as reported by the host.
        arch: String,
    },

    /// The registry failed and no cached release was available.
    #[error("couldn't get the latest thriftls releases: {source}")]
    RegistryUnavailable {
        /// The registry failure that triggered the fallback.
        #[source]
        source: RegistryError,
    },

    /// The release exists but ships no asset for this platform.
    #[error("thriftls {tag} is not available on {os}")]
    NoBinariesForPlatform {
        /// Release tag.
        tag: String,
        /// Operating system the asset was looked up for.
        os: String,
    },

    /// Downloading the asset failed.
    #[error("failed to download {url}: {reason}")]
    DownloadFailed {
        /// Asset URL.
        url: String,
        /// Human-readable cause.
        reason: String,
    },

    /// The cache file exists but could not be read or written.
    #[error("release cache {}: {source}", path.display())]
    CacheIo {
        /// Cache file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The cache file holds something other than a release or `null`.
    #[error("release cache {} is corrupt: {source}", path.display())]
    CacheFormat {
        /// Cache file path.
        path: PathBuf,
        /// JSON decoding error.
        #[source]
        source: serde_json::Error,
    },
}
