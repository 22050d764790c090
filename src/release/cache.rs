// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! On-disk cache of the last accepted release.
//!
//! The cache file holds a single JSON release object, or `null`. A missing
//! file means "nothing cached" and is not an error. Writes go through a temp
//! file and an atomic rename so a crash never leaves a half-written cache.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::ReleaseError;
use super::types::Release;

/// File name of the cache inside the storage directory.
pub const CACHE_FILE_NAME: &str = "latestApprovedRelease.cache.json";

/// Durable store for the last release the resolver accepted.
#[derive(Debug, Clone)]
pub struct ReleaseCache {
    path: PathBuf,
}

impl ReleaseCache {
    /// Creates a cache living in `storage_dir`.
    #[must_use]
    pub fn new(storage_dir: &Path) -> Self {
        Self {
            path: storage_dir.join(CACHE_FILE_NAME),
        }
    }

    /// Path of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cached release.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::CacheIo`] for I/O failures other than a
    /// missing file, and [`ReleaseError::CacheFormat`] if the content is
    /// neither a release nor `null`.
    pub async fn read(&self) -> Result<Option<Release>, ReleaseError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No release cache at {}", self.path.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(ReleaseError::CacheIo {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str::<Option<Release>>(&text).map_err(|source| {
            ReleaseError::CacheFormat {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Replaces the cached release.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::CacheIo`] if the file cannot be written. The
    /// previous cache content is left intact on failure.
    pub async fn write(&self, release: &Release) -> Result<(), ReleaseError> {
        let io_err = |source| ReleaseError::CacheIo {
            path: self.path.clone(),
            source,
        };

        let bytes = serde_json::to_vec(release).map_err(|e| io_err(e.into()))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let temp_path = self
            .path
            .with_extension(format!("tmp.{}", std::process::id()));
        tokio::fs::write(&temp_path, &bytes).await.map_err(io_err)?;

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(io_err(e));
        }

        debug!(
            "Cached release {} at {}",
            release.tag_name,
            self.path.display()
        );
        Ok(())
    }
}
