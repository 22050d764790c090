// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Downloads the server binary for a resolved release.

use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::error::ReleaseError;
use super::types::{Asset, Release};
use crate::host::ProgressSink;

/// Suffix of the marker recording which release an installed binary came from.
const TAG_MARKER_SUFFIX: &str = "tag";

/// Downloads release assets into a storage directory.
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    client: reqwest::Client,
}

impl ArtifactFetcher {
    /// Creates a fetcher using `client` for downloads.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Downloads the asset matching `asset_prefix` into `dest_dir`.
    ///
    /// Returns the path of the installed binary, `dest_dir/<asset-name>`.
    /// A binary already installed from the same release tag is reused.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::NoBinariesForPlatform`] if no asset matches,
    /// and [`ReleaseError::DownloadFailed`] for any I/O or HTTP failure.
    pub async fn fetch<P: ProgressSink>(
        &self,
        release: &Release,
        asset_prefix: &str,
        dest_dir: &Path,
        progress: &P,
    ) -> Result<PathBuf, ReleaseError> {
        let asset = release
            .find_asset(asset_prefix)
            .ok_or_else(|| ReleaseError::NoBinariesForPlatform {
                tag: release.tag_name.clone(),
                os: std::env::consts::OS.to_string(),
            })?;

        let failed = |reason: String| ReleaseError::DownloadFailed {
            url: asset.browser_download_url.clone(),
            reason,
        };

        tokio::fs::create_dir_all(dest_dir).await.map_err(|e| {
            failed(format!("cannot create {}: {e}", dest_dir.display()))
        })?;

        let dest = dest_dir.join(&asset.name);
        let marker = marker_path(&dest);

        if is_installed(&dest, &marker, &release.tag_name).await {
            debug!("thriftls {} already installed at {}", release.tag_name, dest.display());
            return Ok(dest);
        }

        let title = format!("Downloading thriftls {}", release.tag_name);
        info!("{title} from {}", asset.browser_download_url);

        let result = self.download(asset, &dest, &title, progress).await;
        progress.finish();
        result.map_err(failed)?;

        tokio::fs::write(&marker, &release.tag_name)
            .await
            .map_err(|e| failed(format!("cannot write {}: {e}", marker.display())))?;

        info!("Installed thriftls {} at {}", release.tag_name, dest.display());
        Ok(dest)
    }

    /// Streams `asset` to `dest` through a temporary file.
    async fn download<P: ProgressSink>(
        &self,
        asset: &Asset,
        dest: &Path,
        title: &str,
        progress: &P,
    ) -> Result<(), String> {
        let response = self
            .client
            .get(&asset.browser_download_url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        progress.begin(title, response.content_length());

        let temp_path = dest.with_extension(format!("download.{}", std::process::id()));
        let installed = install(response, &temp_path, dest, progress).await;
        if installed.is_err() {
            let _ = tokio::fs::remove_file(&temp_path).await;
        }
        installed
    }
}

/// Writes the body to `temp_path`, marks it executable and moves it to `dest`.
async fn install<P: ProgressSink>(
    response: reqwest::Response,
    temp_path: &Path,
    dest: &Path,
    progress: &P,
) -> Result<(), String> {
    write_stream(response, temp_path, progress).await?;
    set_executable(temp_path).await?;
    tokio::fs::rename(temp_path, dest)
        .await
        .map_err(|e| format!("cannot move download into {}: {e}", dest.display()))
}

async fn write_stream<P: ProgressSink>(
    response: reqwest::Response,
    path: &Path,
    progress: &P,
) -> Result<(), String> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| format!("cannot create {}: {e}", path.display()))?;

    let mut stream = response.bytes_stream();
    let mut done: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| format!("download interrupted: {e}"))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("cannot write {}: {e}", path.display()))?;
        done += chunk.len() as u64;
        progress.advance(done);
    }

    file.flush()
        .await
        .map_err(|e| format!("cannot write {}: {e}", path.display()))
}

fn marker_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".");
    name.push(TAG_MARKER_SUFFIX);
    PathBuf::from(name)
}

async fn is_installed(dest: &Path, marker: &Path, tag: &str) -> bool {
    if !tokio::fs::try_exists(dest).await.unwrap_or(false) {
        return false;
    }
    tokio::fs::read_to_string(marker)
        .await
        .is_ok_and(|installed| installed.trim() == tag)
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| format!("cannot mark {} executable: {e}", path.display()))
}

#[cfg(not(unix))]
#[allow(clippy::unused_async, reason = "Signature shared with the unix variant")]
async fn set_executable(_path: &Path) -> Result<(), String> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::http_client as registry_client;
    use crate::test_support::{RecordingHost, serve, serve_raw};
    use anyhow::Result;

    fn release_with(tag: &str, assets: Vec<(&str, String)>) -> Release {
        Release {
            assets: assets
                .into_iter()
                .map(|(name, url)| Asset {
                    name: name.to_string(),
                    browser_download_url: url,
                })
                .collect(),
            tag_name: tag.to_string(),
            prerelease: false,
            last_check_time: None,
        }
    }

    #[tokio::test]
    async fn missing_platform_asset_names_the_tag() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let fetcher = ArtifactFetcher::new(registry_client()?);
        let release = release_with("v0.4.0", vec![("thriftls-darwin-arm64", "http://x".into())]);

        let err = fetcher
            .fetch(&release, "thriftls-linux-amd64", dir.path(), &RecordingHost::default())
            .await;
        match err {
            Err(e @ ReleaseError::NoBinariesForPlatform { .. }) => {
                assert!(e.to_string().contains("v0.4.0"));
            }
            other => anyhow::bail!("expected NoBinariesForPlatform, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn downloads_first_matching_asset() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let payload = b"#!/bin/sh\necho thriftls\n".to_vec();
        let good = serve(200, payload.clone()).await?;
        let other = serve(500, Vec::new()).await?;
        let release = release_with(
            "v0.4.0",
            vec![
                ("thriftls-darwin-arm64", other.clone()),
                ("thriftls-linux-amd64", good),
                ("thriftls-linux-amd64.gz", other),
            ],
        );
        let dest_dir = dir.path().join("storage");
        let host = RecordingHost::default();

        let fetcher = ArtifactFetcher::new(registry_client()?);
        let path = fetcher
            .fetch(&release, "thriftls-linux-amd64", &dest_dir, &host)
            .await?;

        assert_eq!(path, dest_dir.join("thriftls-linux-amd64"));
        assert_eq!(std::fs::read(&path)?, payload);
        assert_eq!(host.progress().last().copied(), Some(payload.len() as u64));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path)?.permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
        Ok(())
    }

    #[tokio::test]
    async fn same_tag_is_not_downloaded_twice() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let url = serve(200, b"binary".to_vec()).await?;
        let release = release_with("v0.4.0", vec![("thriftls-linux-amd64", url)]);
        let fetcher = ArtifactFetcher::new(registry_client()?);

        let path = fetcher
            .fetch(&release, "thriftls-linux-amd64", dir.path(), &RecordingHost::default())
            .await?;
        std::fs::write(&path, b"locally patched")?;

        let host = RecordingHost::default();
        fetcher
            .fetch(&release, "thriftls-linux-amd64", dir.path(), &host)
            .await?;
        assert_eq!(std::fs::read(&path)?, b"locally patched");
        assert!(host.progress().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn new_tag_replaces_installed_binary() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let old = serve(200, b"old".to_vec()).await?;
        let new = serve(200, b"new".to_vec()).await?;
        let fetcher = ArtifactFetcher::new(registry_client()?);
        let host = RecordingHost::default();

        let v1 = release_with("v1", vec![("thriftls-linux-amd64", old)]);
        let v2 = release_with("v2", vec![("thriftls-linux-amd64", new)]);
        fetcher.fetch(&v1, "thriftls-linux-amd64", dir.path(), &host).await?;
        let path = fetcher.fetch(&v2, "thriftls-linux-amd64", dir.path(), &host).await?;

        assert_eq!(std::fs::read(&path)?, b"new");
        Ok(())
    }

    #[tokio::test]
    async fn http_error_is_download_failure_and_leaves_nothing_behind() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let url = serve(404, b"not found".to_vec()).await?;
        let release = release_with("v0.4.0", vec![("thriftls-linux-amd64", url)]);
        let fetcher = ArtifactFetcher::new(registry_client()?);

        let err = fetcher
            .fetch(&release, "thriftls-linux-amd64", dir.path(), &RecordingHost::default())
            .await;
        assert!(matches!(err, Err(ReleaseError::DownloadFailed { .. })));
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn interrupted_download_fails_and_leaves_nothing_behind() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let url = serve_raw(
            b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\nConnection: close\r\n\r\nshort".to_vec(),
        )
        .await?;
        let release = release_with("v0.4.0", vec![("thriftls-linux-amd64", url)]);
        let fetcher = ArtifactFetcher::new(registry_client()?);

        let err = fetcher
            .fetch(&release, "thriftls-linux-amd64", dir.path(), &RecordingHost::default())
            .await;
        match err {
            Err(e @ ReleaseError::DownloadFailed { .. }) => {
                assert!(e.to_string().contains("interrupted"), "{e}");
            }
            other => anyhow::bail!("expected DownloadFailed, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn failed_install_removes_temp_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        // A non-empty directory where the binary should go makes the final
        // rename fail after the body was written.
        let blocker = dir.path().join("thriftls-linux-amd64");
        std::fs::create_dir_all(blocker.join("occupied"))?;
        let url = serve(200, b"binary".to_vec()).await?;
        let release = release_with("v0.4.0", vec![("thriftls-linux-amd64", url)]);
        let fetcher = ArtifactFetcher::new(registry_client()?);

        let err = fetcher
            .fetch(&release, "thriftls-linux-amd64", dir.path(), &RecordingHost::default())
            .await;
        assert!(matches!(err, Err(ReleaseError::DownloadFailed { .. })));

        let names: Vec<String> = std::fs::read_dir(dir.path())?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<std::io::Result<_>>()?;
        assert_eq!(names, ["thriftls-linux-amd64"]);
        Ok(())
    }
}
