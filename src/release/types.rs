// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Release descriptors as served by the registry and stored in the cache.

use serde::{Deserialize, Serialize};

/// A published release of the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Downloadable files attached to the release, in registry order.
    pub assets: Vec<Asset>,
    /// Release tag, unique per release (e.g. `v0.7.1`).
    pub tag_name: String,
    /// Whether the release is marked as a prerelease.
    pub prerelease: bool,
    /// When this release was last confirmed against the registry (epoch millis).
    ///
    /// Always set on cached releases, never on freshly fetched ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check_time: Option<i64>,
}

/// A single downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// File name, following the `thriftls-<os>-<arch>` convention.
    pub name: String,
    /// Direct download URL.
    pub browser_download_url: String,
}

impl Release {
    /// Returns the first asset whose name starts with `prefix`.
    ///
    /// Several assets may share a prefix when they differ only in
    /// compression; registry order decides.
    #[must_use]
    pub fn find_asset(&self, prefix: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name.starts_with(prefix))
    }

    /// Returns a copy stamped with the given check time.
    #[must_use]
    pub fn stamped(mut self, now_ms: i64) -> Self {
        self.last_check_time = Some(now_ms);
        self
    }
}

/// Picks the newest non-prerelease from a newest-first release list.
#[must_use]
pub fn latest_stable(releases: Vec<Release>) -> Option<Release> {
    releases.into_iter().find(|r| !r.prerelease)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    fn release(tag: &str, prerelease: bool) -> Release {
        Release {
            assets: Vec::new(),
            tag_name: tag.to_string(),
            prerelease,
            last_check_time: None,
        }
    }

    #[test]
    fn decodes_registry_payload_and_ignores_extra_fields() -> Result<()> {
        let json = r#"[{
            "url": "https://api.github.com/repos/joyme123/thrift-ls/releases/1",
            "tag_name": "v0.2.0",
            "prerelease": false,
            "assets": [
                {"name": "thriftls-linux-amd64", "browser_download_url": "https://x/linux", "size": 10}
            ]
        }]"#;
        let releases: Vec<Release> = serde_json::from_str(json)?;
        let first = releases.first().context("no release")?;
        assert_eq!(first.tag_name, "v0.2.0");
        assert_eq!(first.assets.len(), 1);
        assert_eq!(first.last_check_time, None);
        Ok(())
    }

    #[test]
    fn latest_stable_skips_prereleases() {
        let picked = latest_stable(vec![
            release("v0.3.0-rc1", true),
            release("v0.2.0", false),
            release("v0.1.0", false),
        ]);
        assert_eq!(picked.map(|r| r.tag_name), Some("v0.2.0".to_string()));
    }

    #[test]
    fn latest_stable_of_only_prereleases_is_none() {
        assert!(latest_stable(vec![release("v1.0.0-beta", true)]).is_none());
        assert!(latest_stable(Vec::new()).is_none());
    }

    #[test]
    fn find_asset_takes_first_prefix_match() {
        let r = Release {
            assets: vec![
                Asset {
                    name: "thriftls-darwin-arm64".into(),
                    browser_download_url: "a".into(),
                },
                Asset {
                    name: "thriftls-linux-amd64.gz".into(),
                    browser_download_url: "b".into(),
                },
                Asset {
                    name: "thriftls-linux-amd64.zip".into(),
                    browser_download_url: "c".into(),
                },
            ],
            ..release("v1", false)
        };
        let asset = r.find_asset("thriftls-linux-amd64");
        assert_eq!(asset.map(|a| a.browser_download_url.as_str()), Some("b"));
        assert!(r.find_asset("Thriftls-linux").is_none());
    }
}
