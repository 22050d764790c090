// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Decides which release to use under the configured update policy.
//!
//! | Policy            | Cache consulted first | Live check                 | Prompt |
//! |-------------------|-----------------------|----------------------------|--------|
//! | `never-check`     | always, returned as-is | never                     | no     |
//! | `weekly`          | yes                   | when cache is 7+ days old  | no     |
//! | `prompt`          | no                    | always                     | on tag change |
//! | `keep-up-to-date` | no                    | always                     | no     |
//!
//! A failed live check falls back to the cache with a warning. Only a
//! release the user accepted (or the policy accepts implicitly) is ever
//! written back, so declined or failed updates leave the cache untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use super::cache::ReleaseCache;
use super::error::ReleaseError;
use super::registry::ReleaseRegistry;
use super::types::{Release, latest_stable};
use crate::host::{ConfirmPrompt, Notifier};

/// Minimum age of the cache before the weekly policy checks again.
pub const WEEKLY_CHECK_INTERVAL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// When to look for a newer server release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdatePolicy {
    /// Always check and install the newest release.
    #[default]
    #[serde(rename = "keep-up-to-date")]
    AlwaysLatest,
    /// Always check, but ask before switching releases.
    #[serde(rename = "prompt")]
    PromptOnChange,
    /// Only ever use the cached release.
    #[serde(rename = "never-check")]
    NeverCheck,
    /// Check at most once a week.
    #[serde(rename = "weekly")]
    WeeklyCheck,
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlwaysLatest => "keep-up-to-date",
            Self::PromptOnChange => "prompt",
            Self::NeverCheck => "never-check",
            Self::WeeklyCheck => "weekly",
        })
    }
}

/// Millisecond wall clock, injectable for tests.
pub type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Resolves the release to install from the registry and the local cache.
pub struct ReleaseResolver<R> {
    registry: R,
    cache: ReleaseCache,
    clock: Clock,
}

impl<R: ReleaseRegistry> ReleaseResolver<R> {
    /// Creates a resolver using the system clock.
    #[must_use]
    pub fn new(registry: R, cache: ReleaseCache) -> Self {
        Self {
            registry,
            cache,
            clock: Box::new(system_clock),
        }
    }

    /// Replaces the clock used for check timestamps and cache age.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The cache this resolver reads and writes.
    #[must_use]
    pub const fn cache(&self) -> &ReleaseCache {
        &self.cache
    }

    /// Resolves the release to use under `policy`.
    ///
    /// Returns `Ok(None)` when there is nothing to install: an empty cache
    /// under `never-check`, a registry without stable releases, or a declined
    /// first install.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::RegistryUnavailable`] if the registry fails and
    /// the cache is empty or unreadable, and cache errors when the policy
    /// reads the cache without a live check.
    pub async fn resolve<H>(
        &self,
        policy: UpdatePolicy,
        host: &H,
    ) -> Result<Option<Release>, ReleaseError>
    where
        H: Notifier + ConfirmPrompt,
    {
        match policy {
            UpdatePolicy::NeverCheck => {
                debug!("Update checks disabled, using cached release");
                return self.cache.read().await;
            }
            UpdatePolicy::WeeklyCheck => {
                if let Some(cached) = self.cache.read().await? {
                    let now = (self.clock)();
                    if let Some(age) = cached.last_check_time.map(|t| now.saturating_sub(t))
                        && age < WEEKLY_CHECK_INTERVAL_MS
                    {
                        debug!(
                            "Cached release {} checked {}h ago, skipping registry",
                            cached.tag_name,
                            age / 3_600_000
                        );
                        return Ok(Some(cached));
                    }
                }
            }
            UpdatePolicy::PromptOnChange | UpdatePolicy::AlwaysLatest => {}
        }

        match self.registry.releases().await {
            Ok(releases) => self.accept_latest(policy, releases, host).await,
            Err(registry_err) => {
                let cached = match self.cache.read().await {
                    Ok(Some(cached)) => cached,
                    Ok(None) => {
                        return Err(ReleaseError::RegistryUnavailable {
                            source: registry_err,
                        });
                    }
                    Err(cache_err) => {
                        warn!("Release cache unusable after registry failure: {cache_err}");
                        return Err(ReleaseError::RegistryUnavailable {
                            source: registry_err,
                        });
                    }
                };

                warn!(
                    "Registry check failed, using cached release {}: {registry_err}",
                    cached.tag_name
                );
                host.warning(&format!(
                    "Couldn't get the latest thriftls releases, used local cache instead:\n{registry_err}"
                ));
                Ok(Some(cached))
            }
        }
    }

    /// Applies the policy to a freshly fetched release list.
    async fn accept_latest<H>(
        &self,
        policy: UpdatePolicy,
        releases: Vec<Release>,
        host: &H,
    ) -> Result<Option<Release>, ReleaseError>
    where
        H: Notifier + ConfirmPrompt,
    {
        let Some(latest) = latest_stable(releases) else {
            info!("Registry lists no stable thriftls release");
            return Ok(None);
        };

        if policy == UpdatePolicy::PromptOnChange {
            let cached = self.cache.read().await?;
            let changed = cached
                .as_ref()
                .is_none_or(|c| c.tag_name != latest.tag_name);

            if changed {
                let message = if cached.is_none() {
                    "No version of thriftls is installed, would you like to install it now?"
                } else {
                    "A new version of thriftls is available, would you like to upgrade now?"
                };
                if !host.confirm(message, "Download", "Nevermind").await {
                    info!("Update to {} declined, keeping cached release", latest.tag_name);
                    return Ok(cached);
                }
            }
        }

        let latest = latest.stamped((self.clock)());
        self.cache.write(&latest).await?;
        info!("Using thriftls release {}", latest.tag_name);
        Ok(Some(latest))
    }
}
