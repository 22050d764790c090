// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Client lifecycle: resolve the server binary once, then route editor
//! events to the orchestrator.
//!
//! Resolution failures end here. They become a single error message on the
//! host and a client without servers, never a crash.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::{Config, FormatOptions};
use crate::host::{ConfirmPrompt, Notifier, ProgressSink};
use crate::release::{
    ArtifactFetcher, HttpRegistry, ReleaseCache, ReleaseError, ReleaseRegistry, ReleaseResolver,
    UpdatePolicy, http_client, platform,
};
use crate::server::{LoggingHandler, ServerLauncher};
use crate::workspace::{ClientOrchestrator, OpenOutcome, TextDocument, WorkspaceFolders};

/// Where users can download the server by hand.
pub const RELEASES_PAGE: &str = "https://github.com/joyme123/thrift-ls/releases";

/// Resolves a release under `policy` and installs its asset into `storage`.
///
/// `asset` is the platform's asset name; an unsupported platform fails here,
/// before any network access. Returns `Ok(None)` when no release could be
/// resolved.
///
/// # Errors
///
/// Returns the first [`ReleaseError`] of the pipeline.
pub async fn install_server_from<R, H>(
    asset: Result<String, ReleaseError>,
    resolver: &ReleaseResolver<R>,
    fetcher: &ArtifactFetcher,
    policy: UpdatePolicy,
    storage: &Path,
    host: &H,
) -> Result<Option<PathBuf>, ReleaseError>
where
    R: ReleaseRegistry,
    H: Notifier + ConfirmPrompt + ProgressSink,
{
    let asset = asset?;
    let Some(release) = resolver.resolve(policy, host).await? else {
        return Ok(None);
    };
    info!(tag = %release.tag_name, "Using thriftls {}", release.tag_name);
    let path = fetcher.fetch(&release, &asset, storage, host).await?;
    Ok(Some(path))
}

/// Message shown when no release could be resolved at all.
fn no_release_message(policy: UpdatePolicy, storage: &Path) -> String {
    let mut message =
        "Couldn't find any pre-built thriftls binaries because of network error".to_string();
    if policy == UpdatePolicy::NeverCheck {
        message.push_str(" (and checking for newer versions is disabled)");
    } else {
        message.push_str(&format!(
            ", you can download thriftls from {RELEASES_PAGE} and place it at {}",
            storage.display()
        ));
    }
    message
}

/// Finds the server binary to run: the configured one, or the result of the
/// resolve-and-download pipeline.
///
/// Reports failures through `host` and returns `None`.
pub async fn resolve_server_binary<H>(config: &Config, host: &H) -> Option<PathBuf>
where
    H: Notifier + ConfirmPrompt + ProgressSink,
{
    if let Some(path) = config.preset_server_path() {
        info!("Using configured thriftls at {}", path.display());
        return Some(path);
    }

    let storage = config.storage_dir();
    let client = match http_client() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {e}");
            host.error(&format!("Couldn't set up downloads for thriftls: {e}"));
            return None;
        }
    };
    let registry = HttpRegistry::new(client.clone(), config.releases_url.as_deref());
    let resolver = ReleaseResolver::new(registry, ReleaseCache::new(&storage));
    let fetcher = ArtifactFetcher::new(client);

    match install_server_from(
        platform::current(),
        &resolver,
        &fetcher,
        config.update_behavior,
        &storage,
        host,
    )
    .await
    {
        Ok(Some(path)) => Some(path),
        Ok(None) => {
            warn!("No thriftls release resolved under {}", config.update_behavior);
            host.error(&no_release_message(config.update_behavior, &storage));
            None
        }
        Err(e) => {
            error!("Failed to resolve thriftls: {e}");
            host.error(&capitalize(&e.to_string()));
            None
        }
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// An activated client: a resolved binary plus its server instances.
pub struct Activation<L: ServerLauncher> {
    orchestrator: ClientOrchestrator<L>,
    format: Mutex<FormatOptions>,
}

impl<L: ServerLauncher> Activation<L> {
    /// Resolves the server binary and prepares the orchestrator.
    ///
    /// Returns `None` when no binary is available; the failure was already
    /// reported through `host`.
    pub async fn activate<H>(
        config: &Config,
        roots: Vec<String>,
        launcher: L,
        host: &H,
    ) -> Option<Self>
    where
        H: Notifier + ConfirmPrompt + ProgressSink,
    {
        let program = resolve_server_binary(config, host).await?;
        Some(Self::with_program(config, roots, launcher, program))
    }

    /// Builds an activation around an already known binary.
    pub fn with_program(
        config: &Config,
        roots: Vec<String>,
        launcher: L,
        program: PathBuf,
    ) -> Self {
        Self {
            orchestrator: ClientOrchestrator::new(
                launcher,
                Arc::new(LoggingHandler),
                program,
                config.format.to_args(),
                WorkspaceFolders::new(roots),
            ),
            format: Mutex::new(config.format.clone()),
        }
    }

    /// The orchestrator owning the running servers.
    pub const fn orchestrator(&self) -> &ClientOrchestrator<L> {
        &self.orchestrator
    }

    /// Handles an opened document. Launch failures are reported, not
    /// returned, so other roots keep working.
    pub async fn did_open<N: Notifier>(&self, document: &TextDocument, host: &N) -> OpenOutcome {
        match self.orchestrator.did_open(document).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to start thriftls for {}: {e:#}", document.uri);
                host.error(&format!("Failed to start thriftls: {e}"));
                OpenOutcome::Ignored
            }
        }
    }

    /// Forwards a workspace folder change to the orchestrator.
    pub async fn did_change_workspace_folders(&self, added: &[String], removed: &[String]) {
        self.orchestrator
            .did_change_workspace_folders(added, removed)
            .await;
    }

    /// Applies new settings. Changed formatting options only reach servers
    /// started afterwards, so the user is told to reload.
    pub async fn did_change_configuration<N: Notifier>(&self, config: &Config, host: &N) {
        let mut format = self.format.lock().await;
        if *format == config.format {
            return;
        }
        *format = config.format.clone();
        drop(format);

        self.orchestrator.set_args(config.format.to_args()).await;
        host.info("thriftls formatting options changed, reload to apply them to running servers");
    }

    /// Stops every running server.
    pub async fn deactivate(&self) {
        self.orchestrator.deactivate().await;
    }
}
