/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use anyhow::{Context, Result, anyhow};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::folders::WorkspaceFolders;
use crate::server::{LaunchParams, LifecycleHandler, ServerInstance, ServerLauncher};

/// Language id of documents that get a server.
pub const THRIFT_LANGUAGE_ID: &str = "thrift";

/// A document the editor opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    /// Document URI, e.g. `file:///work/api/service.thrift`.
    pub uri: String,
    /// Editor language id.
    pub language_id: String,
}

impl TextDocument {
    /// A document with the given URI and language identifier.
    #[must_use]
    pub fn new(uri: impl Into<String>, language_id: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            language_id: language_id.into(),
        }
    }

    /// A Thrift document for a local file.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not absolute.
    pub fn thrift_file(path: &Path) -> Result<Self> {
        let uri = Url::from_file_path(path)
            .map_err(|()| anyhow!("Not an absolute path: {}", path.display()))?;
        Ok(Self::new(uri, THRIFT_LANGUAGE_ID))
    }
}

/// Server state of a project root.
///
/// Starting is not a separate state: the launch runs while the instance map
/// is locked, so callers only ever see its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// No instance was started, or it was removed.
    Absent,
    /// The process is alive.
    Running,
    /// The process exited. A later open starts a new one.
    Stopped,
}

/// What [`ClientOrchestrator::did_open`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Not a local Thrift file, or outside every root.
    Ignored,
    /// The owning root already had a running server.
    AlreadyRunning(String),
    /// A server was started for the owning root.
    Started(String),
}

struct State<I> {
    folders: WorkspaceFolders,
    clients: HashMap<String, I>,
    args: Vec<String>,
}

/// Keeps one server instance per outer-most project root.
pub struct ClientOrchestrator<L: ServerLauncher> {
    launcher: L,
    handler: Arc<dyn LifecycleHandler>,
    program: PathBuf,
    state: Mutex<State<L::Instance>>,
}

impl<L: ServerLauncher> ClientOrchestrator<L> {
    /// Creates an orchestrator that launches `program` with `args`.
    pub fn new(
        launcher: L,
        handler: Arc<dyn LifecycleHandler>,
        program: PathBuf,
        args: Vec<String>,
        folders: WorkspaceFolders,
    ) -> Self {
        Self {
            launcher,
            handler,
            program,
            state: Mutex::new(State {
                folders,
                clients: HashMap::new(),
                args,
            }),
        }
    }

    /// The server binary every instance runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Starts a server for the document's root unless one is running.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be launched. The root stays
    /// absent, so the next open retries.
    pub async fn did_open(&self, document: &TextDocument) -> Result<OpenOutcome> {
        if document.language_id != THRIFT_LANGUAGE_ID {
            return Ok(OpenOutcome::Ignored);
        }
        let Some(file) = Url::parse(&document.uri)
            .ok()
            .filter(|u| u.scheme() == "file")
        else {
            return Ok(OpenOutcome::Ignored);
        };

        let mut state = self.state.lock().await;
        let Some(root) = state.folders.owning_root(&document.uri) else {
            debug!("{} is outside every workspace folder", document.uri);
            return Ok(OpenOutcome::Ignored);
        };

        let stale = match state.clients.get(&root) {
            Some(instance) if instance.is_running() => {
                return Ok(OpenOutcome::AlreadyRunning(root));
            }
            Some(_) => state.clients.remove(&root),
            None => None,
        };

        let params = LaunchParams {
            program: self.program.clone(),
            args: state.args.clone(),
            cwd: working_dir(&root, &file)?,
            root: root.clone(),
        };
        info!("Starting thriftls for {root}");
        let instance = self.launcher.launch(&params, self.handler.clone())?;
        state.clients.insert(root.clone(), instance);
        drop(state);

        if let Some(stale) = stale
            && let Err(e) = stale.stop().await
        {
            debug!("Stopping exited thriftls for {root}: {e}");
        }
        Ok(OpenOutcome::Started(root))
    }

    /// Applies a workspace folder change, stopping servers of removed roots.
    pub async fn did_change_workspace_folders(&self, added: &[String], removed: &[String]) {
        let stopping: Vec<(String, L::Instance)> = {
            let mut state = self.state.lock().await;
            state.folders.change(added, removed);
            removed
                .iter()
                .filter_map(|root| state.clients.remove(root).map(|i| (root.clone(), i)))
                .collect()
        };

        stop_all(stopping).await;
    }

    /// Stops every instance and waits for all of them.
    pub async fn deactivate(&self) {
        let stopping: Vec<(String, L::Instance)> =
            self.state.lock().await.clients.drain().collect();
        stop_all(stopping).await;
    }

    /// Replaces the arguments used for instances started from now on.
    pub async fn set_args(&self, args: Vec<String>) {
        self.state.lock().await.args = args;
    }

    /// Arguments new instances are started with.
    pub async fn args(&self) -> Vec<String> {
        self.state.lock().await.args.clone()
    }

    /// State of the instance registered for `root`.
    pub async fn state(&self, root: &str) -> InstanceState {
        match self.state.lock().await.clients.get(root) {
            None => InstanceState::Absent,
            Some(instance) if instance.is_running() => InstanceState::Running,
            Some(_) => InstanceState::Stopped,
        }
    }

    /// Roots whose server is running, sorted.
    pub async fn running_roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = self
            .state
            .lock()
            .await
            .clients
            .iter()
            .filter(|(_, instance)| instance.is_running())
            .map(|(root, _)| root.clone())
            .collect();
        roots.sort();
        roots
    }
}

/// Local directory of `root`, or of the opened file when `root` is not a
/// local path.
fn working_dir(root: &str, file: &Url) -> Result<PathBuf> {
    if let Ok(url) = Url::parse(root)
        && url.scheme() == "file"
        && let Ok(path) = url.to_file_path()
    {
        return Ok(path);
    }

    let path = file
        .to_file_path()
        .map_err(|()| anyhow!("Not a local file: {file}"))?;
    path.parent()
        .map(Path::to_path_buf)
        .with_context(|| format!("No parent directory for {}", path.display()))
}

async fn stop_all<I: ServerInstance>(stopping: Vec<(String, I)>) {
    join_all(stopping.into_iter().map(|(root, instance)| async move {
        info!("Stopping thriftls for {root}");
        if let Err(e) = instance.stop().await {
            warn!("Failed to stop thriftls for {root}: {e}");
        }
    }))
    .await;
}
