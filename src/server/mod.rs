// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Launching and stopping server processes.
//!
//! The orchestrator only sees the [`ServerLauncher`] and [`ServerInstance`]
//! traits; [`ProcessLauncher`] is the real stdio implementation.

/// Child-process backed server instances.
pub mod process;
/// Content-Length framed JSON-RPC messages.
pub mod protocol;

use anyhow::Result;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub use process::{ProcessLauncher, SHUTDOWN_TIMEOUT, ServerProcess};

/// Everything needed to start one server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    /// Server executable.
    pub program: PathBuf,
    /// Command-line arguments.
    pub args: Vec<String>,
    /// Working directory of the process.
    pub cwd: PathBuf,
    /// URI of the project root the instance serves.
    pub root: String,
}

/// Callbacks for events a running instance reports.
pub trait LifecycleHandler: Send + Sync {
    /// The connection reported an error. The instance keeps running.
    fn error(&self, root: &str, message: &str);
    /// The server process exited. It is not restarted.
    fn closed(&self, root: &str);
}

/// Handler that logs lifecycle events and takes no further action.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl LifecycleHandler for LoggingHandler {
    fn error(&self, root: &str, message: &str) {
        warn!("thriftls for {root} reported an error: {message}");
    }

    fn closed(&self, root: &str) {
        info!("thriftls for {root} closed, not restarting");
    }
}

/// Starts server instances.
pub trait ServerLauncher: Send + Sync {
    /// Handle type of a started instance.
    type Instance: ServerInstance;

    /// Starts an instance, binding `handler` to its lifecycle events.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started.
    fn launch(
        &self,
        params: &LaunchParams,
        handler: Arc<dyn LifecycleHandler>,
    ) -> Result<Self::Instance>;
}

/// A started server instance.
pub trait ServerInstance: Send + Sync {
    /// Whether the underlying process is still running.
    fn is_running(&self) -> bool;

    /// Asks the server to shut down and waits for it to exit.
    fn stop(self) -> impl Future<Output = Result<()>> + Send;
}
