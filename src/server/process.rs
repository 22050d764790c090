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
use bytes::BytesMut;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, oneshot, watch};
use tracing::{debug, info, trace, warn};

use super::protocol::{self, NotificationMessage, RequestId, RequestMessage, ResponseMessage};
use super::{LaunchParams, LifecycleHandler, ServerInstance, ServerLauncher};

/// Default time the server gets to answer `shutdown`, and again to exit.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<ResponseMessage>>>>;

/// Launches servers as child processes talking over stdio.
#[derive(Debug, Clone, Copy)]
pub struct ProcessLauncher {
    shutdown_timeout: Duration,
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self {
            shutdown_timeout: SHUTDOWN_TIMEOUT,
        }
    }
}

impl ProcessLauncher {
    /// Sets how long stopped servers get for each shutdown step before
    /// they are killed.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl ServerLauncher for ProcessLauncher {
    type Instance = ServerProcess;

    fn launch(
        &self,
        params: &LaunchParams,
        handler: Arc<dyn LifecycleHandler>,
    ) -> Result<ServerProcess> {
        ServerProcess::spawn(params, handler, self.shutdown_timeout)
    }
}

/// A running server process.
///
/// Dropping the handle without [`ServerInstance::stop`] kills the process.
pub struct ServerProcess {
    root: String,
    pid: Option<u32>,
    next_id: AtomicI64,
    stdin: Arc<Mutex<ChildStdin>>,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
    exited: watch::Receiver<bool>,
    kill: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl ServerProcess {
    /// Spawns the server and starts the stdout, stderr and exit watchers.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    pub fn spawn(
        params: &LaunchParams,
        handler: Arc<dyn LifecycleHandler>,
        shutdown_timeout: Duration,
    ) -> Result<Self> {
        let mut child = Command::new(&params.program)
            .args(&params.args)
            .current_dir(&params.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to spawn thriftls server: {}",
                    params.program.display()
                )
            })?;

        let stdin = child.stdin.take().context("stdin not captured")?;
        let stdout = child.stdout.take().context("stdout not captured")?;
        let stderr = child.stderr.take().context("stderr not captured")?;
        let pid = child.id();

        info!(
            "Started thriftls for {} (pid {:?}): {} {}",
            params.root,
            pid,
            params.program.display(),
            params.args.join(" ")
        );

        let stdin = Arc::new(Mutex::new(stdin));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let (exited_tx, exited_rx) = watch::channel(false);
        let (kill_tx, kill_rx) = oneshot::channel();

        tokio::spawn(Self::reader_task(
            params.root.clone(),
            stdin.clone(),
            stdout,
            pending.clone(),
            handler.clone(),
        ));
        tokio::spawn(Self::stderr_task(params.root.clone(), stderr));
        tokio::spawn(Self::exit_task(
            params.root.clone(),
            child,
            kill_rx,
            alive.clone(),
            exited_tx,
            handler,
        ));

        Ok(Self {
            root: params.root.clone(),
            pid,
            next_id: AtomicI64::new(1),
            stdin,
            pending,
            alive,
            exited: exited_rx,
            kill: Some(kill_tx),
            shutdown_timeout,
        })
    }

    /// OS process id, if the process was still running when spawned.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Reads server messages: answers server requests, routes responses.
    async fn reader_task(
        root: String,
        stdin: Arc<Mutex<ChildStdin>>,
        stdout: ChildStdout,
        pending: PendingMap,
        handler: Arc<dyn LifecycleHandler>,
    ) {
        let mut reader = BufReader::new(stdout);
        let mut buffer = BytesMut::with_capacity(8192);
        let mut temp = [0u8; 4096];

        loop {
            match reader.read(&mut temp).await {
                Ok(0) => {
                    debug!("thriftls stdout closed for {root}");
                    break;
                }
                Ok(n) => buffer.extend_from_slice(&temp[..n]),
                Err(e) => {
                    handler.error(&root, &format!("read failed: {e}"));
                    break;
                }
            }

            loop {
                let message = match protocol::try_parse_message(&mut buffer) {
                    Ok(Some(message)) => message,
                    Ok(None) => break,
                    Err(e) => {
                        handler.error(&root, &format!("malformed message: {e}"));
                        buffer.clear();
                        break;
                    }
                };
                trace!("Received from thriftls ({root}): {message}");
                Self::dispatch(&root, &message, &stdin, &pending).await;
            }
        }
    }

    async fn dispatch(
        root: &str,
        message: &str,
        stdin: &Arc<Mutex<ChildStdin>>,
        pending: &PendingMap,
    ) {
        let value: serde_json::Value = match serde_json::from_str(message) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to parse JSON from thriftls ({root}): {e}");
                return;
            }
        };

        let method = value.get("method").and_then(|m| m.as_str());
        let id = value.get("id").cloned();

        match (method, id) {
            (Some(method), Some(id)) => {
                debug!("thriftls ({root}) sent request {method}, declining");
                let Ok(id) = serde_json::from_value::<RequestId>(id) else {
                    return;
                };
                let reply = ResponseMessage::method_not_found(id, method);
                if let Err(e) = write_message(stdin, &reply).await {
                    warn!("Failed to answer thriftls ({root}) request: {e}");
                }
            }
            (Some(_), None) => {
                if let Ok(notification) = serde_json::from_value::<NotificationMessage>(value)
                    && let Some(text) = notification.params.get("message").and_then(|m| m.as_str())
                {
                    debug!("thriftls ({root}): {text}");
                }
            }
            (None, Some(_)) => {
                if let Ok(response) = serde_json::from_value::<ResponseMessage>(value)
                    && let Some(id) = &response.id
                    && let Some(sender) = pending.lock().await.remove(id)
                {
                    let _ = sender.send(response);
                }
            }
            (None, None) => warn!("Unknown message format from thriftls ({root})"),
        }
    }

    /// Forwards server stderr to the log, one line at a time.
    async fn stderr_task(root: String, stderr: ChildStderr) {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "thriftls_client::server::output", "[{root}] {line}");
        }
    }

    /// Waits for the process to exit, killing it on request.
    async fn exit_task(
        root: String,
        mut child: Child,
        kill: oneshot::Receiver<()>,
        alive: Arc<AtomicBool>,
        exited: watch::Sender<bool>,
        handler: Arc<dyn LifecycleHandler>,
    ) {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = kill => {
                warn!("Killing unresponsive thriftls for {root}");
                if let Err(e) = child.kill().await {
                    handler.error(&root, &format!("kill failed: {e}"));
                }
                child.wait().await
            }
        };

        alive.store(false, Ordering::SeqCst);
        match status {
            Ok(status) => debug!("thriftls for {root} exited with {status}"),
            Err(e) => handler.error(&root, &format!("wait failed: {e}")),
        }
        let _ = exited.send(true);
        handler.closed(&root);
    }

    /// Sends a request and waits for its response.
    async fn request(&self, method: &str, params: serde_json::Value) -> Result<ResponseMessage> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = RequestMessage::new(id, method, params);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request.id.clone(), tx);

        if let Err(e) = write_message(&self.stdin, &request).await {
            self.pending.lock().await.remove(&request.id);
            return Err(e);
        }

        match tokio::time::timeout(self.shutdown_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(anyhow!("thriftls closed the connection")),
            Err(_) => {
                self.pending.lock().await.remove(&request.id);
                Err(anyhow!(
                    "'{method}' timed out after {:?}",
                    self.shutdown_timeout
                ))
            }
        }
    }

    async fn wait_exited(&mut self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.exited.wait_for(|exited| *exited))
            .await
            .is_ok()
    }
}

async fn write_message<T: serde::Serialize>(stdin: &Mutex<ChildStdin>, message: &T) -> Result<()> {
    let framed = protocol::encode(message)?;
    let mut stdin = stdin.lock().await;
    stdin.write_all(&framed).await?;
    stdin.flush().await?;
    Ok(())
}

impl ServerInstance for ServerProcess {
    fn is_running(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn stop(mut self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        debug!("Shutting down thriftls for {}", self.root);
        match self.request("shutdown", serde_json::Value::Null).await {
            Ok(response) => {
                if let Some(error) = response.error {
                    debug!("thriftls rejected shutdown: {}", error.message);
                }
                let exit = NotificationMessage::new("exit", serde_json::Value::Null);
                if let Err(e) = write_message(&self.stdin, &exit).await {
                    debug!("Failed to send exit to thriftls: {e}");
                }
            }
            Err(e) => warn!("thriftls for {} did not acknowledge shutdown: {e}", self.root),
        }

        if self.wait_exited(self.shutdown_timeout).await {
            return Ok(());
        }

        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
        if self.wait_exited(self.shutdown_timeout).await {
            Ok(())
        } else {
            Err(anyhow!("thriftls for {} did not exit", self.root))
        }
    }
}
