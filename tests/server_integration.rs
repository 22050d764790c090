// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Integration tests for server processes.
//!
//! Launches `mock-thriftls` through the real stdio launcher and checks the
//! shutdown handshake, crash reporting and the kill fallback.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use thriftls_client::server::{
    LaunchParams, LifecycleHandler, ProcessLauncher, ServerInstance, ServerLauncher,
};
use thriftls_client::workspace::{
    ClientOrchestrator, InstanceState, OpenOutcome, TextDocument, WorkspaceFolders,
};

const MOCK: &str = env!("CARGO_BIN_EXE_mock-thriftls");

/// Records every `closed` and `error` callback.
#[derive(Default)]
struct RecordingHandler {
    closed: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingHandler {
    fn closed_roots(&self) -> Vec<String> {
        self.closed.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn errors(&self) -> Vec<String> {
        self.errors.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl LifecycleHandler for RecordingHandler {
    fn error(&self, root: &str, message: &str) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(format!("{root}: {message}"));
        }
    }

    fn closed(&self, root: &str) {
        if let Ok(mut closed) = self.closed.lock() {
            closed.push(root.to_string());
        }
    }
}

/// Polls `check` every 20ms until it holds or `timeout` passes.
async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            bail!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(())
}

fn params(cwd: &Path, args: &[&str]) -> LaunchParams {
    LaunchParams {
        program: PathBuf::from(MOCK),
        args: args.iter().map(ToString::to_string).collect(),
        cwd: cwd.to_path_buf(),
        root: "file:///project/".to_string(),
    }
}

fn read_record(path: &Path) -> Result<serde_json::Value> {
    let data = std::fs::read(path).context("launch record missing")?;
    Ok(serde_json::from_slice(&data)?)
}

#[tokio::test]
async fn test_stop_performs_shutdown_handshake() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let record = dir.path().join("launch.json");
    let record_arg = record.display().to_string();
    let handler = Arc::new(RecordingHandler::default());

    let instance = ProcessLauncher::default().launch(
        &params(dir.path(), &["--record", &record_arg, "-indent", "2tab"]),
        handler.clone(),
    )?;
    assert!(instance.is_running());

    wait_until(Duration::from_secs(5), || read_record(&record).is_ok()).await?;
    let launched = read_record(&record)?;
    assert_eq!(
        PathBuf::from(launched["cwd"].as_str().unwrap_or_default()).canonicalize()?,
        dir.path().canonicalize()?
    );
    assert_eq!(launched["format"], serde_json::json!(["-indent", "2tab"]));

    tokio::time::timeout(Duration::from_secs(5), instance.stop()).await??;
    wait_until(Duration::from_secs(5), || !handler.closed_roots().is_empty()).await?;
    assert_eq!(handler.closed_roots(), ["file:///project/"]);
    assert!(handler.errors().is_empty(), "{:?}", handler.errors());
    Ok(())
}

#[tokio::test]
async fn test_crash_is_reported_without_restart() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let handler = Arc::new(RecordingHandler::default());

    let instance = ProcessLauncher::default().launch(
        &params(dir.path(), &["--exit-after-ms", "100"]),
        handler.clone(),
    )?;

    wait_until(Duration::from_secs(5), || !instance.is_running()).await?;
    wait_until(Duration::from_secs(5), || handler.closed_roots().len() == 1).await?;

    // Stopping an exited process is a no-op.
    instance.stop().await?;
    assert_eq!(handler.closed_roots().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_unresponsive_server_is_killed() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let handler = Arc::new(RecordingHandler::default());
    let launcher = ProcessLauncher::default().with_shutdown_timeout(Duration::from_millis(300));

    let instance = launcher.launch(
        &params(dir.path(), &["--ignore-shutdown"]),
        handler.clone(),
    )?;

    tokio::time::timeout(Duration::from_secs(5), instance.stop()).await??;
    wait_until(Duration::from_secs(5), || handler.closed_roots().len() == 1).await?;
    Ok(())
}

#[tokio::test]
async fn test_missing_binary_fails_to_launch() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut missing = params(dir.path(), &[]);
    missing.program = dir.path().join("no-such-thriftls");

    let result = ProcessLauncher::default().launch(&missing, Arc::new(RecordingHandler::default()));
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_orchestrator_runs_one_server_per_outer_root() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().canonicalize()?;
    let nested = root.join("nested");
    std::fs::create_dir_all(&nested)?;
    let file = nested.join("service.thrift");
    std::fs::write(&file, "service Ping {}\n")?;
    let record = root.join("launch.json");

    let root_uri = Url::from_directory_path(&root)
        .map_err(|()| anyhow::anyhow!("bad root"))?
        .to_string();
    let nested_uri = Url::from_directory_path(&nested)
        .map_err(|()| anyhow::anyhow!("bad root"))?
        .to_string();

    let orchestrator = ClientOrchestrator::new(
        ProcessLauncher::default(),
        Arc::new(RecordingHandler::default()),
        PathBuf::from(MOCK),
        vec![
            "--record".into(),
            record.display().to_string(),
            "-align".into(),
            "field".into(),
        ],
        WorkspaceFolders::new([nested_uri.clone(), root_uri.clone()]),
    );

    let document = TextDocument::thrift_file(&file)?;
    assert_eq!(
        orchestrator.did_open(&document).await?,
        OpenOutcome::Started(root_uri.clone())
    );
    assert_eq!(
        orchestrator.did_open(&document).await?,
        OpenOutcome::AlreadyRunning(root_uri.clone())
    );
    assert_eq!(orchestrator.state(&nested_uri).await, InstanceState::Absent);

    wait_until(Duration::from_secs(5), || read_record(&record).is_ok()).await?;
    let launched = read_record(&record)?;
    assert_eq!(
        PathBuf::from(launched["cwd"].as_str().unwrap_or_default()).canonicalize()?,
        root
    );

    orchestrator.deactivate().await;
    assert_eq!(orchestrator.state(&root_uri).await, InstanceState::Absent);
    assert!(orchestrator.running_roots().await.is_empty());
    Ok(())
}
