// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! thriftls client CLI.
//!
//! Installs the thriftls language server for this platform and runs one
//! server per outer-most project root.

#![allow(clippy::print_stdout, reason = "CLI tool needs to output to stdout")]

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use url::Url;

use thriftls_client::activation::{self, Activation};
use thriftls_client::cli::{ColorConfig, TerminalHost};
use thriftls_client::config::Config;
use thriftls_client::release::{ReleaseCache, platform};
use thriftls_client::server::ProcessLauncher;
use thriftls_client::workspace::{OpenOutcome, TextDocument};

/// How often `run` checks whether any server is still alive.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Command-line arguments for the thriftls client.
#[derive(Parser, Debug)]
#[command(name = "thriftls-client")]
#[command(about = "Install, update and run the thriftls language server")]
#[command(version = env!("THRIFTLS_CLIENT_VERSION"))]
struct Args {
    /// The subcommand to run.
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the release cache and downloaded binaries.
    /// Overrides the config file.
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Accept update prompts without asking.
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    nocolor: bool,
}

/// Subcommands supported by the client.
#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the release under the update policy, download it and print
    /// the binary path.
    Fetch,

    /// Show the cached release.
    Cache,

    /// Print the asset name expected for this platform.
    Platform,

    /// Start servers for the given files and run until interrupted or every
    /// server has exited.
    Run {
        /// Workspace root directories. Can be specified multiple times.
        #[arg(short, long, required = true)]
        root: Vec<PathBuf>,

        /// Thrift files to open.
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("thriftls_client=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(args.config.clone())?;
    if let Some(dir) = &args.storage_dir {
        config.storage_dir = Some(dir.clone());
    }
    let host = TerminalHost::new(ColorConfig::new(args.nocolor), args.yes);

    match args.command {
        Command::Fetch => run_fetch(&config, &host).await,
        Command::Cache => run_cache(&config).await,
        Command::Platform => run_platform(),
        Command::Run { root, files } => run_servers(&config, &host, &root, &files).await,
    }
}

async fn run_fetch(config: &Config, host: &TerminalHost) -> Result<()> {
    let path = activation::resolve_server_binary(config, host)
        .await
        .ok_or_else(|| anyhow!("No thriftls binary available"))?;
    println!("{}", path.display());
    Ok(())
}

async fn run_cache(config: &Config) -> Result<()> {
    let cache = ReleaseCache::new(&config.storage_dir());
    let Some(release) = cache.read().await? else {
        println!("No cached release in {}", cache.path().display());
        return Ok(());
    };

    println!("Tag:        {}", release.tag_name);
    if let Some(checked) = release
        .last_check_time
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
    {
        println!("Checked:    {}", checked.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("Assets:");
    for asset in &release.assets {
        println!("  {}", asset.name);
    }
    Ok(())
}

fn run_platform() -> Result<()> {
    println!("{}", platform::current()?);
    Ok(())
}

/// Directory URI of a workspace root, with a trailing `/`.
fn root_uri(dir: &Path) -> Result<String> {
    let dir = dir
        .canonicalize()
        .with_context(|| format!("Invalid root: {}", dir.display()))?;
    Url::from_directory_path(&dir)
        .map(String::from)
        .map_err(|()| anyhow!("Not an absolute path: {}", dir.display()))
}

async fn run_servers(
    config: &Config,
    host: &TerminalHost,
    roots: &[PathBuf],
    files: &[PathBuf],
) -> Result<()> {
    let roots = roots
        .iter()
        .map(|dir| root_uri(dir))
        .collect::<Result<Vec<_>>>()?;

    let launcher = ProcessLauncher::default();
    let Some(activation) = Activation::activate(config, roots, launcher, host).await else {
        bail!("No thriftls binary available");
    };

    for file in files {
        let path = file
            .canonicalize()
            .with_context(|| format!("Cannot open {}", file.display()))?;
        match activation
            .did_open(&TextDocument::thrift_file(&path)?, host)
            .await
        {
            OpenOutcome::Started(root) => info!("Opened {} (server for {root})", path.display()),
            OpenOutcome::AlreadyRunning(root) => {
                debug!("Opened {} (server for {root} already running)", path.display());
            }
            OpenOutcome::Ignored => info!("No server for {}", path.display()),
        }
    }

    let orchestrator = activation.orchestrator();
    tokio::select! {
        () = async {
            while !orchestrator.running_roots().await.is_empty() {
                tokio::time::sleep(EXIT_POLL_INTERVAL).await;
            }
        } => info!("Every thriftls server has exited"),
        _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
    }

    activation.deactivate().await;
    Ok(())
}
