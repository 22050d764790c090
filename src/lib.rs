// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Client for the thriftls Thrift language server.
//!
//! Finds or downloads a server binary matching the host platform, keeps it up
//! to date under a configurable policy, and supervises one server process per
//! outer-most project root of a multi-root workspace.

/// Client lifecycle from binary resolution to shutdown.
pub mod activation;
/// Terminal host and output utilities.
pub mod cli;
/// Client settings and formatting options.
pub mod config;
/// Capabilities the embedding editor provides.
pub mod host;
/// Release registry, cache, update policies and download.
pub mod release;
/// Server process launching and lifecycle.
pub mod server;
/// Workspace folders and per-root server instances.
pub mod workspace;

#[cfg(test)]
mod test_support;
