// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// Workspace roots and outer-most root lookup.
pub mod folders;
/// One server instance per outer-most root.
pub mod orchestrator;

pub use folders::WorkspaceFolders;
pub use orchestrator::{ClientOrchestrator, InstanceState, OpenOutcome, TextDocument};
