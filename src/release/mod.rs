// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// Local cache of the last accepted release.
pub mod cache;
/// Error types for the release pipeline.
pub mod error;
/// Asset download into the storage directory.
pub mod fetch;
/// OS/architecture to asset name mapping.
pub mod platform;
/// HTTP release registry client.
pub mod registry;
/// Update policy state machine.
pub mod resolver;
/// Release and asset descriptors.
pub mod types;

pub use cache::ReleaseCache;
pub use error::{RegistryError, ReleaseError};
pub use fetch::ArtifactFetcher;
pub use registry::{HttpRegistry, ReleaseRegistry, http_client};
pub use resolver::{ReleaseResolver, UpdatePolicy};
pub use types::{Asset, Release};
