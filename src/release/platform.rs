// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Maps the local OS and CPU architecture to release asset names.
//!
//! Assets are published as `thriftls-<os>-<arch>`, with an `.exe` suffix on
//! Windows. Both Rust-style (`macos`, `x86_64`) and Node-style (`darwin`,
//! `x64`) names are accepted since hosts report either.

use super::error::ReleaseError;

/// Prefix shared by every published server asset.
pub const ASSET_PREFIX: &str = "thriftls";

/// Returns the expected asset name for an OS/arch pair.
///
/// # Errors
///
/// Returns [`ReleaseError::UnsupportedPlatform`] for any OS or architecture
/// without published binaries.
pub fn asset_name(os: &str, arch: &str) -> Result<String, ReleaseError> {
    let unsupported = || ReleaseError::UnsupportedPlatform {
        os: os.to_string(),
        arch: arch.to_string(),
    };

    let registry_os = match os {
        "darwin" | "macos" => "darwin",
        "linux" => "linux",
        "win32" | "windows" => "windows",
        _ => return Err(unsupported()),
    };

    let registry_arch = match arch {
        "arm64" | "aarch64" => "arm64",
        "x64" | "x86_64" => "amd64",
        "ia32" | "x86" => "386",
        _ => return Err(unsupported()),
    };

    let exe = if registry_os == "windows" { ".exe" } else { "" };
    Ok(format!("{ASSET_PREFIX}-{registry_os}-{registry_arch}{exe}"))
}

/// Returns the expected asset name for the running process.
///
/// # Errors
///
/// Returns [`ReleaseError::UnsupportedPlatform`] when this build target has
/// no published binaries.
pub fn current() -> Result<String, ReleaseError> {
    asset_name(std::env::consts::OS, std::env::consts::ARCH)
}
