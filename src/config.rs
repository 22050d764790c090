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

//! Client settings: update policy, registry override, pre-set binary and
//! the formatting options forwarded to every server instance.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::release::UpdatePolicy;

/// Client settings, merged from defaults, config files and `THRIFTLS_*`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// When to check the registry for a newer server (default: keep-up-to-date)
    #[serde(default)]
    pub update_behavior: UpdatePolicy,

    /// Custom release registry endpoint, replacing the GitHub releases API
    #[serde(default)]
    pub releases_url: Option<String>,

    /// Pre-installed server binary. When non-empty, nothing is downloaded.
    #[serde(default)]
    pub server_path: Option<String>,

    /// Where the release cache and downloaded binaries live
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    /// Formatting options passed to the server on launch
    #[serde(default)]
    pub format: FormatOptions,
}

/// Formatting flags handed to every server at launch.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    /// Number of indent units per level
    #[serde(default = "default_indent_width")]
    pub indent_width: u32,

    /// Indent with spaces or tabs
    #[serde(default)]
    pub indent_unit: IndentUnit,

    /// Column alignment of struct fields
    #[serde(default)]
    pub align: AlignMode,

    /// Trailing separator handling for field lines
    #[serde(default)]
    pub field_line_comma: LineCommaMode,
}

/// Indentation character.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndentUnit {
    /// Indent with spaces
    #[default]
    Space,
    /// Indent with tabs
    Tab,
}

/// Field alignment mode.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlignMode {
    /// Align field types and names
    #[default]
    Field,
    /// Align only the `=` of default values
    Assign,
    /// Leave alignment as written
    Disable,
}

/// Trailing separator mode.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineCommaMode {
    /// Add a separator to every field
    Add,
    /// Strip field separators
    Remove,
    /// Leave separators as written
    #[default]
    Disable,
}

const fn default_indent_width() -> u32 {
    4
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            indent_width: default_indent_width(),
            indent_unit: IndentUnit::default(),
            align: AlignMode::default(),
            field_line_comma: LineCommaMode::default(),
        }
    }
}

impl FormatOptions {
    /// Command-line arguments carrying these options to the server.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let unit = match self.indent_unit {
            IndentUnit::Space => "spaces",
            IndentUnit::Tab => "tab",
        };
        let align = match self.align {
            AlignMode::Field => "field",
            AlignMode::Assign => "assign",
            AlignMode::Disable => "disable",
        };
        let comma = match self.field_line_comma {
            LineCommaMode::Add => "add",
            LineCommaMode::Remove => "remove",
            LineCommaMode::Disable => "disable",
        };

        vec![
            "-indent".to_string(),
            format!("{}{unit}", self.indent_width),
            "-align".to_string(),
            align.to_string(),
            "-fieldLineComma".to_string(),
            comma.to_string(),
        ]
    }
}

impl Config {
    /// Load configuration from standard paths or a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source exists but cannot be
    /// parsed.
    pub fn load(explicit_file: Option<PathBuf>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // 1. Start with defaults
        builder = builder.set_default("update_behavior", "keep-up-to-date")?;

        // 2. Load from user config directory (~/.config/thriftls/client.toml)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("thriftls").join("client.toml");
            if config_path.exists() {
                builder = builder.add_source(config::File::from(config_path));
            }
        }

        // 3. Load from explicit file if provided
        if let Some(path) = explicit_file {
            builder = builder.add_source(config::File::from(path));
        }

        // 4. Load from environment variables (THRIFTLS_UPDATE_BEHAVIOR, THRIFTLS_FORMAT__ALIGN, ...)
        builder = builder.add_source(
            config::Environment::with_prefix("THRIFTLS")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = builder
            .build()
            .context("Failed to build configuration")?;

        config.try_deserialize().context("Failed to deserialize configuration")
    }

    /// The pre-set server binary, if one is configured.
    #[must_use]
    pub fn preset_server_path(&self) -> Option<PathBuf> {
        self.server_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Storage directory for the cache and downloads.
    ///
    /// Defaults to `<data_local_dir>/thriftls`.
    #[must_use]
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("thriftls")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_format_args() {
        assert_eq!(
            FormatOptions::default().to_args(),
            ["-indent", "4spaces", "-align", "field", "-fieldLineComma", "disable"]
        );
    }

    #[test]
    fn custom_format_args() {
        let options = FormatOptions {
            indent_width: 1,
            indent_unit: IndentUnit::Tab,
            align: AlignMode::Assign,
            field_line_comma: LineCommaMode::Add,
        };
        assert_eq!(
            options.to_args(),
            ["-indent", "1tab", "-align", "assign", "-fieldLineComma", "add"]
        );
    }

    #[test]
    fn blank_server_path_is_not_a_preset() {
        let mut config = Config::default();
        assert_eq!(config.preset_server_path(), None);
        config.server_path = Some("   ".into());
        assert_eq!(config.preset_server_path(), None);
        config.server_path = Some("/opt/thriftls".into());
        assert_eq!(config.preset_server_path(), Some(PathBuf::from("/opt/thriftls")));
    }

    #[test]
    fn load_reads_explicit_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            r#"
update_behavior = "weekly"
releases_url = "https://mirror.example/releases"

[format]
indent_width = 2
align = "disable"
field_line_comma = "remove"
"#,
        )?;

        let config = Config::load(Some(path))?;
        assert_eq!(config.update_behavior, UpdatePolicy::WeeklyCheck);
        assert_eq!(
            config.releases_url.as_deref(),
            Some("https://mirror.example/releases")
        );
        assert_eq!(config.format.indent_width, 2);
        assert_eq!(config.format.indent_unit, IndentUnit::Space);
        assert_eq!(config.format.align, AlignMode::Disable);
        assert_eq!(config.format.field_line_comma, LineCommaMode::Remove);
        Ok(())
    }
}
