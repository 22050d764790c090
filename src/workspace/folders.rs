// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Project roots of a multi-root workspace and outer-most root resolution.
//!
//! When roots nest (`/a/` and `/a/b/`), only the outer one gets a server; a
//! file under `/a/b/` belongs to `/a/`. Lookups scan a snapshot of the roots
//! sorted by URI length, so the first prefix hit is the outer-most ancestor.
//! The snapshot is rebuilt lazily after the root set changes.

/// Appends a trailing `/` unless present.
fn normalize(uri: &str) -> String {
    if uri.ends_with('/') {
        uri.to_string()
    } else {
        format!("{uri}/")
    }
}

/// A snapshot entry: normalized URI and the root as the host reported it.
#[derive(Debug, Clone)]
struct SortedRoot {
    normalized: String,
    uri: String,
}

/// The current set of project roots.
#[derive(Debug, Default)]
pub struct WorkspaceFolders {
    roots: Vec<String>,
    sorted: Option<Vec<SortedRoot>>,
}

impl WorkspaceFolders {
    /// Creates a folder set from root URIs.
    #[must_use]
    pub fn new<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            sorted: None,
        }
    }

    /// Root URIs in insertion order.
    #[must_use]
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Applies a root-set change and invalidates the sorted snapshot.
    pub fn change(&mut self, added: &[String], removed: &[String]) {
        self.roots.retain(|r| !removed.contains(r));
        for root in added {
            if !self.roots.contains(root) {
                self.roots.push(root.clone());
            }
        }
        self.sorted = None;
    }

    /// Whether the sorted snapshot is waiting to be rebuilt.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.sorted.is_none()
    }

    fn sorted(&mut self) -> &[SortedRoot] {
        self.sorted.get_or_insert_with(|| {
            let mut sorted: Vec<SortedRoot> = self
                .roots
                .iter()
                .map(|uri| SortedRoot {
                    normalized: normalize(uri),
                    uri: uri.clone(),
                })
                .collect();
            // Stable: equal lengths keep insertion order.
            sorted.sort_by_key(|r| r.normalized.len());
            sorted
        })
    }

    /// Returns the outer-most root enclosing `root`.
    ///
    /// Falls back to `root` itself when nothing in the set encloses it.
    pub fn outer_most(&mut self, root: &str) -> String {
        let normalized = normalize(root);
        self.sorted()
            .iter()
            .find(|candidate| normalized.starts_with(&candidate.normalized))
            .map_or_else(|| root.to_string(), |candidate| candidate.uri.clone())
    }

    /// Returns the innermost root containing `file_uri`, like the host's own
    /// folder lookup, or `None` for files outside every root.
    pub fn containing_root(&mut self, file_uri: &str) -> Option<String> {
        self.sorted()
            .iter()
            .rev()
            .find(|candidate| file_uri.starts_with(&candidate.normalized))
            .map(|candidate| candidate.uri.clone())
    }

    /// Returns the outer-most root responsible for `file_uri`.
    pub fn owning_root(&mut self, file_uri: &str) -> Option<String> {
        let root = self.containing_root(file_uri)?;
        Some(self.outer_most(&root))
    }
}
