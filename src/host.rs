// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Capabilities the embedding editor provides.
//!
//! Release resolution and download only talk to the user through these
//! traits, so they run the same under an editor, the terminal host in
//! [`crate::cli`], or a test double.

use std::future::Future;

/// User-visible message channel.
pub trait Notifier: Send + Sync {
    /// Informational message.
    fn info(&self, message: &str);
    /// Non-fatal problem the user should know about.
    fn warning(&self, message: &str);
    /// Failure that stopped an operation.
    fn error(&self, message: &str);
}

/// Yes/no question to the user.
pub trait ConfirmPrompt: Send + Sync {
    /// Asks `message`, offering `accept` and `decline` choices.
    ///
    /// Resolves to `true` only if the user picked `accept`; dismissing the
    /// prompt counts as declining.
    fn confirm(
        &self,
        message: &str,
        accept: &str,
        decline: &str,
    ) -> impl Future<Output = bool> + Send;
}

/// Progress display for long downloads.
pub trait ProgressSink: Send + Sync {
    /// A new task started. `total` is the expected byte count when known.
    fn begin(&self, title: &str, total: Option<u64>);
    /// `done` bytes have been processed so far.
    fn advance(&self, done: u64);
    /// The task ended, successfully or not.
    fn finish(&self);
}

/// Progress sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn begin(&self, _title: &str, _total: Option<u64>) {}
    fn advance(&self, _done: u64) {}
    fn finish(&self) {}
}
