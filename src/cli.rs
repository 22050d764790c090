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

//! Terminal host: messages, prompts and download progress on stderr.

use crossterm::tty::IsTty;
use std::io::{Write, stderr, stdin};
use std::sync::Mutex;

use crate::host::{ConfirmPrompt, Notifier, ProgressSink};

/// Configuration for color output
#[derive(Debug, Clone)]
pub struct ColorConfig {
    /// Whether ANSI colors are emitted
    pub enabled: bool,
}

impl ColorConfig {
    /// Create a new `ColorConfig`, auto-detecting a stderr TTY unless nocolor is true
    #[must_use]
    pub fn new(nocolor: bool) -> Self {
        Self {
            enabled: !nocolor && stderr().is_tty(),
        }
    }

    fn paint(&self, code: &str, s: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{s}\x1b[0m")
        } else {
            s.to_string()
        }
    }

    /// ANSI escape code for red (errors)
    #[must_use]
    pub fn red(&self, s: &str) -> String {
        self.paint("31", s)
    }

    /// ANSI escape code for yellow (warnings)
    #[must_use]
    pub fn yellow(&self, s: &str) -> String {
        self.paint("33", s)
    }

    /// ANSI escape code for cyan (prompts)
    #[must_use]
    pub fn cyan(&self, s: &str) -> String {
        self.paint("36", s)
    }

    /// Dim text, for secondary details.
    #[must_use]
    pub fn dim(&self, s: &str) -> String {
        self.paint("2", s)
    }
}

/// Get the terminal width, defaulting to 80 if unable to detect
#[must_use]
pub fn terminal_width() -> usize {
    crossterm::terminal::size().map_or(80, |(w, _)| usize::from(w))
}

/// Truncate a string to `max_len` characters, adding "..." if truncated
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if max_len <= 3 {
        return ".".repeat(max_len.min(3));
    }
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

/// Whether a typed answer picks the `accept` choice.
#[must_use]
pub fn is_accept(answer: &str, accept: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case(accept)
        || answer.eq_ignore_ascii_case("y")
        || answer.eq_ignore_ascii_case("yes")
}

/// One progress line: `title: 42% (1.2 MiB / 3.0 MiB)`.
#[must_use]
pub fn progress_line(title: &str, done: u64, total: Option<u64>) -> String {
    #[allow(
        clippy::cast_precision_loss,
        reason = "byte counts only need display precision"
    )]
    let mib = |bytes: u64| bytes as f64 / (1024.0 * 1024.0);
    match total {
        Some(total) if total > 0 => format!(
            "{title}: {}% ({:.1} MiB / {:.1} MiB)",
            done.saturating_mul(100) / total,
            mib(done),
            mib(total)
        ),
        _ => format!("{title}: {:.1} MiB", mib(done)),
    }
}

#[derive(Debug)]
struct ProgressState {
    title: String,
    total: Option<u64>,
    last_percent: Option<u64>,
}

/// [`Notifier`], [`ConfirmPrompt`] and [`ProgressSink`] for a terminal.
#[derive(Debug)]
pub struct TerminalHost {
    colors: ColorConfig,
    assume_yes: bool,
    progress: Mutex<Option<ProgressState>>,
}

impl TerminalHost {
    /// Creates a host. With `assume_yes`, every prompt is accepted unasked.
    #[must_use]
    pub fn new(colors: ColorConfig, assume_yes: bool) -> Self {
        Self {
            colors,
            assume_yes,
            progress: Mutex::new(None),
        }
    }

    fn emit(&self, label: &str, message: &str) {
        let _ = writeln!(stderr(), "{label} {message}");
    }

    fn redraw(&self, line: &str) {
        let width = terminal_width().saturating_sub(1);
        let mut err = stderr();
        let _ = write!(err, "\r{}", truncate(line, width));
        let _ = err.flush();
    }
}

impl Notifier for TerminalHost {
    fn info(&self, message: &str) {
        self.emit(&self.colors.dim("info:"), message);
    }

    fn warning(&self, message: &str) {
        self.emit(&self.colors.yellow("warning:"), message);
    }

    fn error(&self, message: &str) {
        self.emit(&self.colors.red("error:"), message);
    }
}

impl ConfirmPrompt for TerminalHost {
    async fn confirm(&self, message: &str, accept: &str, decline: &str) -> bool {
        let question = format!("{message} [{accept}/{decline}]");
        if self.assume_yes {
            self.emit(&self.colors.cyan("?"), &format!("{question} {accept}"));
            return true;
        }
        if !stdin().is_tty() {
            self.emit(&self.colors.cyan("?"), &format!("{question} {decline} (no terminal)"));
            return false;
        }

        {
            let mut err = stderr();
            let _ = write!(err, "{} {question} ", self.colors.cyan("?"));
            let _ = err.flush();
        }
        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            stdin().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_accept(&line, accept),
            _ => false,
        }
    }
}

impl ProgressSink for TerminalHost {
    fn begin(&self, title: &str, total: Option<u64>) {
        if let Ok(mut progress) = self.progress.lock() {
            *progress = Some(ProgressState {
                title: title.to_string(),
                total,
                last_percent: None,
            });
        }
        self.redraw(&progress_line(title, 0, total));
    }

    fn advance(&self, done: u64) {
        let line = {
            let Ok(mut progress) = self.progress.lock() else {
                return;
            };
            let Some(state) = progress.as_mut() else {
                return;
            };
            let percent = state
                .total
                .filter(|t| *t > 0)
                .map(|t| done.saturating_mul(100) / t);
            if percent.is_some() && percent == state.last_percent {
                return;
            }
            state.last_percent = percent;
            progress_line(&state.title, done, state.total)
        };
        self.redraw(&line);
    }

    fn finish(&self) {
        let had_progress = self
            .progress
            .lock()
            .map(|mut p| p.take().is_some())
            .unwrap_or(false);
        if had_progress {
            let _ = writeln!(stderr());
        }
    }
}
