// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Shared doubles for unit tests: a minimal HTTP responder and a recording
//! host.

use anyhow::Result;
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::host::{ConfirmPrompt, Notifier, ProgressSink};

/// Serves `body` with `status` to every connection until the runtime stops.
///
/// Returns the base URL (`http://127.0.0.1:<port>/releases`).
pub async fn serve(status: u16, body: Vec<u8>) -> Result<String> {
    let mut response = format!(
        "HTTP/1.1 {status} Test\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(&body);
    serve_raw(response).await
}

/// Writes `response` verbatim to every connection, then closes it.
///
/// Lets tests send responses a well-behaved server never would, such as a
/// body shorter than its `Content-Length`.
pub async fn serve_raw(response: Vec<u8>) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                // Read until the end of the request headers.
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let _ = stream.write_all(&response).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    Ok(format!("http://{addr}/releases"))
}

/// Host double that records every message and answers prompts with a fixed
/// choice.
#[derive(Debug, Default)]
pub struct RecordingHost {
    accept: bool,
    infos: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    progress: Mutex<Vec<u64>>,
}

impl RecordingHost {
    /// A host whose user accepts every prompt.
    pub fn accepting() -> Self {
        Self {
            accept: true,
            ..Self::default()
        }
    }

    /// A host whose user declines every prompt.
    pub fn declining() -> Self {
        Self::default()
    }

    pub fn infos(&self) -> Vec<String> {
        snapshot(&self.infos)
    }

    pub fn warnings(&self) -> Vec<String> {
        snapshot(&self.warnings)
    }

    pub fn errors(&self) -> Vec<String> {
        snapshot(&self.errors)
    }

    pub fn prompts(&self) -> Vec<String> {
        snapshot(&self.prompts)
    }

    pub fn progress(&self) -> Vec<u64> {
        snapshot(&self.progress)
    }
}

fn snapshot<T: Clone>(items: &Mutex<Vec<T>>) -> Vec<T> {
    items.lock().map(|v| v.clone()).unwrap_or_default()
}

fn record<T>(items: &Mutex<Vec<T>>, item: T) {
    if let Ok(mut v) = items.lock() {
        v.push(item);
    }
}

impl Notifier for RecordingHost {
    fn info(&self, message: &str) {
        record(&self.infos, message.to_string());
    }

    fn warning(&self, message: &str) {
        record(&self.warnings, message.to_string());
    }

    fn error(&self, message: &str) {
        record(&self.errors, message.to_string());
    }
}

impl ConfirmPrompt for RecordingHost {
    async fn confirm(&self, message: &str, _accept: &str, _decline: &str) -> bool {
        record(&self.prompts, message.to_string());
        self.accept
    }
}

impl ProgressSink for RecordingHost {
    fn begin(&self, _title: &str, _total: Option<u64>) {}

    fn advance(&self, done: u64) {
        record(&self.progress, done);
    }

    fn finish(&self) {}
}
