// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! A stand-in thriftls for integration tests.
//!
//! Speaks just enough Content-Length framed JSON-RPC for lifecycle tests:
//! answers `initialize` and `shutdown`, exits on `exit`. Flags simulate
//! crashes and servers that ignore shutdown. Formatting flags the client
//! passes (`-indent 4spaces ...`) are collected verbatim.
//! No tokio, like the real server this is a plain blocking loop.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mock thriftls for integration testing.
#[derive(Parser, Debug, Default)]
#[command(name = "mock-thriftls")]
struct Args {
    /// Exit with status 3 after this many milliseconds (simulate crash).
    /// Also read from `MOCK_THRIFTLS_EXIT_AFTER_MS`.
    #[arg(long)]
    exit_after_ms: Option<u64>,

    /// Never answer `shutdown` and ignore `exit`.
    #[arg(long)]
    ignore_shutdown: bool,

    /// Write the working directory and formatting flags to this file on start.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Formatting flags passed by the client.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    format: Vec<String>,
}

/// A JSON-RPC message from the client.
#[derive(Debug, Deserialize)]
struct Incoming {
    id: Option<Value>,
    method: Option<String>,
}

/// A JSON-RPC response.
#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: &'static str,
    id: Value,
    result: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// What the launch looked like, for `--record`.
#[derive(Debug, Serialize)]
struct LaunchRecord {
    cwd: String,
    format: Vec<String>,
}

type Writer = Arc<Mutex<Box<dyn Write + Send>>>;

struct MockServer {
    args: Args,
    writer: Writer,
    shutdown_requested: bool,
}

impl MockServer {
    fn new(args: Args, writer: Writer) -> Self {
        Self {
            args,
            writer,
            shutdown_requested: false,
        }
    }

    /// Runs until `exit` or end of input. Returns the process exit code.
    fn run(&mut self, reader: &mut dyn Read) -> i32 {
        self.send(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": "window/logMessage",
            "params": {
                "type": 3,
                "message": format!("mock-thriftls started with {}", self.args.format.join(" "))
            }
        }));

        let mut buffer = Vec::new();
        let mut temp = [0u8; 4096];

        loop {
            match reader.read(&mut temp) {
                Ok(0) | Err(_) => return 0,
                Ok(n) => buffer.extend_from_slice(&temp[..n]),
            }

            while let Some((message, consumed)) = try_parse_message(&buffer) {
                buffer.drain(..consumed);
                let Ok(incoming) = serde_json::from_str::<Incoming>(&message) else {
                    continue;
                };
                if let Some(code) = self.handle(incoming) {
                    return code;
                }
            }
        }
    }

    /// Handles one message; `Some(code)` ends the loop.
    fn handle(&mut self, incoming: Incoming) -> Option<i32> {
        let method = incoming.method?;
        match (method.as_str(), incoming.id) {
            ("exit", None) if !self.args.ignore_shutdown => {
                Some(if self.shutdown_requested { 0 } else { 1 })
            }
            ("shutdown", Some(_)) if self.args.ignore_shutdown => None,
            ("shutdown", Some(id)) => {
                self.shutdown_requested = true;
                self.reply(id, Value::Null, None);
                None
            }
            ("initialize", Some(id)) => {
                let result = serde_json::json!({
                    "capabilities": { "documentFormattingProvider": true },
                    "serverInfo": { "name": "mock-thriftls" }
                });
                self.reply(id, result, None);
                None
            }
            (other, Some(id)) => {
                let error = RpcError {
                    code: -32601,
                    message: format!("method not found: {other}"),
                };
                self.reply(id, Value::Null, Some(error));
                None
            }
            (_, None) => None,
        }
    }

    fn reply(&self, id: Value, result: Value, error: Option<RpcError>) {
        let response = Response {
            jsonrpc: "2.0",
            id,
            result,
            error,
        };
        if let Ok(value) = serde_json::to_value(&response) {
            self.send(&value);
        }
    }

    fn send(&self, value: &Value) {
        let Ok(json) = serde_json::to_string(value) else {
            return;
        };
        let Ok(mut w) = self.writer.lock() else { return };
        let _ = write!(w, "Content-Length: {}\r\n\r\n{json}", json.len());
        let _ = w.flush();
    }
}

/// Parse a Content-Length framed message from a buffer.
/// Returns the message string and the number of bytes consumed.
fn try_parse_message(buffer: &[u8]) -> Option<(String, usize)> {
    let header_end = buffer.windows(4).position(|w| w == b"\r\n\r\n")?;
    let headers = std::str::from_utf8(&buffer[..header_end]).ok()?;

    let content_length: usize = headers
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse().ok())?;

    let total = header_end + 4 + content_length;
    if buffer.len() < total {
        return None;
    }

    let body = std::str::from_utf8(&buffer[header_end + 4..total]).ok()?;
    Some((body.to_string(), total))
}

fn record_launch(path: &Path, format: &[String]) -> std::io::Result<()> {
    let record = LaunchRecord {
        cwd: std::env::current_dir()?.display().to_string(),
        format: format.to_vec(),
    };
    std::fs::write(path, serde_json::to_vec(&record)?)
}

fn main() {
    let args = Args::parse();
    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "mock-thriftls: starting, flags {:?}", args.format);

    if let Some(path) = &args.record
        && let Err(e) = record_launch(path, &args.format)
    {
        let _ = writeln!(stderr, "mock-thriftls: cannot record launch: {e}");
    }

    let exit_after_ms = args.exit_after_ms.or_else(|| {
        std::env::var("MOCK_THRIFTLS_EXIT_AFTER_MS")
            .ok()?
            .parse()
            .ok()
    });
    if let Some(ms) = exit_after_ms {
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(ms));
            std::process::exit(3);
        });
    }

    let writer: Writer = Arc::new(Mutex::new(Box::new(std::io::stdout())));
    let mut server = MockServer::new(args, writer);
    let code = server.run(&mut std::io::stdin().lock());
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Write adapter for `Arc<Mutex<Vec<u8>>>`.
    struct SharedVecWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedVecWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Ok(mut v) = self.0.lock() {
                v.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn frame(value: &Value) -> Vec<u8> {
        let body = value.to_string();
        format!("Content-Length: {}\r\n\r\n{body}", body.len()).into_bytes()
    }

    fn run_server_with(args: Args, messages: &[Value]) -> (i32, Vec<Value>) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let writer: Writer = Arc::new(Mutex::new(Box::new(SharedVecWriter(buf.clone()))));
        let input: Vec<u8> = messages.iter().flat_map(frame).collect();
        let code = MockServer::new(args, writer).run(&mut Cursor::new(input));

        let mut data = buf.lock().map(|v| v.clone()).unwrap_or_default();
        let mut out = Vec::new();
        while let Some((msg, consumed)) = try_parse_message(&data) {
            if let Ok(v) = serde_json::from_str(&msg) {
                out.push(v);
            }
            data.drain(..consumed);
        }
        (code, out)
    }

    fn shutdown(id: u64) -> Value {
        serde_json::json!({ "jsonrpc": "2.0", "id": id, "method": "shutdown" })
    }

    fn exit() -> Value {
        serde_json::json!({ "jsonrpc": "2.0", "method": "exit" })
    }

    #[test]
    fn test_clean_shutdown_exits_zero() {
        let (code, out) = run_server_with(Args::default(), &[shutdown(1), exit()]);
        assert_eq!(code, 0);
        assert_eq!(out[0]["method"], "window/logMessage");
        assert_eq!(out[1]["id"], 1);
        assert!(out[1]["result"].is_null());
    }

    #[test]
    fn test_exit_without_shutdown_exits_one() {
        let (code, _) = run_server_with(Args::default(), &[exit()]);
        assert_eq!(code, 1);
    }

    #[test]
    fn test_ignore_shutdown_never_answers() {
        let args = Args {
            ignore_shutdown: true,
            ..Args::default()
        };
        let (code, out) = run_server_with(args, &[shutdown(1), exit()]);
        assert_eq!(code, 0, "input ended instead of exit");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_unknown_request_is_method_not_found() {
        let request = serde_json::json!({
            "jsonrpc": "2.0", "id": "x", "method": "textDocument/formatting"
        });
        let (_, out) = run_server_with(Args::default(), &[request]);
        assert_eq!(out[1]["id"], "x");
        assert_eq!(out[1]["error"]["code"], -32601);
    }

    #[test]
    fn test_format_flags_are_collected() {
        let args = Args::try_parse_from([
            "mock-thriftls",
            "--exit-after-ms",
            "50",
            "-indent",
            "4spaces",
            "-align",
            "field",
        ]);
        let args = args.unwrap_or_default();
        assert_eq!(args.exit_after_ms, Some(50));
        assert_eq!(args.format, ["-indent", "4spaces", "-align", "field"]);
    }
}
