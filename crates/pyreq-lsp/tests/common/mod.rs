//! Common test utilities for integration tests.
//!
//! [`LspClient`] drives the server binary over stdio with framed JSON-RPC.

use serde_json::{Value, json};
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, Stdio};

/// LSP test client for communicating with the server binary.
pub(crate) struct LspClient {
    process: Child,
    reader: BufReader<std::process::ChildStdout>,
}

impl LspClient {
    /// Spawn the pyreq-lsp binary.
    pub(crate) fn spawn() -> Self {
        let mut process = Command::new(env!("CARGO_BIN_EXE_pyreq-lsp"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn pyreq-lsp binary");

        let stdout = process.stdout.take().expect("Failed to capture stdout");

        Self {
            process,
            reader: BufReader::new(stdout),
        }
    }

    /// Send a JSON-RPC message to the server.
    pub(crate) fn send(&mut self, message: &Value) {
        let body = serde_json::to_string(message).unwrap();
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        let stdin = self.process.stdin.as_mut().expect("stdin not captured");
        stdin.write_all(header.as_bytes()).unwrap();
        stdin.write_all(body.as_bytes()).unwrap();
        stdin.flush().unwrap();
    }

    /// Read messages until the response with `expected_id` arrives.
    ///
    /// Notifications and server requests met on the way are skipped.
    pub(crate) fn read_response(&mut self, expected_id: i64) -> Value {
        loop {
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                let bytes_read = self
                    .reader
                    .read_line(&mut line)
                    .expect("Failed to read header");

                // EOF - server closed connection
                assert!(bytes_read != 0, "Server closed connection unexpectedly");

                if line == "\r\n" || line == "\n" {
                    break;
                }

                if let Some(value) = line.to_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().expect("Invalid content length");
                }
            }

            if content_length == 0 {
                continue;
            }

            let mut body = vec![0u8; content_length];
            self.reader.read_exact(&mut body).expect("Failed to read body");

            let message: Value = serde_json::from_slice(&body).unwrap_or_else(|e| {
                panic!("Invalid JSON: {e} in: {:?}", String::from_utf8_lossy(&body))
            });

            if message.get("method").is_some() {
                continue;
            }

            if message.get("id") == Some(&json!(expected_id)) {
                return message;
            }
        }
    }

    /// Send a request and wait for its response.
    pub(crate) fn request(&mut self, id: i64, method: &str, params: Value) -> Value {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        }));
        self.read_response(id)
    }

    /// Initialize the LSP session.
    pub(crate) fn initialize(&mut self) -> Value {
        let response = self.request(
            1,
            "initialize",
            json!({
                "processId": null,
                "capabilities": {},
                "rootUri": "file:///tmp",
                "initializationOptions": {
                    "completion": {"max_items": 10}
                }
            }),
        );

        self.send(&json!({
            "jsonrpc": "2.0",
            "method": "initialized",
            "params": {}
        }));

        response
    }

    /// Open a text document.
    pub(crate) fn did_open(&mut self, uri: &str, language_id: &str, text: &str) {
        self.send(&json!({
            "jsonrpc": "2.0",
            "method": "textDocument/didOpen",
            "params": {
                "textDocument": {
                    "uri": uri,
                    "languageId": language_id,
                    "version": 1,
                    "text": text
                }
            }
        }));
    }

    pub(crate) fn hover(&mut self, id: i64, uri: &str, line: u32, character: u32) -> Value {
        self.request(
            id,
            "textDocument/hover",
            json!({
                "textDocument": {"uri": uri},
                "position": {"line": line, "character": character}
            }),
        )
    }

    pub(crate) fn completion(&mut self, id: i64, uri: &str, line: u32, character: u32) -> Value {
        self.request(
            id,
            "textDocument/completion",
            json!({
                "textDocument": {"uri": uri},
                "position": {"line": line, "character": character}
            }),
        )
    }

    pub(crate) fn code_lens(&mut self, id: i64, uri: &str) -> Value {
        self.request(
            id,
            "textDocument/codeLens",
            json!({ "textDocument": {"uri": uri} }),
        )
    }

    /// Shutdown the server.
    pub(crate) fn shutdown(&mut self) -> Value {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": 999,
            "method": "shutdown"
        }));
        self.read_response(999)
    }
}

impl Drop for LspClient {
    fn drop(&mut self) {
        let _ = self.process.kill();
    }
}
