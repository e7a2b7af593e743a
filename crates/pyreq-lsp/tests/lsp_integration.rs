//! Integration tests for the pyreq-lsp binary.
//!
//! These tests spawn the server and speak JSON-RPC to it. None of the
//! requests below reach the package index.

mod common;

use common::LspClient;
use serde_json::json;

const REQUIREMENTS_URI: &str = "file:///project/requirements.txt";

#[test]
fn test_initialize_response() {
    let mut client = LspClient::spawn();
    let response = client.initialize();

    let result = &response["result"];
    assert_eq!(result["serverInfo"]["name"], "pyreq-lsp");
    assert!(result["serverInfo"]["version"].is_string());

    let capabilities = &result["capabilities"];
    assert_eq!(capabilities["hoverProvider"], json!(true));
    assert!(capabilities["codeLensProvider"].is_object());
    assert_eq!(capabilities["textDocumentSync"], json!(1));

    let triggers = capabilities["completionProvider"]["triggerCharacters"]
        .as_array()
        .expect("trigger characters");
    assert!(triggers.contains(&json!(">")));
    assert!(triggers.contains(&json!(",")));
}

#[test]
fn test_shutdown_response() {
    let mut client = LspClient::spawn();
    client.initialize();

    let response = client.shutdown();
    assert_eq!(response["result"], json!(null));
    assert_eq!(response["id"], json!(999));
}

#[test]
fn test_hover_outside_requirement() {
    let mut client = LspClient::spawn();
    client.initialize();
    client.did_open(REQUIREMENTS_URI, "pip-requirements", "# pinned\n-r base.txt\n");

    let hover = client.hover(10, REQUIREMENTS_URI, 1, 3);
    assert!(hover.get("error").is_none());
    assert_eq!(hover["result"], json!(null));
}

#[test]
fn test_completion_inside_name() {
    let mut client = LspClient::spawn();
    client.initialize();
    client.did_open(REQUIREMENTS_URI, "pip-requirements", "django>=4.2\n");

    let completion = client.completion(20, REQUIREMENTS_URI, 0, 3);
    assert!(completion.get("error").is_none());
    assert_eq!(completion["result"], json!(null));
}

#[test]
fn test_code_lens_without_requirements() {
    let mut client = LspClient::spawn();
    client.initialize();
    client.did_open(
        "file:///project/pyproject.toml",
        "toml",
        "[project]\nname = \"demo\"\ndependencies = []\n",
    );

    let lenses = client.code_lens(30, "file:///project/pyproject.toml");
    assert_eq!(lenses["result"], json!([]));
}

#[test]
fn test_malformed_pyproject() {
    let mut client = LspClient::spawn();
    client.initialize();
    client.did_open(
        "file:///project/pyproject.toml",
        "toml",
        "this is not valid toml [[[",
    );

    let lenses = client.code_lens(40, "file:///project/pyproject.toml");
    assert!(lenses.get("error").is_none());
    assert_eq!(lenses["result"], json!([]));
}

#[test]
fn test_unsupported_document() {
    let mut client = LspClient::spawn();
    client.initialize();
    client.did_open("file:///project/Cargo.toml", "toml", "[dependencies]\nserde = \"1\"\n");

    let hover = client.hover(50, "file:///project/Cargo.toml", 1, 2);
    assert_eq!(hover["result"], json!(null));
    let lenses = client.code_lens(51, "file:///project/Cargo.toml");
    assert_eq!(lenses["result"], json!([]));
}

#[test]
fn test_jsonrpc_error_on_invalid_method() {
    let mut client = LspClient::spawn();
    client.initialize();

    let response = client.request(100, "unknownMethod/doesNotExist", json!({}));
    assert_eq!(response["error"]["code"], json!(-32601)); // Method not found
}
