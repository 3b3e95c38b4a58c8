//! End-to-end tests of the transport loop.
//!
//! A scripted session is fed through both execution models using in-memory
//! streams; the output must be identical line for line.

use std::io::Write;

use serde_json::{json, Value};
use tempfile::NamedTempFile;
use umcp::mcp::{BlockingTransport, LineTransport, McpServer};
use umcp::servers::{AsyncCalculatorServer, CalculatorServer};

const SESSION: &str = concat!(
    r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
    "\n",
    r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
    "\n",
    "\n",
    "this is not json\n",
    r#"{"jsonrpc":"2.0","id":2}"#,
    "\n",
    r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"multiply_async","arguments":{"a":6,"b":7}}}"#,
    "\n",
    r#"{"jsonrpc":"2.0","id":"four","method":"tools/call","params":{"name":"add","arguments":{"a":1}}}"#,
    "\n",
    r#"{"jsonrpc":"2.0","id":null,"method":"tools/call","params":{"name":"add","arguments":{"a":1,"b":2}}}"#,
    "\n",
    r#"{"jsonrpc":"2.0","id":5,"method":"prompts/get","params":{"name":"dialog_async","arguments":{"persona":"pirate"}}}"#,
    "\n",
);

fn parse_lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8(output.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

async fn run_cooperative(input: &str) -> Vec<Value> {
    run_cooperative_bytes(input.as_bytes()).await
}

async fn run_cooperative_bytes(input: &[u8]) -> Vec<Value> {
    let mut server = McpServer::new(AsyncCalculatorServer).unwrap();
    let mut transport = LineTransport::new(input, Vec::new());
    server.serve(&mut transport).await.unwrap();
    parse_lines(&transport.into_writer())
}

fn run_blocking(input: &str) -> Vec<Value> {
    run_blocking_bytes(input.as_bytes())
}

fn run_blocking_bytes(input: &[u8]) -> Vec<Value> {
    let mut server = McpServer::new(AsyncCalculatorServer).unwrap();
    let mut transport = BlockingTransport::new(input, Vec::new());
    server.serve_blocking(&mut transport).unwrap();
    parse_lines(&transport.into_writer())
}

#[tokio::test]
async fn test_cooperative_session() {
    let replies = run_cooperative(SESSION).await;

    // initialize, parse error, invalid request, two calls, one prompt
    assert_eq!(replies.len(), 6);

    assert_eq!(replies[0]["id"], 1);
    assert_eq!(replies[0]["result"]["serverInfo"]["name"], "AsyncCalculatorServer");

    assert_eq!(replies[1]["id"], Value::Null);
    assert_eq!(replies[1]["error"]["code"], -32700);

    assert_eq!(replies[2]["id"], 2);
    assert_eq!(replies[2]["error"]["code"], -32600);

    let text = replies[3]["result"]["content"][0]["text"].as_str().unwrap();
    let computed: Value = serde_json::from_str(text).unwrap();
    assert_eq!(computed["result"], 42.0);
    assert_eq!(computed["async"], true);

    assert_eq!(replies[4]["id"], "four");
    assert_eq!(replies[4]["error"]["code"], -32602);
    assert_eq!(replies[4]["error"]["data"], json!({"argument": "b"}));

    assert_eq!(replies[5]["id"], 5);
    assert_eq!(
        replies[5]["result"]["messages"][0]["content"]["text"],
        "You are acting as pirate."
    );
    assert_eq!(replies[5]["result"]["categories"], json!(["conversation", "test"]));
}

#[test]
fn test_execution_models_agree() {
    let cooperative = tokio_test::block_on(run_cooperative(SESSION));
    let blocking = run_blocking(SESSION);
    assert_eq!(cooperative, blocking);
}

#[test]
fn test_requests_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{"jsonrpc":"2.0","id":1,"method":"initialize"}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{{"name":"divide","arguments":{{"a":1,"b":0}}}}}}"#
    )
    .unwrap();

    let reader = std::io::BufReader::new(std::fs::File::open(file.path()).unwrap());
    let mut server = McpServer::new(CalculatorServer).unwrap();
    let mut transport = BlockingTransport::new(reader, Vec::new());
    server.serve_blocking(&mut transport).unwrap();

    let replies = parse_lines(&transport.into_writer());
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[1]["result"]["isError"], true);
    assert_eq!(
        replies[1]["result"]["content"][0]["text"],
        "Division by zero is not allowed"
    );
}

#[test]
fn test_blocking_end_of_input_is_clean() {
    let mut server = McpServer::new(CalculatorServer).unwrap();
    let mut transport = BlockingTransport::new(&b""[..], Vec::new());
    server.serve_blocking(&mut transport).unwrap();
    assert!(transport.into_writer().is_empty());
}

const NOT_UTF8: &[u8] = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\"}\n\
\xff\xfe garbage\n\
{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n";

fn assert_survives_bad_bytes(replies: &[Value]) {
    assert_eq!(replies.len(), 3);
    assert_eq!(replies[1]["id"], Value::Null);
    assert_eq!(replies[1]["error"]["code"], -32700);
    assert_eq!(replies[2]["id"], 2);
    assert_eq!(replies[2]["result"], json!({}));
}

#[tokio::test]
async fn test_invalid_utf8_line_cooperative() {
    assert_survives_bad_bytes(&run_cooperative_bytes(NOT_UTF8).await);
}

#[test]
fn test_invalid_utf8_line_blocking() {
    assert_survives_bad_bytes(&run_blocking_bytes(NOT_UTF8));
}

#[test]
fn test_large_id_echoed_unchanged() {
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":18446744073709551615,"method":"initialize"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":1.5,"method":"ping"}"#,
        "\n",
    );
    let output = {
        let mut server = McpServer::new(CalculatorServer).unwrap();
        let mut transport = BlockingTransport::new(input.as_bytes(), Vec::new());
        server.serve_blocking(&mut transport).unwrap();
        String::from_utf8(transport.into_writer()).unwrap()
    };
    let lines: Vec<_> = output.lines().collect();
    assert!(lines[0].contains(r#""id":18446744073709551615"#));
    assert!(lines[1].contains(r#""id":1.5"#));
}
