//! Integration tests for the bundled demo services.

use serde_json::{json, Value};
use umcp::mcp::{McpServer, Service};
use umcp::servers::{AsyncCalculatorServer, CalculatorServer, MovieServer};

async fn ready<S: Service>(service: S) -> McpServer<S> {
    let mut server = McpServer::new(service).unwrap();
    server
        .handle_line(r#"{"jsonrpc":"2.0","id":0,"method":"initialize"}"#)
        .await
        .unwrap();
    server
}

async fn result<S: Service>(server: &mut McpServer<S>, method: &str, params: Value) -> Value {
    let line = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params});
    let reply = server.handle_line(&line.to_string()).await.unwrap();
    reply
        .result()
        .cloned()
        .unwrap_or_else(|| panic!("{method} failed: {:?}", reply.error()))
}

async fn tool_json<S: Service>(server: &mut McpServer<S>, name: &str, arguments: Value) -> Value {
    let result = result(server, "tools/call", json!({"name": name, "arguments": arguments})).await;
    assert_eq!(result["isError"], false, "{name}: {result}");
    serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap()
}

// =============================================================================
// Calculator
// =============================================================================

#[tokio::test]
async fn test_calculator_tools_and_prompts() {
    let mut server = ready(CalculatorServer).await;
    assert_eq!(
        server.tools().keys().collect::<Vec<_>>(),
        ["add", "subtract", "multiply", "divide"]
    );

    let sum = tool_json(&mut server, "add", json!({"a": 2.5, "b": 4})).await;
    assert_eq!(sum["result"], 6.5);
    assert_eq!(sum["operation"], "addition");

    let listing = result(&mut server, "prompts/list", json!({})).await;
    assert_eq!(listing["prompts"][0]["categories"], json!(["code", "review"]));
    assert_eq!(
        listing["prompts"][1]["categories"],
        json!(["summary", "documentation"])
    );

    let review = result(
        &mut server,
        "prompts/get",
        json!({"name": "code_review", "arguments": {"filename": "main.rs"}}),
    )
    .await;
    let text = review["messages"][0]["content"]["text"].as_str().unwrap();
    assert!(text.contains("'main.rs'"));
    assert!(text.contains("approximately 0 known issues"));
}

// =============================================================================
// Async calculator
// =============================================================================

#[tokio::test]
async fn test_async_calculator_factorial_limits() {
    let mut server = ready(AsyncCalculatorServer).await;

    let fact = tool_json(&mut server, "factorial_async", json!({"n": 10})).await;
    assert_eq!(fact["result"], 3_628_800);

    let reply = result(&mut server, "tools/call", json!({"name": "factorial_async", "arguments": {"n": 21}})).await;
    assert_eq!(reply["isError"], true);

    let reply = result(&mut server, "tools/call", json!({"name": "factorial_async", "arguments": {"n": -1}})).await;
    assert_eq!(reply["isError"], true);
}

#[tokio::test]
async fn test_async_calculator_huge_factorial_rejected_promptly() {
    let mut server = ready(AsyncCalculatorServer).await;
    let call = result(
        &mut server,
        "tools/call",
        json!({"name": "factorial_async", "arguments": {"n": 10_000_000_000_u64}}),
    );
    let reply = tokio::time::timeout(std::time::Duration::from_secs(1), call)
        .await
        .expect("over-limit input must be rejected before any work");
    assert_eq!(reply["isError"], true);
    assert_eq!(
        reply["content"][0]["text"],
        "Number too large for factorial calculation"
    );
}

#[tokio::test]
async fn test_async_calculator_power() {
    let mut server = ready(AsyncCalculatorServer).await;
    let power = tool_json(&mut server, "power_async", json!({"base": 2, "exponent": 10})).await;
    assert_eq!(power["result"], 1024.0);
    assert_eq!(power["inputs"], json!({"base": 2.0, "exponent": 10.0}));
}

// =============================================================================
// Movies
// =============================================================================

#[tokio::test]
async fn test_movie_search_with_optional_filters() {
    let mut server = ready(MovieServer::new()).await;

    let all = tool_json(&mut server, "search_movies", json!({})).await;
    assert_eq!(all.as_array().unwrap().len(), 4);

    let cheap = tool_json(&mut server, "search_movies", json!({"max_price": 12.0})).await;
    assert_eq!(cheap[0]["title"], "The Matrix Resurrections");

    let schema = &server.tools()["search_movies"].input_schema;
    assert!(schema.required().is_empty());
}

#[tokio::test]
async fn test_movie_booking_flow() {
    let mut server = ready(MovieServer::new()).await;

    let booking = tool_json(
        &mut server,
        "book_ticket_async",
        json!({
            "movie_id": 1,
            "show_time": "20:30",
            "num_tickets": 3,
            "customer_email": "viewer@example.com"
        }),
    )
    .await;
    assert_eq!(booking["movieTitle"], "Avengers: Endgame");
    let booking_id = booking["bookingId"].as_str().unwrap().to_string();

    let fetched = tool_json(&mut server, "get_booking_async", json!({"booking_id": booking_id})).await;
    assert_eq!(fetched, booking);

    let missing = result(
        &mut server,
        "tools/call",
        json!({"name": "get_booking_async", "arguments": {"booking_id": "BK0"}}),
    )
    .await;
    assert_eq!(missing["isError"], true);
    assert_eq!(missing["content"][0]["text"], "Booking BK0 not found");
}

#[tokio::test]
async fn test_movie_concurrent_search() {
    let mut server = ready(MovieServer::new()).await;
    let found = tool_json(&mut server, "search_movies_async", json!({"query": " Dune "})).await;
    assert_eq!(found["query"], "dune");
    assert_eq!(found["localMatches"][0]["id"], 3);
    assert_eq!(found["totalResults"], 3);
}

#[tokio::test]
async fn test_movie_night_envelope() {
    let mut server = ready(MovieServer::new()).await;
    let prompt = result(
        &mut server,
        "prompts/get",
        json!({"name": "movie_night", "arguments": {"guests": 4}}),
    )
    .await;
    assert_eq!(prompt["metadata"], json!({"catalogueSize": 4}));
    assert_eq!(prompt["messages"].as_array().unwrap().len(), 2);
    assert_eq!(prompt["categories"], json!(["entertainment", "planning"]));
    assert!(prompt["messages"][1]["content"]["text"]
        .as_str()
        .unwrap()
        .contains("4 people who enjoy action"));
}
