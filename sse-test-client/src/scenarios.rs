use anyhow::Result;
use colored::*;
use reqwest::StatusCode;
use serde_json::json;
use std::time::{Duration, Instant};

use crate::api_client::ApiClient;
use crate::output::{print_event, TestResult};
use crate::sse_client::Connection;

/// One reconciliation interval plus slack for a cross-node hop.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn test_connection(base_url: &str) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Connection ===".bright_cyan().bold());
    println!("{} Opening stream...", "→".blue());

    let mut sse = Connection::establish(base_url, "Stream".to_string()).await?;

    match sse.wait_for_handshake(DELIVERY_TIMEOUT).await {
        Ok(session_id) => {
            println!("{} Handshake received (sessionId: {})", "✓".green(), session_id);
            Ok(TestResult::pass("connection", start.elapsed()))
        }
        Err(e) => {
            println!("{} No handshake: {}", "✗".red(), e);
            Ok(TestResult::fail("connection", e.to_string(), start.elapsed()))
        }
    }
}

pub async fn test_relay_roundtrip(
    base_url: &str,
    post_url: &str,
    api_client: &ApiClient,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Relay Roundtrip ===".bright_cyan().bold());
    if post_url != base_url {
        println!(
            "{} Stream on {}, posting through {}",
            "→".blue(),
            base_url,
            post_url
        );
    }

    let mut sse = Connection::establish(base_url, "Stream".to_string()).await?;
    let session_id = sse.wait_for_handshake(DELIVERY_TIMEOUT).await?;
    println!("{} Stream open (sessionId: {})", "✓".green(), session_id);

    let marker = uuid::Uuid::new_v4().to_string();
    let payload = json!({ "foo": 1, "marker": marker });

    println!("{} Posting message...", "→".blue());
    let posted = api_client.post_message(Some(&session_id), &payload).await?;

    if posted.status != StatusCode::OK || posted.body != json!({"success": true, "queued": true}) {
        let message = format!("Unexpected response {}: {}", posted.status, posted.body);
        println!("{} {}", "✗".red(), message);
        return Ok(TestResult::fail("relay_roundtrip", message, start.elapsed()));
    }
    println!("{} Message queued", "✓".green());

    println!("{} Waiting for the stream to emit it...", "→".blue());
    match sse
        .wait_for(DELIVERY_TIMEOUT, |data| data["marker"] == marker.as_str())
        .await
    {
        Ok(event) => {
            print_event(&sse.label, &event);
            if event.data == payload {
                println!("{} Payload relayed verbatim", "✓".green());
                Ok(TestResult::pass("relay_roundtrip", start.elapsed()))
            } else {
                Ok(TestResult::fail(
                    "relay_roundtrip",
                    format!("Expected {}, got {}", payload, event.data),
                    start.elapsed(),
                ))
            }
        }
        Err(e) => {
            println!("{} Message never arrived: {}", "✗".red(), e);
            Ok(TestResult::fail(
                "relay_roundtrip",
                format!("Timeout: {}", e),
                start.elapsed(),
            ))
        }
    }
}

pub async fn test_unknown_session(api_client: &ApiClient) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Unknown Session ===".bright_cyan().bold());

    let session_id = uuid::Uuid::new_v4().to_string();
    let posted = api_client
        .post_message(Some(&session_id), &json!({"foo": 1}))
        .await?;

    expect_rejection(
        "unknown_session",
        posted.status,
        &posted.body,
        "No active session for the provided sessionId",
        start,
    )
}

pub async fn test_missing_session_id(api_client: &ApiClient) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Missing sessionId ===".bright_cyan().bold());

    let posted = api_client.post_message(None, &json!({"foo": 1})).await?;

    expect_rejection(
        "missing_session_id",
        posted.status,
        &posted.body,
        "Missing sessionId parameter",
        start,
    )
}

fn expect_rejection(
    scenario: &str,
    status: StatusCode,
    body: &serde_json::Value,
    expected_error: &str,
    start: Instant,
) -> Result<TestResult> {
    if status == StatusCode::BAD_REQUEST && body["error"] == expected_error {
        println!("{} Rejected with 400: {}", "✓".green(), expected_error);
        Ok(TestResult::pass(scenario, start.elapsed()))
    } else {
        let message = format!("Expected 400 \"{}\", got {}: {}", expected_error, status, body);
        println!("{} {}", "✗".red(), message);
        Ok(TestResult::fail(scenario, message, start.elapsed()))
    }
}
