//! Integration tests for the HTTP surface.
//!
//! Spawns a real server on a unique port per test and exercises it via
//! `reqwest`, the way a client deployment would.
//!
//! All tests require the `web-api` Cargo feature.

#![cfg(feature = "web-api")]

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lexroute::adapters::{EchoGenerator, RetrievedDocument, StaticRetriever};
use lexroute::feedback::{FeedbackStore, LogSink};
use lexroute::web_api::{start_server, ServerConfig};
use lexroute::Orchestrator;
use serde_json::{json, Value};

/// Unique per-test port allocation; starts high to avoid common services.
static NEXT_PORT: AtomicU16 = AtomicU16::new(38700);

async fn spawn_test_server() -> String {
    let port = NEXT_PORT.fetch_add(1, Ordering::SeqCst);

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(StaticRetriever::new(vec![RetrievedDocument {
            id: "bail-basics".to_string(),
            text: "Bail is the conditional release of an accused person pending trial."
                .to_string(),
            score: 0.8,
            domain: None,
        }])),
        Arc::new(EchoGenerator::new()),
    ));
    let feedback = Arc::new(FeedbackStore::new(Arc::new(LogSink), 16));

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port,
        max_request_size: 64 * 1024,
    };

    tokio::spawn(async move {
        let _ = start_server(config, orchestrator, feedback).await;
    });

    // Give the listener a moment to bind.
    tokio::time::sleep(Duration::from_millis(100)).await;

    format!("http://127.0.0.1:{port}")
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let base = spawn_test_server().await;
    let response = reqwest::get(format!("{base}/health")).await.expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn ask_endpoint_serves_an_answer() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/v1/ask"))
        .json(&json!({"question": "Is bail allowed here", "session_id": "web-1"}))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.expect("json body");
    assert!(body["answer"].as_str().is_some_and(|a| !a.is_empty()));
    assert_eq!(body["tier"], "simple");
    assert_eq!(body["degraded"], false);
    assert!(body["latency_seconds"].as_f64().is_some());
    assert!(body["stage_timings"]["generation"].as_f64().is_some());
}

#[tokio::test]
async fn ask_endpoint_rejects_blank_questions() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/v1/ask"))
        .json(&json!({"question": "   "}))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repeated_ask_is_served_from_cache() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    let ask = json!({"question": "Is bail allowed here"});
    let first: Value = client
        .post(format!("{base}/api/v1/ask"))
        .json(&ask)
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(first["from_cache"], false);

    let second: Value = client
        .post(format!("{base}/api/v1/ask"))
        .json(&ask)
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(second["from_cache"], true);
    assert_eq!(second["answer"], first["answer"]);
}

#[tokio::test]
async fn feedback_endpoint_accepts_and_validates_ratings() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    let accepted = client
        .post(format!("{base}/api/v1/feedback"))
        .json(&json!({
            "question": "Is bail allowed here",
            "answer": "Bail is the conditional release...",
            "rating": 4,
            "comment": "helpful"
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(accepted.status(), reqwest::StatusCode::ACCEPTED);

    let rejected = client
        .post(format!("{base}/api/v1/feedback"))
        .json(&json!({"question": "q", "answer": "a", "rating": 11}))
        .send()
        .await
        .expect("request");
    assert_eq!(rejected.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn report_endpoint_serves_aggregates() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    // Generate at least one sample first.
    let _ = client
        .post(format!("{base}/api/v1/ask"))
        .json(&json!({"question": "Is bail allowed here"}))
        .send()
        .await
        .expect("request");

    let report: Value = reqwest::get(format!("{base}/api/v1/report"))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert!(report["total_requests"].as_u64().is_some());
    assert!(report["cache_hit_rate"].as_f64().is_some());
    assert!(report["tiers"].is_array());
}
