//! S1: a request for a plain backend model passes through with no module.

use serde_json::{json, Value};

use crate::common;

#[tokio::test]
async fn non_streaming_passthrough_aggregates_upstream_chunks() {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(upstream.addr, |cfg| cfg.modules = vec![], vec![]).await;

    let response = reqwest::Client::new()
        .post(server.url("/v1/chat/completions"))
        .json(&json!({
            "model": "llama3",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": false
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["content"], "xyz");
    assert_eq!(body["model"], "llama3");
}

#[tokio::test]
async fn streaming_passthrough_forwards_chunks_and_terminator() {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(upstream.addr, |cfg| cfg.modules = vec![], vec![]).await;

    let response = reqwest::Client::new()
        .post(server.url("/v1/chat/completions"))
        .json(&json!({
            "model": "llama3",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    let text = response.text().await.unwrap();
    assert!(text.contains("\"content\":\"x\""));
    assert!(text.contains("\"content\":\"z\""));
    assert!(text.trim_end().ends_with("data: [DONE]"));
}

#[tokio::test]
async fn request_id_is_propagated_from_the_client() {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(upstream.addr, |cfg| cfg.modules = vec![], vec![]).await;

    let response = reqwest::Client::new()
        .get(server.url("/health"))
        .header("x-request-id", "fixed-id-1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "fixed-id-1");
}
