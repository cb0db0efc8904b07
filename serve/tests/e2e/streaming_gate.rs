//! S3: the intermediate output gate decides whether module statuses reach
//! the client; final-stream chunks always do.

use std::sync::Arc;

use serde_json::json;

use crate::common::{self, StatusesModule};

async fn run_statuses(intermediate_output: bool) -> String {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(
        upstream.addr,
        move |cfg| {
            cfg.modules = vec![];
            cfg.intermediate_output = intermediate_output;
        },
        vec![Arc::new(StatusesModule)],
    )
    .await;

    let response = reqwest::Client::new()
        .post(server.url("/v1/chat/completions"))
        .json(&json!({
            "model": "st-llama3",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    response.text().await.unwrap()
}

#[tokio::test]
async fn gate_off_forwards_only_the_final_stream() {
    let text = run_statuses(false).await;
    assert!(!text.contains("STATUS_A"));
    assert!(!text.contains("STATUS_B"));
    assert!(text.contains("\"content\":\"x\""));
    assert!(text.contains("\"content\":\"y\""));
    assert!(text.contains("\"content\":\"z\""));
    assert!(text.trim_end().ends_with("data: [DONE]"));
}

#[tokio::test]
async fn gate_on_forwards_statuses_before_the_final_stream() {
    let text = run_statuses(true).await;
    let status_a = text.find("STATUS_A").expect("status A present");
    let status_b = text.find("STATUS_B").expect("status B present");
    let first_token = text.find("\"content\":\"x\"").expect("final stream present");
    assert!(status_a < status_b);
    assert!(status_b < first_token);
    assert!(text.trim_end().ends_with("data: [DONE]"));
}
