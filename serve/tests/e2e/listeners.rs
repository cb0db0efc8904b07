//! S4: a sideband listener attached before the first emission observes the
//! same sequence as the client.

use std::sync::Arc;

use serde_json::json;

use crate::common::{self, SlowModule};

#[tokio::test]
async fn listener_sees_the_same_sequence_as_the_client() {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(
        upstream.addr,
        |cfg| cfg.modules = vec![],
        vec![Arc::new(SlowModule)],
    )
    .await;

    let completions_url = server.url("/v1/chat/completions");
    let post = tokio::spawn(async move {
        reqwest::Client::new()
            .post(completions_url)
            .json(&json!({
                "model": "slow-llama3",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": true
            }))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap()
    });

    // The module sleeps before emitting, so the listener attaches first.
    let session_id = common::wait_for_session(&server.state).await;
    let listener_text = reqwest::get(server.url(&format!("/events/{session_id}")))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let client_text = post.await.unwrap();
    assert!(client_text.contains("EARLY"));
    assert!(client_text.contains("\"content\":\"x\""));
    assert_eq!(listener_text, client_text);
}

#[tokio::test]
async fn unknown_session_listener_is_a_404() {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(upstream.addr, |cfg| cfg.modules = vec![], vec![]).await;

    let response = reqwest::get(server.url("/events/not-a-session")).await.unwrap();
    assert_eq!(response.status(), 404);
    let text = response.text().await.unwrap();
    assert!(text.contains("Event not found"));
}

#[tokio::test]
async fn session_unregisters_after_the_terminator() {
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
    let _ = response.text().await.unwrap();

    // The producer task unregisters after emitting the terminator.
    for _ in 0..100 {
        if server.state.sessions.is_empty() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("session still registered after stream end");
}
