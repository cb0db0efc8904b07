//! S6 plus protocol and auth errors.

use serde_json::{json, Value};

use crate::common;

#[tokio::test]
async fn unknown_model_is_a_404() {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(upstream.addr, |cfg| cfg.modules = vec![], vec![]).await;

    let response = reqwest::Client::new()
        .post(server.url("/v1/chat/completions"))
        .json(&json!({
            "model": "zzz-unknown",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let text = response.text().await.unwrap();
    assert!(text.contains("Unknown model"));
}

#[tokio::test]
async fn malformed_json_is_a_400() {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(upstream.addr, |cfg| cfg.modules = vec![], vec![]).await;

    let response = reqwest::Client::new()
        .post(server.url("/v1/chat/completions"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Invalid JSON"));
}

#[tokio::test]
async fn auth_rejects_missing_and_wrong_tokens() {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(
        upstream.addr,
        |cfg| cfg.api_keys = vec!["sk-test".to_string()],
        vec![],
    )
    .await;

    let client = reqwest::Client::new();
    let response = client.get(server.url("/v1/models")).send().await.unwrap();
    assert_eq!(response.status(), 403);

    let response = client
        .get(server.url("/v1/models"))
        .header("authorization", "Bearer sk-wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = client
        .get(server.url("/v1/models"))
        .header("authorization", "Bearer sk-test")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Bare tokens are accepted too; health stays open.
    let response = client
        .get(server.url("/v1/models"))
        .header("authorization", "sk-test")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn empty_key_set_disables_auth() {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(upstream.addr, |cfg| cfg.api_keys = vec![], vec![]).await;

    let response = reqwest::get(server.url("/v1/models")).await.unwrap();
    assert_eq!(response.status(), 200);
}
