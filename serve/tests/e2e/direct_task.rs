//! S2: UI auxiliary prompts bypass the module and hit the backend once,
//! non-streamed.

use serde_json::{json, Value};

use crate::common;

#[tokio::test]
async fn title_generation_short_circuits_the_module() {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(
        upstream.addr,
        |cfg| cfg.modules = vec!["rcn".to_string()],
        vec![],
    )
    .await;

    let response = reqwest::Client::new()
        .post(server.url("/v1/chat/completions"))
        .json(&json!({
            "model": "rcn-llama3",
            "messages": [
                {"role": "user", "content": "Generate a concise, 3-5 word title for this chat"}
            ],
            "stream": false
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    // The upstream response comes back verbatim, not re-aggregated.
    assert_eq!(body["id"], "cmpl-up");
    assert_eq!(body["choices"][0]["message"]["content"], "upstream says hi");

    let requests = upstream.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["stream"], false);
}
