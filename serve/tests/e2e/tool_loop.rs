//! S5: a local tool call is assembled from split deltas, executed, recorded
//! in the chat, and the upstream call re-issued.

use serde_json::{json, Value};

use crate::common;

#[tokio::test]
async fn local_tool_executes_and_the_loop_reissues_upstream() {
    let upstream = common::spawn_mock_upstream(true).await;
    let server = common::spawn_boost(
        upstream.addr,
        |cfg| cfg.modules = vec!["autotemp".to_string()],
        vec![],
    )
    .await;

    let response = reqwest::Client::new()
        .post(server.url("/v1/chat/completions"))
        .json(&json!({
            "model": "autotemp-llama3",
            "messages": [{"role": "user", "content": "write a haiku"}],
            "stream": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let text = response.text().await.unwrap();

    // The tool's status and the re-issued stream both reach the client.
    assert!(text.contains("Temperature 0.2"));
    assert!(text.contains("\"content\":\"x\""));
    assert!(text.trim_end().ends_with("data: [DONE]"));

    let requests = upstream.requests.lock().unwrap();
    assert_eq!(requests.len(), 2, "tool call triggers one re-issue");

    // First call advertises the local tool under its marked name.
    let tools = requests[0]["tools"].as_array().unwrap();
    assert!(tools
        .iter()
        .any(|t| t["function"]["name"] == "boost_lt_set_temperature"));

    // The re-issued call carries the assembled call and the tool result.
    let messages = requests[1]["messages"].as_array().unwrap();
    let assistant = messages
        .iter()
        .find(|m| m["role"] == "assistant" && m["tool_calls"].is_array())
        .expect("assistant tool-call turn recorded");
    let call = &assistant["tool_calls"][0];
    assert_eq!(call["id"], "call_1");
    assert_eq!(call["function"]["name"], "boost_lt_set_temperature");
    assert_eq!(
        call["function"]["arguments"],
        "{\"temperature\": 0.2, \"reason\": \"testing\"}"
    );

    let tool_turn = messages
        .iter()
        .find(|m| m["role"] == "tool")
        .expect("tool result turn recorded");
    assert_eq!(tool_turn["tool_call_id"], "call_1");
    assert!(tool_turn["content"]
        .as_str()
        .unwrap()
        .contains("Temperature is now set to 0.2"));

    // The adjusted parameter is forwarded on the re-issue.
    assert_eq!(requests[1]["temperature"], 0.2);
}

#[tokio::test]
async fn remote_tool_calls_are_forwarded_to_the_client() {
    let upstream = common::spawn_mock_upstream(true).await;
    // No autotemp module: the streamed tool call has no local registration,
    // so the assembled call is forwarded and the stream ends.
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
    let text = response.text().await.unwrap();

    let chunk = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .filter_map(|payload| serde_json::from_str::<Value>(payload).ok())
        .find(|chunk| chunk["choices"][0]["delta"]["tool_calls"].is_array())
        .expect("forwarded tool-call chunk");
    let call = &chunk["choices"][0]["delta"]["tool_calls"][0];
    assert_eq!(call["function"]["name"], "boost_lt_set_temperature");
    assert_eq!(
        call["function"]["arguments"],
        "{\"temperature\": 0.2, \"reason\": \"testing\"}"
    );

    let requests = upstream.requests.lock().unwrap();
    assert_eq!(requests.len(), 1, "no re-issue for remote tools");
}
