//! Catalog shape: module cross-product, base models, server-side filter.

use serde_json::Value;

use crate::common;

async fn model_ids(server: &common::TestServer) -> Vec<String> {
    let body: Value = reqwest::get(server.url("/v1/models"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["object"], "list");
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn catalog_is_the_module_cross_product() {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(
        upstream.addr,
        |cfg| cfg.modules = vec!["rcn".to_string(), "g1".to_string()],
        vec![],
    )
    .await;

    let ids = model_ids(&server).await;
    assert_eq!(ids, vec!["rcn-llama3", "g1-llama3"]);
}

#[tokio::test]
async fn base_models_are_included_when_enabled() {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(
        upstream.addr,
        |cfg| {
            cfg.modules = vec!["rcn".to_string()];
            cfg.serve_base_models = true;
        },
        vec![],
    )
    .await;

    let ids = model_ids(&server).await;
    assert!(ids.contains(&"llama3".to_string()));
    assert!(ids.contains(&"rcn-llama3".to_string()));
}

#[tokio::test]
async fn model_filter_narrows_the_catalog() {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(
        upstream.addr,
        |cfg| {
            cfg.modules = vec!["rcn".to_string(), "g1".to_string()];
            cfg.model_filter = config::env::parse_config_dict("id.contains=rcn");
        },
        vec![],
    )
    .await;

    let ids = model_ids(&server).await;
    assert_eq!(ids, vec!["rcn-llama3"]);
}

#[tokio::test]
async fn synthetic_entries_carry_names() {
    let upstream = common::spawn_mock_upstream(false).await;
    let server = common::spawn_boost(
        upstream.addr,
        |cfg| cfg.modules = vec!["rcn".to_string()],
        vec![],
    )
    .await;

    let body: Value = reqwest::get(server.url("/v1/models"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entry = &body["data"][0];
    assert_eq!(entry["id"], "rcn-llama3");
    assert_eq!(entry["name"], "rcn llama3");
    assert_eq!(entry["owned_by"], "library");
}
