//! Client for the semantic-search microservice. Only its HTTP interface is a
//! contract here (§1); this is a thin proxy, not a reimplementation of search.

use crate::providers::common::get_or_create_client;
use serde_json::{json, Value};
use std::time::Duration;

pub struct SemanticSearchClient {
    base_url: String,
    timeout: Duration,
}

impl SemanticSearchClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        SemanticSearchClient { base_url: base_url.into(), timeout }
    }

    pub async fn search(&self, query: &str, top_k: u32) -> Result<Value, String> {
        let client = get_or_create_client(&self.base_url);
        let resp = client
            .post(format!("{}/search", self.base_url))
            .json(&json!({ "query": query, "top_k": top_k }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("semantic-search responded with {}", resp.status()));
        }
        resp.json::<Value>().await.map_err(|e| e.to_string())
    }
}
