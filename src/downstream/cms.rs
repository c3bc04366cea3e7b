//! Context Management Service client (§4.3.1, §6 CMS header protocol).
//!
//! Only the header protocol and fallback expectations are in scope (§1); CMS itself
//! is an external collaborator.

use crate::providers::common::get_or_create_client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CmsResponse {
    #[serde(default)]
    pub optimized_text: Option<String>,
    #[serde(default)]
    pub chunks: Vec<String>,
}

impl CmsResponse {
    /// Design Note (iii): an empty `optimized_text` and empty `chunks` on an
    /// otherwise-successful call is treated as a signal to fall back locally.
    pub fn is_usable(&self) -> bool {
        self.optimized_text.as_ref().is_some_and(|t| !t.is_empty()) || !self.chunks.is_empty()
    }

    /// Uses the most recent chunk when chunked, per §4.3.1.
    pub fn resolved_text(&self) -> Option<String> {
        if let Some(text) = &self.optimized_text {
            if !text.is_empty() {
                return Some(text.clone());
            }
        }
        self.chunks.last().cloned()
    }
}

pub struct CmsClient {
    base_url: String,
    timeout: Duration,
}

impl CmsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        CmsClient { base_url: base_url.into(), timeout }
    }

    pub async fn process(&self, text: &str, model: &str) -> Result<CmsResponse, String> {
        let client = get_or_create_client(&self.base_url);
        let resp = client
            .post(format!("{}/process", self.base_url))
            .header("X-CMS-Mode", "optimize")
            .json(&json!({ "text": text, "model": model }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("CMS responded with {}", resp.status()));
        }
        resp.json::<CmsResponse>().await.map_err(|e| e.to_string())
    }
}

/// Tier classification by context-window utilization, per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmsTier {
    Bypass = 1,
    Validate = 2,
    Optimize = 3,
    Plan = 4,
}

impl CmsTier {
    pub fn for_utilization(utilization_pct: f64) -> Self {
        if utilization_pct < 25.0 {
            CmsTier::Bypass
        } else if utilization_pct < 50.0 {
            CmsTier::Validate
        } else if utilization_pct < 75.0 {
            CmsTier::Optimize
        } else {
            CmsTier::Plan
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries_match_spec_table() {
        assert_eq!(CmsTier::for_utilization(10.0), CmsTier::Bypass);
        assert_eq!(CmsTier::for_utilization(30.0), CmsTier::Validate);
        assert_eq!(CmsTier::for_utilization(60.0), CmsTier::Optimize);
        assert_eq!(CmsTier::for_utilization(90.0), CmsTier::Plan);
    }

    #[test]
    fn empty_response_is_not_usable() {
        let resp = CmsResponse { optimized_text: Some(String::new()), chunks: vec![] };
        assert!(!resp.is_usable());
    }

    #[test]
    fn chunked_response_uses_last_chunk() {
        let resp = CmsResponse { optimized_text: None, chunks: vec!["a".into(), "b".into()] };
        assert_eq!(resp.resolved_text().as_deref(), Some("b"));
    }
}
