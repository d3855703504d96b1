// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Remote key node over HTTPS.
//!
//! `POST <base>/share` with a JSON [`ShareRequest`]; a 2xx answer carries a
//! JSON [`ShareResponse`]. A 4xx answer is the node refusing the claim, with
//! an optional `{"error": "..."}` body. Anything else is treated as transient.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use super::node::{KeyNode, NodeError, ShareRequest, ShareResponse};
use crate::config::ConfigError;

#[derive(Deserialize)]
struct NodeErrorBody {
    error: String,
}

/// Key node reached through its HTTP endpoint.
#[derive(Clone)]
pub struct HttpKeyNode {
    index: u32,
    share_url: Url,
    client: reqwest::Client,
}

impl HttpKeyNode {
    /// Create a node client; `base_url` is the node's API root.
    pub fn new(index: u32, base_url: &Url, client: reqwest::Client) -> Result<Self, ConfigError> {
        let mut base = base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let share_url = base.join("share").map_err(|e| ConfigError::Invalid {
            name: "key node url",
            reason: e.to_string(),
        })?;

        Ok(Self {
            index,
            share_url,
            client,
        })
    }

    pub fn share_url(&self) -> &Url {
        &self.share_url
    }
}

/// Build one node per URL; node indices follow list order starting at 1.
pub fn http_nodes(urls: &[Url], request_timeout: Duration) -> Result<Vec<Arc<dyn KeyNode>>, ConfigError> {
    let client = reqwest::Client::builder()
        .timeout(request_timeout)
        .build()
        .map_err(|e| ConfigError::Invalid {
            name: "http client",
            reason: e.to_string(),
        })?;

    urls.iter()
        .enumerate()
        .map(|(i, url)| {
            HttpKeyNode::new(i as u32 + 1, url, client.clone()).map(|n| Arc::new(n) as Arc<dyn KeyNode>)
        })
        .collect()
}

fn classify_status(status: StatusCode, body: &str) -> NodeError {
    let reason = serde_json::from_str::<NodeErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| format!("HTTP {status}"));

    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        NodeError::Rejected(reason)
    } else {
        NodeError::Unavailable(reason)
    }
}

#[async_trait]
impl KeyNode for HttpKeyNode {
    fn index(&self) -> u32 {
        self.index
    }

    async fn request_share(&self, request: &ShareRequest) -> Result<ShareResponse, NodeError> {
        let response = self
            .client
            .post(self.share_url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| NodeError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        response
            .json::<ShareResponse>()
            .await
            .map_err(|e| NodeError::Unavailable(format!("malformed node response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_url_appends_path() {
        let client = reqwest::Client::new();
        let node = HttpKeyNode::new(1, &"https://node-1.example.com/api".parse().unwrap(), client.clone()).unwrap();
        assert_eq!(node.share_url().as_str(), "https://node-1.example.com/api/share");

        let node = HttpKeyNode::new(2, &"https://node-2.example.com/".parse().unwrap(), client).unwrap();
        assert_eq!(node.share_url().as_str(), "https://node-2.example.com/share");
    }

    #[test]
    fn nodes_are_indexed_from_one() {
        let urls: Vec<Url> = ["https://a.example.com", "https://b.example.com"]
            .iter()
            .map(|u| u.parse().unwrap())
            .collect();
        let nodes = http_nodes(&urls, Duration::from_secs(1)).unwrap();
        assert_eq!(nodes.iter().map(|n| n.index()).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn client_errors_are_rejections() {
        let err = classify_status(StatusCode::FORBIDDEN, r#"{"error":"id token already used"}"#);
        assert_eq!(err, NodeError::Rejected("id token already used".to_string()));

        let err = classify_status(StatusCode::BAD_REQUEST, "not json");
        assert!(matches!(err, NodeError::Rejected(_)));
    }

    #[test]
    fn server_errors_and_throttling_are_transient() {
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
    }
}
