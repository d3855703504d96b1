// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key node protocol types.
//!
//! A key node holds one Shamir share per `(verifier, verifier_id)` pair. It
//! releases that share only after validating the identity token against its
//! own configuration for the verifier.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::shamir::{scalar_from_bytes, SharePoint};

/// Share request sent to every node of the network.
#[derive(Clone, Serialize, Deserialize)]
pub struct ShareRequest {
    /// Verifier name
    pub verifier: String,
    /// Subject under the verifier
    pub verifier_id: String,
    /// Identity token proving the claim
    pub id_token: String,
    /// Single-use nonce identifying this reconstruction session
    pub session_nonce: Uuid,
}

impl fmt::Debug for ShareRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareRequest")
            .field("verifier", &self.verifier)
            .field("verifier_id", &self.verifier_id)
            .field("id_token", &"<redacted>")
            .field("session_nonce", &self.session_nonce)
            .finish()
    }
}

/// A node's share for the requested key.
#[derive(Clone, Serialize, Deserialize)]
pub struct ShareResponse {
    /// Index of the responding node (x-coordinate of the share)
    pub node_index: u32,
    /// Share value, 32-byte big-endian scalar, hex
    pub share: String,
    /// Group public key the node holds for this key, compressed SEC1, hex
    pub public_key: String,
}

impl ShareResponse {
    /// Decode into a share point and the raw public key bytes.
    pub fn decode(&self) -> Result<(SharePoint, Vec<u8>), NodeError> {
        let share_bytes = alloy::hex::decode(&self.share)
            .map_err(|e| NodeError::Unavailable(format!("malformed share: {e}")))?;
        let y = scalar_from_bytes(&share_bytes)
            .map_err(|e| NodeError::Unavailable(format!("malformed share: {e}")))?;
        let public_key = alloy::hex::decode(&self.public_key)
            .map_err(|e| NodeError::Unavailable(format!("malformed public key: {e}")))?;

        Ok((SharePoint { x: self.node_index, y }, public_key))
    }
}

impl fmt::Debug for ShareResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareResponse")
            .field("node_index", &self.node_index)
            .field("share", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Node-level failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    /// Network failure, timeout or malformed response. Retried.
    #[error("Node unavailable: {0}")]
    Unavailable(String),

    /// The node refused the claim. Not retried.
    #[error("Node rejected claim: {0}")]
    Rejected(String),
}

impl NodeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, NodeError::Unavailable(_))
    }
}

/// One member of the threshold key network.
#[async_trait]
pub trait KeyNode: Send + Sync {
    /// Share index of this node (1-based).
    fn index(&self) -> u32;

    /// Ask the node for its share of the key bound to the request's claim.
    async fn request_share(&self, request: &ShareRequest) -> Result<ShareResponse, NodeError>;
}
