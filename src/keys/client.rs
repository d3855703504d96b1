// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Threshold key reconstruction client.
//!
//! Every login runs a fresh reconstruction:
//!
//! 1. Build a share request with a new single-use session nonce
//! 2. Ask all nodes concurrently, retrying transient failures per node
//! 3. Group responses by the public key each node reports
//! 4. As soon as a group holds `threshold` shares, interpolate the secret and
//!    check it against the group's public key
//! 5. Wrap the secret in a [`SigningCapability`]
//!
//! Outstanding node requests are aborted once a capability is built.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use uuid::Uuid;
use zeroize::Zeroize;

use super::capability::SigningCapability;
use super::node::{KeyNode, NodeError, ShareRequest, ShareResponse};
use super::shamir::{interpolate_at_zero, public_key_for, SharePoint};
use crate::auth::VerifiedClaim;
use crate::config::ConfigError;
use crate::error::ErrorKind;

/// Default per-node request timeout.
pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default overall quorum gathering timeout.
pub const DEFAULT_QUORUM_TIMEOUT: Duration = Duration::from_secs(15);

/// Default attempts per node (first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry; doubles on each further retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(200);

/// Reconstruction tuning.
#[derive(Debug, Clone)]
pub struct ReconstructionConfig {
    /// Shares required to rebuild the key
    pub threshold: usize,
    pub node_timeout: Duration,
    pub quorum_timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl ReconstructionConfig {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            node_timeout: DEFAULT_NODE_TIMEOUT,
            quorum_timeout: DEFAULT_QUORUM_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            node_timeout: self.node_timeout,
            max_attempts: self.max_attempts.max(1),
            initial_backoff: self.initial_backoff,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    node_timeout: Duration,
    max_attempts: u32,
    initial_backoff: Duration,
}

/// Shares reported under one public key. Wiped on drop.
#[derive(Default)]
struct ShareGroup {
    points: Vec<SharePoint>,
}

impl ShareGroup {
    fn wipe(&mut self) {
        for point in &mut self.points {
            point.y.zeroize();
        }
    }
}

impl Drop for ShareGroup {
    fn drop(&mut self) {
        self.wipe();
    }
}

/// Client for a fixed set of key nodes.
pub struct KeyReconstructionClient {
    nodes: Vec<Arc<dyn KeyNode>>,
    config: ReconstructionConfig,
}

impl KeyReconstructionClient {
    /// Create a client. The threshold must be reachable with the given nodes.
    pub fn new(nodes: Vec<Arc<dyn KeyNode>>, config: ReconstructionConfig) -> Result<Self, ConfigError> {
        if config.threshold == 0 || config.threshold > nodes.len() {
            return Err(ConfigError::Invalid {
                name: "threshold",
                reason: format!(
                    "threshold {} is not satisfiable by {} nodes",
                    config.threshold,
                    nodes.len()
                ),
            });
        }
        Ok(Self { nodes, config })
    }

    pub fn threshold(&self) -> usize {
        self.config.threshold
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Reconstruct the signing key bound to `(verifier_id, claim.subject())`.
    pub async fn reconstruct(
        &self,
        claim: &VerifiedClaim,
        verifier_id: &str,
    ) -> Result<SigningCapability, ErrorKind> {
        if claim.verifier() != verifier_id {
            return Err(ErrorKind::ClaimRejected(format!(
                "claim was verified for `{}`, not `{verifier_id}`",
                claim.verifier()
            )));
        }

        let request = Arc::new(ShareRequest {
            verifier: verifier_id.to_string(),
            verifier_id: claim.subject().to_string(),
            id_token: claim.proof().as_str().to_string(),
            session_nonce: Uuid::new_v4(),
        });
        let threshold = self.config.threshold;
        let policy = self.config.retry_policy();

        tracing::debug!(
            verifier = %verifier_id,
            subject = %claim.subject_fingerprint(),
            nodes = self.nodes.len(),
            threshold,
            "Requesting key shares"
        );

        let mut tasks = JoinSet::new();
        for node in &self.nodes {
            let node = Arc::clone(node);
            let request = Arc::clone(&request);
            tasks.spawn(async move {
                let index = node.index();
                (index, request_with_retry(node.as_ref(), &request, policy).await)
            });
        }

        let deadline = Instant::now() + self.config.quorum_timeout;
        let mut groups: HashMap<Vec<u8>, ShareGroup> = HashMap::new();
        let mut rejections: Vec<String> = Vec::new();
        let mut unavailable = 0usize;

        loop {
            let joined = match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = self.config.quorum_timeout.as_millis() as u64,
                        "Quorum gathering timed out"
                    );
                    break;
                }
            };

            let (index, outcome) = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(error = %e, "Key node task failed");
                    unavailable += 1;
                    continue;
                }
            };

            let response = match outcome {
                Ok(response) => response,
                Err(NodeError::Rejected(reason)) => {
                    tracing::warn!(node = index, reason = %reason, "Key node rejected claim");
                    rejections.push(format!("node {index}: {reason}"));
                    continue;
                }
                Err(NodeError::Unavailable(reason)) => {
                    tracing::warn!(node = index, reason = %reason, "Key node unavailable");
                    unavailable += 1;
                    continue;
                }
            };

            let (point, public_key) = match accept_response(index, &response) {
                Ok(decoded) => decoded,
                Err(e) => {
                    tracing::warn!(node = index, error = %e, "Discarding key node response");
                    unavailable += 1;
                    continue;
                }
            };

            let group = groups.entry(public_key.clone()).or_default();
            group.points.push(point);
            if group.points.len() < threshold {
                continue;
            }

            if let Some(capability) = combine(&group.points, threshold, &public_key)? {
                tracing::info!(
                    verifier = %verifier_id,
                    subject = %claim.subject_fingerprint(),
                    address = %capability.address(),
                    shares = group.points.len(),
                    "Key reconstructed"
                );
                return Ok(capability);
            }
            tracing::warn!(
                shares = group.points.len(),
                "Shares are inconsistent with reported public key, waiting for more"
            );
        }

        let responded = groups.values().map(|g| g.points.len()).max().unwrap_or(0);
        tracing::warn!(
            verifier = %verifier_id,
            responded,
            required = threshold,
            rejected = rejections.len(),
            unavailable,
            "Key reconstruction failed"
        );

        if !rejections.is_empty() {
            return Err(ErrorKind::ClaimRejected(rejections.join("; ")));
        }
        Err(ErrorKind::QuorumUnreachable {
            responded,
            required: threshold,
        })
    }
}

/// Request a share, retrying transient failures with exponential backoff.
async fn request_with_retry(
    node: &dyn KeyNode,
    request: &ShareRequest,
    policy: RetryPolicy,
) -> Result<ShareResponse, NodeError> {
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1;

    loop {
        let outcome = match tokio::time::timeout(policy.node_timeout, node.request_share(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(NodeError::Unavailable(format!(
                "no response within {} ms",
                policy.node_timeout.as_millis()
            ))),
        };

        match outcome {
            Err(NodeError::Unavailable(reason)) if attempt < policy.max_attempts => {
                tracing::debug!(
                    node = node.index(),
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    reason = %reason,
                    "Retrying key node"
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
                attempt += 1;
            }
            other => return other,
        }
    }
}

fn accept_response(index: u32, response: &ShareResponse) -> Result<(SharePoint, Vec<u8>), NodeError> {
    if response.node_index != index {
        return Err(NodeError::Unavailable(format!(
            "response claims index {}",
            response.node_index
        )));
    }
    response.decode()
}

/// Try every `threshold`-sized subset that includes the newest point.
///
/// Returns `Ok(None)` when no subset matches the public key.
fn combine(
    points: &[SharePoint],
    threshold: usize,
    public_key: &[u8],
) -> Result<Option<SigningCapability>, ErrorKind> {
    let Some((newest, earlier)) = points.split_last() else {
        return Ok(None);
    };

    for mut subset in subsets(earlier, threshold - 1) {
        subset.push(*newest);
        let Ok(mut secret) = interpolate_at_zero(&subset) else {
            continue;
        };
        let matches = public_key_for(&secret) == public_key;
        let capability = if matches {
            Some(SigningCapability::from_secret(&secret))
        } else {
            None
        };
        secret.zeroize();
        for point in subset.iter_mut() {
            point.y.zeroize();
        }
        if let Some(capability) = capability {
            return capability.map(Some);
        }
    }
    Ok(None)
}

/// All `k`-element subsets of `points`, in index order.
fn subsets(points: &[SharePoint], k: usize) -> Vec<Vec<SharePoint>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    if points.len() < k {
        return Vec::new();
    }
    let (first, rest) = (points[0], &points[1..]);
    let mut with_first: Vec<Vec<SharePoint>> = subsets(rest, k - 1)
        .into_iter()
        .map(|mut s| {
            s.insert(0, first);
            s
        })
        .collect();
    with_first.extend(subsets(rest, k));
    with_first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verifier::tests::create_test_token;
    use crate::auth::IdentityVerifier;
    use crate::keys::local::LocalNetwork;
    use k256::elliptic_curve::Field;
    use k256::Scalar;
    use rand::rngs::OsRng;

    fn claim_for(subject: &str) -> VerifiedClaim {
        let token = create_test_token(subject, "app-x", chrono::Utc::now().timestamp() + 3600);
        IdentityVerifier::new("w3a-demo", "app-x").verify(&token).unwrap()
    }

    fn fast_config(threshold: usize) -> ReconstructionConfig {
        ReconstructionConfig {
            threshold,
            node_timeout: Duration::from_millis(200),
            quorum_timeout: Duration::from_secs(2),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(5),
        }
    }

    fn client(network: &LocalNetwork, threshold: usize) -> KeyReconstructionClient {
        KeyReconstructionClient::new(network.nodes(), fast_config(threshold)).unwrap()
    }

    #[tokio::test]
    async fn reconstruction_is_deterministic() {
        let network = LocalNetwork::new(5, 3).with_verifier("w3a-demo", "app-x");
        let client = client(&network, 3);

        let first = client.reconstruct(&claim_for("u1"), "w3a-demo").await.unwrap();
        let second = client.reconstruct(&claim_for("u1"), "w3a-demo").await.unwrap();
        assert_eq!(first.address(), second.address());

        let other = client.reconstruct(&claim_for("u2"), "w3a-demo").await.unwrap();
        assert_ne!(first.address(), other.address());
    }

    #[tokio::test]
    async fn separate_clients_agree_on_address() {
        let network = LocalNetwork::new(5, 3).with_verifier("w3a-demo", "app-x");
        let a = client(&network, 3).reconstruct(&claim_for("u1"), "w3a-demo").await.unwrap();
        let b = client(&network, 3).reconstruct(&claim_for("u1"), "w3a-demo").await.unwrap();
        assert_eq!(a.address(), b.address());
    }

    #[tokio::test]
    async fn tolerates_nodes_down_while_quorum_holds() {
        let network = LocalNetwork::new(5, 3).with_verifier("w3a-demo", "app-x");
        let client = client(&network, 3);
        let expected = client.reconstruct(&claim_for("u1"), "w3a-demo").await.unwrap().address();

        network.node(1).set_offline(true);
        network.node(4).set_offline(true);
        let cap = client.reconstruct(&claim_for("u1"), "w3a-demo").await.unwrap();
        assert_eq!(cap.address(), expected);
    }

    #[tokio::test]
    async fn quorum_unreachable_below_threshold() {
        let network = LocalNetwork::new(5, 3).with_verifier("w3a-demo", "app-x");
        for index in [1, 2, 3] {
            network.node(index).set_offline(true);
        }
        let err = client(&network, 3)
            .reconstruct(&claim_for("u1"), "w3a-demo")
            .await
            .unwrap_err();
        assert_eq!(err, ErrorKind::QuorumUnreachable { responded: 2, required: 3 });
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let network = LocalNetwork::new(3, 3).with_verifier("w3a-demo", "app-x");
        network.node(2).fail_next(2);
        let cap = client(&network, 3).reconstruct(&claim_for("u1"), "w3a-demo").await;
        assert!(cap.is_ok());
        assert_eq!(network.node(2).requests_served(), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let network = LocalNetwork::new(3, 3).with_verifier("w3a-demo", "app-x");
        network.node(2).fail_next(10);
        let err = client(&network, 3)
            .reconstruct(&claim_for("u1"), "w3a-demo")
            .await
            .unwrap_err();
        assert!(matches!(err, ErrorKind::QuorumUnreachable { .. }));
        assert_eq!(network.node(2).pending_failures(), 7);
    }

    #[tokio::test]
    async fn slow_nodes_time_out() {
        let network = LocalNetwork::new(3, 3).with_verifier("w3a-demo", "app-x");
        network.node(3).set_latency(Duration::from_secs(5));
        let err = client(&network, 3)
            .reconstruct(&claim_for("u1"), "w3a-demo")
            .await
            .unwrap_err();
        assert!(matches!(err, ErrorKind::QuorumUnreachable { .. }));
    }

    #[tokio::test]
    async fn unknown_verifier_is_rejected() {
        let network = LocalNetwork::new(3, 2).with_verifier("other-verifier", "app-x");
        let err = client(&network, 2)
            .reconstruct(&claim_for("u1"), "w3a-demo")
            .await
            .unwrap_err();
        assert!(matches!(err, ErrorKind::ClaimRejected(_)));
    }

    #[tokio::test]
    async fn mismatched_verifier_rejected_locally() {
        let network = LocalNetwork::new(3, 2).with_verifier("w3a-demo", "app-x");
        let err = client(&network, 2)
            .reconstruct(&claim_for("u1"), "another")
            .await
            .unwrap_err();
        assert!(matches!(err, ErrorKind::ClaimRejected(_)));
        assert_eq!(network.node(1).requests_served(), 0);
    }

    #[tokio::test]
    async fn corrupt_share_is_outvoted() {
        let network = LocalNetwork::new(5, 3).with_verifier("w3a-demo", "app-x");
        let client = client(&network, 3);
        let expected = client.reconstruct(&claim_for("u1"), "w3a-demo").await.unwrap().address();

        network.node(2).set_corrupt(true);
        let cap = client.reconstruct(&claim_for("u1"), "w3a-demo").await.unwrap();
        assert_eq!(cap.address(), expected);
    }

    #[tokio::test]
    async fn quorum_deadline_bounds_slow_nodes() {
        let network = LocalNetwork::new(3, 3).with_verifier("w3a-demo", "app-x");
        network.node(3).set_latency(Duration::from_secs(5));
        let config = ReconstructionConfig {
            node_timeout: Duration::from_secs(30),
            quorum_timeout: Duration::from_millis(150),
            ..fast_config(3)
        };
        let client = KeyReconstructionClient::new(network.nodes(), config).unwrap();

        let started = std::time::Instant::now();
        let err = client.reconstruct(&claim_for("u1"), "w3a-demo").await.unwrap_err();
        assert_eq!(err, ErrorKind::QuorumUnreachable { responded: 2, required: 3 });
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn share_group_wipe_zeroes_scalars() {
        let mut group = ShareGroup {
            points: (1..=3).map(|x| SharePoint { x, y: Scalar::from(7u64 + x as u64) }).collect(),
        };
        group.wipe();
        assert!(group.points.iter().all(|p| p.y == Scalar::ZERO));
    }

    #[test]
    fn threshold_must_be_satisfiable() {
        let network = LocalNetwork::new(3, 2);
        assert!(KeyReconstructionClient::new(network.nodes(), fast_config(4)).is_err());
        assert!(KeyReconstructionClient::new(network.nodes(), fast_config(0)).is_err());
        assert!(KeyReconstructionClient::new(network.nodes(), fast_config(3)).is_ok());
    }

    #[test]
    fn subsets_enumerates_combinations() {
        let points: Vec<SharePoint> = (1..=4).map(|x| SharePoint { x, y: Scalar::ONE }).collect();
        assert_eq!(subsets(&points, 2).len(), 6);
        assert_eq!(subsets(&points, 0).len(), 1);
        assert!(subsets(&points, 5).is_empty());
    }

    #[test]
    fn combine_ignores_wrong_public_key() {
        let secret = Scalar::random(&mut OsRng);
        let shares = crate::keys::shamir::split(&secret, 2, 3, &mut OsRng).unwrap();
        let wrong_key = public_key_for(&Scalar::ONE);
        assert!(combine(&shares[..2], 2, &wrong_key).unwrap().is_none());

        let right_key = public_key_for(&secret);
        assert!(combine(&shares[..2], 2, &right_key).unwrap().is_some());
    }
}
