// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process key network for tests and local development.
//!
//! Each [`LocalNode`] keeps only its own share. The first time any node is
//! asked for a `(verifier, verifier_id)` key, a dealer draws a fresh secret,
//! splits it and hands one share to every node's store, then forgets it.
//! Nodes validate the identity token against their own verifier table and
//! refuse session nonces they have already served.
//!
//! Faults can be injected per node: offline, N transient failures, added
//! latency, or corrupted shares.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use k256::elliptic_curve::Field;
use k256::Scalar;
use rand::rngs::OsRng;
use uuid::Uuid;
use zeroize::Zeroize;

use super::node::{KeyNode, NodeError, ShareRequest, ShareResponse};
use super::shamir::{public_key_for, split};
use crate::auth::verifier::decode_claims;

type KeyId = (String, String);

/// A node's stored share.
struct StoredShare {
    share: Scalar,
    public_key: Vec<u8>,
}

impl Drop for StoredShare {
    fn drop(&mut self) {
        self.share.zeroize();
    }
}

#[derive(Default)]
struct NodeStore {
    shares: HashMap<KeyId, StoredShare>,
    served_nonces: HashSet<Uuid>,
}

/// Assigns keys on first request.
struct Dealer {
    threshold: usize,
    stores: Vec<Arc<Mutex<NodeStore>>>,
    assigned: Mutex<HashSet<KeyId>>,
}

impl Dealer {
    fn ensure_assigned(&self, key: &KeyId) -> Result<(), NodeError> {
        let mut assigned = self.assigned.lock().unwrap_or_else(PoisonError::into_inner);
        if assigned.contains(key) {
            return Ok(());
        }

        let mut secret = Scalar::random(&mut OsRng);
        let public_key = public_key_for(&secret);
        let shares = split(&secret, self.threshold, self.stores.len(), &mut OsRng)
            .map_err(|e| NodeError::Unavailable(format!("key assignment failed: {e}")));
        secret.zeroize();

        for (store, point) in self.stores.iter().zip(shares?) {
            store
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .shares
                .insert(
                    key.clone(),
                    StoredShare {
                        share: point.y,
                        public_key: public_key.clone(),
                    },
                );
        }
        assigned.insert(key.clone());

        tracing::debug!(verifier = %key.0, nodes = self.stores.len(), "Assigned new key");
        Ok(())
    }
}

/// A node's copy of the trust material for one verifier.
#[derive(Debug, Clone)]
struct VerifierPolicy {
    audience: String,
}

/// One in-process key node.
pub struct LocalNode {
    index: u32,
    store: Arc<Mutex<NodeStore>>,
    dealer: Arc<Dealer>,
    verifiers: Mutex<HashMap<String, VerifierPolicy>>,
    offline: AtomicBool,
    corrupt: AtomicBool,
    pending_failures: AtomicU32,
    latency_ms: AtomicU64,
    served: AtomicU32,
}

impl LocalNode {
    /// Register trust material for a verifier on this node only.
    pub fn add_verifier(&self, verifier: impl Into<String>, audience: impl Into<String>) {
        self.verifiers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(verifier.into(), VerifierPolicy { audience: audience.into() });
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `count` requests as unavailable.
    pub fn fail_next(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    pub fn pending_failures(&self) -> u32 {
        self.pending_failures.load(Ordering::SeqCst)
    }

    /// Delay every response.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Return a wrong share (with the correct public key).
    pub fn set_corrupt(&self, corrupt: bool) {
        self.corrupt.store(corrupt, Ordering::SeqCst);
    }

    /// Number of shares this node has released.
    pub fn requests_served(&self) -> u32 {
        self.served.load(Ordering::SeqCst)
    }

    fn validate(&self, request: &ShareRequest) -> Result<(), NodeError> {
        let policy = self
            .verifiers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request.verifier)
            .cloned()
            .ok_or_else(|| NodeError::Rejected(format!("unknown verifier `{}`", request.verifier)))?;

        let claims = decode_claims(&request.id_token)
            .map_err(|e| NodeError::Rejected(e.to_string()))?;

        if claims.sub != request.verifier_id {
            return Err(NodeError::Rejected("token subject does not match verifier id".to_string()));
        }
        if !claims.aud.as_ref().is_some_and(|aud| aud.contains(&policy.audience)) {
            return Err(NodeError::Rejected("token audience does not match verifier".to_string()));
        }
        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(NodeError::Rejected("token expired".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyNode for LocalNode {
    fn index(&self) -> u32 {
        self.index
    }

    async fn request_share(&self, request: &ShareRequest) -> Result<ShareResponse, NodeError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(NodeError::Unavailable("node offline".to_string()));
        }
        let failing = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(NodeError::Unavailable("injected transient failure".to_string()));
        }

        self.validate(request)?;

        let key = (request.verifier.clone(), request.verifier_id.clone());
        {
            let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
            if !store.served_nonces.insert(request.session_nonce) {
                return Err(NodeError::Rejected("session nonce already used".to_string()));
            }
        }
        self.dealer.ensure_assigned(&key)?;

        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        let stored = store
            .shares
            .get(&key)
            .ok_or_else(|| NodeError::Unavailable("share missing after assignment".to_string()))?;

        let share = if self.corrupt.load(Ordering::SeqCst) {
            stored.share + Scalar::ONE
        } else {
            stored.share
        };
        self.served.fetch_add(1, Ordering::SeqCst);

        Ok(ShareResponse {
            node_index: self.index,
            share: alloy::hex::encode(share.to_bytes()),
            public_key: alloy::hex::encode(&stored.public_key),
        })
    }
}

/// A set of local nodes sharing one dealer.
pub struct LocalNetwork {
    nodes: Vec<Arc<LocalNode>>,
}

impl LocalNetwork {
    /// Create `total` nodes (indices `1..=total`) with the given threshold.
    pub fn new(total: usize, threshold: usize) -> Self {
        let stores: Vec<Arc<Mutex<NodeStore>>> =
            (0..total).map(|_| Arc::new(Mutex::new(NodeStore::default()))).collect();
        let dealer = Arc::new(Dealer {
            threshold,
            stores: stores.clone(),
            assigned: Mutex::new(HashSet::new()),
        });

        let nodes = stores
            .into_iter()
            .enumerate()
            .map(|(i, store)| {
                Arc::new(LocalNode {
                    index: i as u32 + 1,
                    store,
                    dealer: Arc::clone(&dealer),
                    verifiers: Mutex::new(HashMap::new()),
                    offline: AtomicBool::new(false),
                    corrupt: AtomicBool::new(false),
                    pending_failures: AtomicU32::new(0),
                    latency_ms: AtomicU64::new(0),
                    served: AtomicU32::new(0),
                })
            })
            .collect();

        Self { nodes }
    }

    /// Register a verifier and its expected audience on every node.
    pub fn with_verifier(self, verifier: &str, audience: &str) -> Self {
        for node in &self.nodes {
            node.add_verifier(verifier, audience);
        }
        self
    }

    /// Node by 1-based index.
    ///
    /// # Panics
    /// If `index` is outside `1..=total`.
    pub fn node(&self, index: u32) -> &Arc<LocalNode> {
        &self.nodes[index as usize - 1]
    }

    /// All nodes as trait objects for a reconstruction client.
    pub fn nodes(&self) -> Vec<Arc<dyn KeyNode>> {
        self.nodes
            .iter()
            .map(|node| Arc::clone(node) as Arc<dyn KeyNode>)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
