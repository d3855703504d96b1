// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end wallet flows against an in-process key network and chain.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{eip191_hash_message, Address, Bytes, B256, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use serde_json::json;
use sfa_wallet::auth::IdentityVerifier;
use sfa_wallet::blockchain::{
    ChainAdapter, ChainConfig, ChainRpc, MemoryChain, ReceiptSummary, RpcFailure, TxParams, TxStatus,
};
use sfa_wallet::keys::{KeyReconstructionClient, LocalNetwork, ReconstructionConfig};
use sfa_wallet::{ErrorKind, Operation, SessionManager, SessionState, Wallet};

const VERIFIER: &str = "w3a-demo";
const CLIENT_ID: &str = "app-x";
const CHAIN_ID: u64 = 31;

fn id_token(sub: &str, aud: &str, exp: i64) -> String {
    let header = json!({"alg": "RS256", "typ": "JWT", "kid": "integration"});
    let claims = json!({
        "sub": sub,
        "aud": aud,
        "iss": "https://securetoken.google.com/app-x",
        "iat": Utc::now().timestamp(),
        "exp": exp,
        "email": format!("{sub}@example.com"),
        "name": "Test User",
    });
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode(b"signature")
    )
}

fn valid_token(sub: &str) -> String {
    id_token(sub, CLIENT_ID, Utc::now().timestamp() + 3600)
}

fn chain_config() -> ChainConfig {
    ChainConfig {
        chain_id: CHAIN_ID,
        rpc_endpoint: "http://localhost:8545".parse().unwrap(),
        native_ticker: "tRBTC".to_string(),
        display_name: "Rootstock Testnet".to_string(),
        block_explorer_url: Some("https://explorer.testnet.rootstock.io".to_string()),
    }
}

struct Harness {
    network: LocalNetwork,
    chain: Arc<MemoryChain>,
    wallet: Wallet,
}

impl Harness {
    fn new(total: usize, threshold: usize) -> Self {
        let network = LocalNetwork::new(total, threshold).with_verifier(VERIFIER, CLIENT_ID);
        let chain = Arc::new(MemoryChain::new(CHAIN_ID));
        let wallet = wallet_for(&network, threshold, chain.clone());
        Self { network, chain, wallet }
    }
}

fn wallet_for(network: &LocalNetwork, threshold: usize, chain: Arc<dyn ChainRpc>) -> Wallet {
    let mut config = ReconstructionConfig::new(threshold);
    config.node_timeout = Duration::from_millis(300);
    config.quorum_timeout = Duration::from_secs(3);
    config.initial_backoff = Duration::from_millis(5);

    let keys = KeyReconstructionClient::new(network.nodes(), config).unwrap();
    let session = SessionManager::new(IdentityVerifier::new(VERIFIER, CLIENT_ID), keys);
    let adapter = ChainAdapter::new(chain_config(), chain).with_timeout(Duration::from_secs(1));
    Wallet::new(session, adapter)
}

fn one_native() -> U256 {
    U256::from(10u64).pow(U256::from(18u64))
}

#[tokio::test]
async fn login_with_three_of_five_nodes() {
    let h = Harness::new(5, 3);
    h.network.node(4).set_offline(true);
    h.network.node(5).set_offline(true);

    let token = valid_token("u1");
    let address = h.wallet.login(&token).await.unwrap();
    assert_eq!(h.wallet.status(), SessionState::Authenticated);
    assert_eq!(h.wallet.get_accounts().unwrap(), vec![address]);

    // Same token again: fresh reconstruction, same address.
    let again = h.wallet.login(&token).await.unwrap();
    assert_eq!(again, address);
    assert_eq!(h.wallet.get_accounts().unwrap(), vec![address]);
}

#[tokio::test]
async fn login_fails_below_threshold() {
    let h = Harness::new(5, 3);
    for index in 3..=5 {
        h.network.node(index).set_offline(true);
    }

    let err = h.wallet.login(&valid_token("u1")).await.unwrap_err();
    assert_eq!(err.operation, Operation::Login);
    assert_eq!(err.kind, ErrorKind::QuorumUnreachable { responded: 2, required: 3 });
    assert_eq!(h.wallet.status(), SessionState::Unauthenticated);
    assert_eq!(h.wallet.get_accounts().unwrap_err().kind, ErrorKind::ProviderNotReady);
}

#[tokio::test]
async fn address_is_stable_across_wallets() {
    let network = LocalNetwork::new(5, 3).with_verifier(VERIFIER, CLIENT_ID);
    let chain = Arc::new(MemoryChain::new(CHAIN_ID));
    let first = wallet_for(&network, 3, chain.clone());
    let second = wallet_for(&network, 3, chain);

    let a = first.login(&valid_token("u1")).await.unwrap();
    let b = second.login(&valid_token("u1")).await.unwrap();
    let other = second.login(&valid_token("u2")).await.unwrap();
    assert_eq!(a, b);
    assert_ne!(a, other);
}

#[tokio::test]
async fn wallet_operations_require_login() {
    let h = Harness::new(5, 3);

    assert_eq!(h.wallet.get_accounts().unwrap_err().kind, ErrorKind::ProviderNotReady);
    assert_eq!(h.wallet.get_balance().await.unwrap_err().kind, ErrorKind::ProviderNotReady);
    assert_eq!(h.wallet.sign_message(b"hi").unwrap_err().kind, ErrorKind::ProviderNotReady);
    let err = h.wallet.send_transaction(None).await.unwrap_err();
    assert_eq!(err.operation, Operation::SendTransaction);
    assert_eq!(err.kind, ErrorKind::ProviderNotReady);
    assert_eq!(
        h.wallet.call(Address::ZERO, Bytes::new()).await.unwrap_err().kind,
        ErrorKind::ProviderNotReady
    );
    assert_eq!(h.wallet.user_info().unwrap_err().kind, ErrorKind::ProviderNotReady);
}

#[tokio::test]
async fn logout_revokes_capability_immediately() {
    let h = Harness::new(5, 3);
    h.wallet.login(&valid_token("u1")).await.unwrap();
    assert!(h.wallet.get_accounts().is_ok());

    h.wallet.logout().unwrap();
    assert_eq!(h.wallet.status(), SessionState::Unauthenticated);
    assert_eq!(h.wallet.get_accounts().unwrap_err().kind, ErrorKind::ProviderNotReady);
    assert_eq!(h.wallet.get_balance().await.unwrap_err().kind, ErrorKind::ProviderNotReady);
    assert_eq!(h.wallet.sign_message(b"hi").unwrap_err().kind, ErrorKind::ProviderNotReady);
    assert_eq!(
        h.wallet.send_transaction(None).await.unwrap_err().kind,
        ErrorKind::ProviderNotReady
    );
}

#[tokio::test]
async fn second_login_while_authenticating_is_refused() {
    let h = Harness::new(5, 3);
    for index in 1..=5 {
        h.network.node(index).set_latency(Duration::from_millis(60));
    }

    let token = valid_token("u1");
    let (first, second) = tokio::join!(h.wallet.login(&token), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.wallet.login(&token).await
    });

    assert_eq!(second.unwrap_err().kind, ErrorKind::LoginInProgress);
    let address = first.unwrap();
    assert_eq!(h.wallet.status(), SessionState::Authenticated);
    assert_eq!(h.wallet.get_accounts().unwrap(), vec![address]);
}

#[tokio::test]
async fn token_failures_leave_session_unauthenticated() {
    let h = Harness::new(5, 3);

    let expired = id_token("u1", CLIENT_ID, Utc::now().timestamp() - 1);
    assert_eq!(h.wallet.login(&expired).await.unwrap_err().kind, ErrorKind::TokenExpired);

    let foreign = id_token("u1", "another-app", Utc::now().timestamp() + 3600);
    assert_eq!(h.wallet.login(&foreign).await.unwrap_err().kind, ErrorKind::AudienceMismatch);

    let garbage = h.wallet.login("not-a-token").await.unwrap_err();
    assert!(matches!(garbage.kind, ErrorKind::InvalidTokenFormat(_)));

    assert_eq!(h.wallet.status(), SessionState::Unauthenticated);
    // Nothing reached the key network.
    assert!((1..=5).all(|i| h.network.node(i).requests_served() == 0));
}

#[tokio::test]
async fn user_info_reflects_token_claims() {
    let h = Harness::new(3, 2);
    h.wallet.login(&valid_token("u1")).await.unwrap();

    let user = h.wallet.user_info().unwrap();
    assert_eq!(user.verifier, VERIFIER);
    assert_eq!(user.verifier_id, "u1");
    assert_eq!(user.profile.email.as_deref(), Some("u1@example.com"));
    assert_eq!(user.profile.name.as_deref(), Some("Test User"));
}

#[tokio::test]
async fn insufficient_funds_keeps_session() {
    let h = Harness::new(5, 3);
    let address = h.wallet.login(&valid_token("u1")).await.unwrap();

    let err = h.wallet.send_transaction(None).await.unwrap_err();
    assert_eq!(err.operation, Operation::SendTransaction);
    assert!(matches!(err.kind, ErrorKind::InsufficientFunds(_)));
    assert_eq!(h.wallet.status(), SessionState::Authenticated);

    // Capability still works once the account is funded.
    h.chain.fund(address, one_native());
    let sent = h.wallet.send_transaction(None).await.unwrap();
    assert_eq!(sent.status, TxStatus::Pending);
}

#[tokio::test]
async fn funded_account_signs_and_sends() {
    let h = Harness::new(5, 3);
    let address = h.wallet.login(&valid_token("u1")).await.unwrap();
    h.chain.fund(address, one_native());

    let balance = h.wallet.get_balance().await.unwrap();
    assert_eq!(balance.formatted, "1");
    assert_eq!(balance.ticker, "tRBTC");

    let signature = h.wallet.sign_message(b"Sign in to SFA Wallet").unwrap();
    let signer = signature
        .recover_address_from_prehash(&eip191_hash_message(b"Sign in to SFA Wallet"))
        .unwrap();
    assert_eq!(signer, address);

    let recipient = Address::repeat_byte(0x77);
    let sent = h
        .wallet
        .send_transaction(Some(TxParams::transfer(recipient, "0.25")))
        .await
        .unwrap();
    assert!(sent.explorer_url.as_deref().is_some_and(|url| url.ends_with(&sent.tx_hash.to_string())));
    assert_eq!(h.wallet.transaction_status(sent.tx_hash).await.unwrap(), TxStatus::Pending);

    let block = h.chain.mine();
    assert_eq!(
        h.wallet.transaction_status(sent.tx_hash).await.unwrap(),
        TxStatus::Confirmed { block_number: block }
    );
    assert_eq!(h.chain.balance_of(recipient), one_native() / U256::from(4u64));
}

#[tokio::test]
async fn chain_errors_do_not_touch_session() {
    let h = Harness::new(5, 3);
    h.wallet.login(&valid_token("u1")).await.unwrap();

    h.chain.set_offline(true);
    let err = h.wallet.get_balance().await.unwrap_err();
    assert_eq!(err.operation, Operation::GetBalance);
    assert!(matches!(err.kind, ErrorKind::RpcUnavailable(_)));
    assert_eq!(h.wallet.status(), SessionState::Authenticated);

    h.chain.set_offline(false);
    assert!(h.wallet.get_balance().await.is_ok());
}

#[tokio::test]
async fn flaky_node_does_not_fail_login() {
    let h = Harness::new(3, 3);
    h.network.node(2).fail_next(2);

    h.wallet.login(&valid_token("u1")).await.unwrap();
    assert_eq!(h.network.node(2).pending_failures(), 0);
    assert_eq!(h.wallet.status(), SessionState::Authenticated);
}

/// Chain whose balance lookups take a while to answer.
struct SlowBalanceChain {
    inner: Arc<MemoryChain>,
    delay: Duration,
}

#[async_trait]
impl ChainRpc for SlowBalanceChain {
    async fn chain_id(&self) -> Result<u64, RpcFailure> {
        self.inner.chain_id().await
    }
    async fn balance(&self, address: Address) -> Result<U256, RpcFailure> {
        tokio::time::sleep(self.delay).await;
        self.inner.balance(address).await
    }
    async fn transaction_count(&self, address: Address) -> Result<u64, RpcFailure> {
        self.inner.transaction_count(address).await
    }
    async fn gas_price(&self) -> Result<u128, RpcFailure> {
        self.inner.gas_price().await
    }
    async fn call(&self, request: TransactionRequest) -> Result<Bytes, RpcFailure> {
        self.inner.call(request).await
    }
    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64, RpcFailure> {
        self.inner.estimate_gas(request).await
    }
    async fn send_raw_transaction(&self, encoded: Bytes) -> Result<B256, RpcFailure> {
        self.inner.send_raw_transaction(encoded).await
    }
    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<ReceiptSummary>, RpcFailure> {
        self.inner.transaction_receipt(tx_hash).await
    }
}

#[tokio::test]
async fn logout_stops_send_already_in_flight() {
    let network = LocalNetwork::new(5, 3).with_verifier(VERIFIER, CLIENT_ID);
    let ledger = Arc::new(MemoryChain::new(CHAIN_ID));
    let slow = Arc::new(SlowBalanceChain {
        inner: ledger.clone(),
        delay: Duration::from_millis(100),
    });
    let wallet = wallet_for(&network, 3, slow);
    let address = wallet.login(&valid_token("u1")).await.unwrap();
    ledger.fund(address, one_native());

    let (sent, logged_out) = tokio::join!(wallet.send_transaction(None), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        wallet.logout()
    });

    logged_out.unwrap();
    assert_eq!(wallet.status(), SessionState::Unauthenticated);
    let err = sent.unwrap_err();
    assert_eq!(err.operation, Operation::SendTransaction);
    assert_eq!(err.kind, ErrorKind::ProviderNotReady);
    assert_eq!(ledger.pending_count(), 0);
    assert_eq!(ledger.nonce_of(address), 0);
}

#[tokio::test]
async fn endpoint_chain_id_is_verified() {
    let h = Harness::new(3, 2);
    assert_eq!(h.wallet.verify_chain().await.unwrap(), CHAIN_ID);

    let network = LocalNetwork::new(3, 2).with_verifier(VERIFIER, CLIENT_ID);
    let wrong = wallet_for(&network, 2, Arc::new(MemoryChain::new(CHAIN_ID + 1)));
    let err = wrong.verify_chain().await.unwrap_err();
    assert_eq!(err.operation, Operation::VerifyChain);
    assert!(matches!(err.kind, ErrorKind::RpcUnavailable(_)));
}
