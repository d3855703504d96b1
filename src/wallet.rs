// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet facade: session lifecycle plus chain operations.

use alloy::primitives::{Address, Bytes, Signature, B256};

use crate::auth::{IdentityVerifier, UserInfo};
use crate::blockchain::{Balance, ChainAdapter, ChainConfig, SendResult, TxParams, TxStatus};
use crate::config::{ConfigError, WalletConfig, KEY_NODES_ENV};
use crate::error::{Operation, OperationContext, WalletError};
use crate::keys::{http_nodes, KeyReconstructionClient};
use crate::session::{SessionManager, SessionState};

/// A single-factor-auth wallet for one user session.
pub struct Wallet {
    session: SessionManager,
    chain: ChainAdapter,
}

impl Wallet {
    pub fn new(session: SessionManager, chain: ChainAdapter) -> Self {
        Self { session, chain }
    }

    /// Wallet over HTTP key nodes and the configured RPC endpoint.
    pub fn from_config(config: &WalletConfig) -> Result<Self, ConfigError> {
        let network = config
            .key_network
            .as_ref()
            .ok_or(ConfigError::Missing(KEY_NODES_ENV))?;

        let nodes = http_nodes(&network.nodes, network.reconstruction.node_timeout)?;
        let keys = KeyReconstructionClient::new(nodes, network.reconstruction.clone())?;

        let mut verifier = IdentityVerifier::new(&config.verifier_id, &config.client_id);
        if let Some(issuer) = &config.token_issuer {
            verifier = verifier.with_issuer(issuer);
        }

        let chain = ChainAdapter::connect(config.chain.clone()).with_timeout(config.rpc_timeout);
        tracing::info!(
            chain_id = config.chain.chain_id,
            network = %config.chain.display_name,
            key_nodes = keys.node_count(),
            threshold = keys.threshold(),
            "Wallet configured"
        );

        Ok(Self::new(SessionManager::new(verifier, keys), chain))
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn chain_config(&self) -> &ChainConfig {
        self.chain.config()
    }

    pub async fn login(&self, id_token: &str) -> Result<Address, WalletError> {
        self.session.login(id_token).await
    }

    pub fn logout(&self) -> Result<(), WalletError> {
        self.session.logout()
    }

    pub fn status(&self) -> SessionState {
        self.session.status()
    }

    pub fn user_info(&self) -> Result<UserInfo, WalletError> {
        self.session.user_info()
    }

    pub fn get_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let capability = self.session.capability().during(Operation::GetAccounts)?;
        Ok(self.chain.get_accounts(&capability))
    }

    pub async fn get_balance(&self) -> Result<Balance, WalletError> {
        let capability = self.session.capability().during(Operation::GetBalance)?;
        self.chain.get_balance(&capability).await.during(Operation::GetBalance)
    }

    pub fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError> {
        let capability = self.session.capability().during(Operation::SignMessage)?;
        self.chain
            .sign_message(&capability, message)
            .during(Operation::SignMessage)
    }

    /// Send a transaction; `None` sends the default self-transfer.
    pub async fn send_transaction(&self, params: Option<TxParams>) -> Result<SendResult, WalletError> {
        let capability = self.session.capability().during(Operation::SendTransaction)?;
        self.chain
            .send_transaction(&capability, params)
            .await
            .during(Operation::SendTransaction)
    }

    pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, WalletError> {
        let capability = self.session.capability().during(Operation::Call)?;
        self.chain.call(&capability, to, data).await.during(Operation::Call)
    }

    /// Confirm the RPC endpoint serves the configured chain. Needs no session.
    pub async fn verify_chain(&self) -> Result<u64, WalletError> {
        self.chain.verify_chain_id().await.during(Operation::VerifyChain)
    }

    /// Status of a previously submitted transaction. Needs no session.
    pub async fn transaction_status(&self, tx_hash: B256) -> Result<TxStatus, WalletError> {
        self.chain
            .transaction_status(tx_hash)
            .await
            .during(Operation::TransactionStatus)
    }
}
