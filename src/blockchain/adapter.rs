// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet operations against the configured chain.
//!
//! Every signing operation takes the session's [`SigningCapability`]; the
//! adapter never holds one itself. All RPC calls share one timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::{
    consensus::{TxEnvelope, TxLegacy},
    eips::eip2718::Encodable2718,
    primitives::{Address, Bytes, Signature, TxKind, B256, U256},
    rpc::types::TransactionRequest,
};

use super::rpc::{AlloyRpc, ChainRpc, RpcFailure};
use super::types::{
    Balance, ChainConfig, SendResult, TxParams, TxStatus, DEFAULT_TRANSFER_AMOUNT, NATIVE_DECIMALS,
    TRANSFER_GAS_LIMIT,
};
use super::units::{format_amount, parse_amount};
use crate::config::DEFAULT_RPC_TIMEOUT;
use crate::error::ErrorKind;
use crate::keys::SigningCapability;

/// Chain access for an authenticated wallet.
pub struct ChainAdapter {
    config: ChainConfig,
    rpc: Arc<dyn ChainRpc>,
    timeout: Duration,
}

impl ChainAdapter {
    pub fn new(config: ChainConfig, rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            config,
            rpc,
            timeout: DEFAULT_RPC_TIMEOUT,
        }
    }

    /// Adapter over the configured HTTP endpoint.
    pub fn connect(config: ChainConfig) -> Self {
        let rpc = Arc::new(AlloyRpc::new(config.rpc_endpoint.clone()));
        Self::new(config, rpc)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Check that the endpoint serves the configured chain.
    pub async fn verify_chain_id(&self) -> Result<u64, ErrorKind> {
        let chain_id = self.rpc_call(self.rpc.chain_id()).await?;
        if chain_id != self.config.chain_id {
            tracing::warn!(
                expected = self.config.chain_id,
                actual = chain_id,
                "RPC endpoint serves a different chain"
            );
            return Err(ErrorKind::RpcUnavailable(format!(
                "endpoint serves chain {chain_id}, expected {}",
                self.config.chain_id
            )));
        }
        Ok(chain_id)
    }

    /// The capability's address, the only account of a session.
    pub fn get_accounts(&self, capability: &SigningCapability) -> Vec<Address> {
        vec![capability.address()]
    }

    pub async fn get_balance(&self, capability: &SigningCapability) -> Result<Balance, ErrorKind> {
        let address = capability.address();
        let wei = self.rpc_call(self.rpc.balance(address)).await?;

        tracing::debug!(%address, chain_id = self.config.chain_id, "Fetched balance");
        Ok(Balance {
            raw: wei.to_string(),
            formatted: format_amount(wei, NATIVE_DECIMALS),
            ticker: self.config.native_ticker.clone(),
        })
    }

    /// EIP-191 personal-message signature.
    pub fn sign_message(&self, capability: &SigningCapability, message: &[u8]) -> Result<Signature, ErrorKind> {
        capability.sign_message(message)
    }

    /// Build, sign and submit a legacy EIP-155 transaction.
    ///
    /// Without parameters this is a self-transfer of
    /// [`DEFAULT_TRANSFER_AMOUNT`] at the chain's current gas price.
    pub async fn send_transaction(
        &self,
        capability: &SigningCapability,
        params: Option<TxParams>,
    ) -> Result<SendResult, ErrorKind> {
        let params = params.unwrap_or_default();
        let from = capability.address();
        let to = params.to.unwrap_or(from);
        let value = parse_amount(
            params.value.as_deref().unwrap_or(DEFAULT_TRANSFER_AMOUNT),
            NATIVE_DECIMALS,
        )?;
        let input = params.data.unwrap_or_default();
        let gas_limit = match params.gas_limit {
            Some(0) => return Err(ErrorKind::InvalidParams("gas limit must be positive".to_string())),
            Some(limit) => limit,
            None if input.is_empty() => TRANSFER_GAS_LIMIT,
            None => {
                let request = TransactionRequest::default()
                    .from(from)
                    .to(to)
                    .value(value)
                    .input(input.clone().into());
                let estimate = self.rpc_call(self.rpc.estimate_gas(request)).await?;
                tracing::debug!(%from, %to, gas = estimate, "Estimated gas for call data");
                estimate
            }
        };

        let gas_price = match params.gas_price {
            Some(price) => price,
            None => self.rpc_call(self.rpc.gas_price()).await?,
        };
        let nonce = self.rpc_call(self.rpc.transaction_count(from)).await?;

        let balance = self.rpc_call(self.rpc.balance(from)).await?;
        let cost = U256::from(gas_limit)
            .checked_mul(U256::from(gas_price))
            .and_then(|fee| fee.checked_add(value))
            .ok_or_else(|| ErrorKind::InvalidParams("transaction cost overflows".to_string()))?;
        if cost > balance {
            tracing::info!(%from, %cost, %balance, "Rejecting transaction: insufficient funds");
            return Err(ErrorKind::InsufficientFunds(format!(
                "need {} {ticker}, have {} {ticker}",
                format_amount(cost, NATIVE_DECIMALS),
                format_amount(balance, NATIVE_DECIMALS),
                ticker = self.config.native_ticker,
            )));
        }

        let tx = TxLegacy {
            chain_id: Some(self.config.chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(to),
            value,
            input,
        };
        let signed = capability.sign_transaction(tx).inspect_err(|e| {
            if *e == ErrorKind::ProviderNotReady {
                tracing::info!(%from, "Session ended before signing; transaction dropped");
            }
        })?;
        let local_hash = *signed.hash();
        let encoded = TxEnvelope::from(signed).encoded_2718();

        if capability.ensure_active().is_err() {
            tracing::info!(%from, "Session ended before submission; transaction dropped");
            return Err(ErrorKind::ProviderNotReady);
        }

        let tx_hash = self.rpc_call(self.rpc.send_raw_transaction(Bytes::from(encoded))).await?;
        if tx_hash != local_hash {
            tracing::warn!(%tx_hash, %local_hash, "Endpoint reported a different transaction hash");
        }

        tracing::info!(
            %tx_hash,
            %from,
            %to,
            nonce,
            chain_id = self.config.chain_id,
            "Transaction submitted"
        );

        Ok(SendResult {
            tx_hash,
            status: TxStatus::Pending,
            explorer_url: self.config.explorer_tx_url(&tx_hash),
        })
    }

    /// Read-only contract call from the capability's address.
    pub async fn call(&self, capability: &SigningCapability, to: Address, data: Bytes) -> Result<Bytes, ErrorKind> {
        let request = TransactionRequest::default()
            .from(capability.address())
            .to(to)
            .input(data.into());
        self.rpc_call(self.rpc.call(request)).await
    }

    /// Inclusion status of a submitted transaction.
    pub async fn transaction_status(&self, tx_hash: B256) -> Result<TxStatus, ErrorKind> {
        let receipt = self.rpc_call(self.rpc.transaction_receipt(tx_hash)).await?;
        Ok(match receipt {
            None => TxStatus::Pending,
            Some(r) if r.success => TxStatus::Confirmed {
                block_number: r.block_number,
            },
            Some(r) => TxStatus::Failed {
                block_number: r.block_number,
            },
        })
    }

    async fn rpc_call<T, F>(&self, call: F) -> Result<T, ErrorKind>
    where
        F: Future<Output = Result<T, RpcFailure>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|failure| {
                tracing::warn!(error = %failure, chain_id = self.config.chain_id, "Chain RPC call failed");
                ErrorKind::from(failure)
            }),
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Chain RPC call timed out");
                Err(ErrorKind::RpcUnavailable(format!(
                    "no response within {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}
