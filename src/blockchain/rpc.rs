// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain JSON-RPC access.
//!
//! [`ChainRpc`] is the narrow set of calls the wallet makes. [`AlloyRpc`]
//! serves it over HTTP; tests use [`MemoryChain`](super::memory::MemoryChain).

use alloy::{
    network::Ethereum,
    primitives::{Address, Bytes, B256, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::TransactionRequest,
    transports::{RpcError, TransportErrorKind},
};
use async_trait::async_trait;
use url::Url;

use super::types::ReceiptSummary;
use crate::error::ErrorKind;

/// HTTP provider type (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// How an RPC call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcFailure {
    /// Endpoint unreachable, timed out or answered garbage.
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),

    /// Endpoint answered with a JSON-RPC error object.
    #[error("error response {code}: {message}")]
    Rejected { code: i64, message: String },
}

impl From<RpcFailure> for ErrorKind {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Unavailable(reason) => ErrorKind::RpcUnavailable(reason),
            RpcFailure::Rejected { message, .. } if is_insufficient_funds(&message) => {
                ErrorKind::InsufficientFunds(message)
            }
            RpcFailure::Rejected { code, message } => ErrorKind::ChainError { code, message },
        }
    }
}

fn is_insufficient_funds(message: &str) -> bool {
    message.to_ascii_lowercase().contains("insufficient funds")
}

impl From<RpcError<TransportErrorKind>> for RpcFailure {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match err {
            RpcError::ErrorResp(payload) => RpcFailure::Rejected {
                code: payload.code,
                message: payload.message.to_string(),
            },
            other => RpcFailure::Unavailable(other.to_string()),
        }
    }
}

/// Chain calls used by the wallet.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn chain_id(&self) -> Result<u64, RpcFailure>;

    /// Native balance in wei at the latest block.
    async fn balance(&self, address: Address) -> Result<U256, RpcFailure>;

    /// Next nonce, counting pending transactions.
    async fn transaction_count(&self, address: Address) -> Result<u64, RpcFailure>;

    async fn gas_price(&self) -> Result<u128, RpcFailure>;

    /// Read-only call (`eth_call`).
    async fn call(&self, request: TransactionRequest) -> Result<Bytes, RpcFailure>;

    /// Gas needed to execute `request` (`eth_estimateGas`).
    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64, RpcFailure>;

    /// Submit a signed EIP-2718 encoded transaction; returns its hash.
    async fn send_raw_transaction(&self, encoded: Bytes) -> Result<B256, RpcFailure>;

    /// `None` until the transaction is mined.
    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<ReceiptSummary>, RpcFailure>;
}

/// [`ChainRpc`] over an HTTP JSON-RPC endpoint.
pub struct AlloyRpc {
    provider: HttpProvider,
}

impl AlloyRpc {
    pub fn new(endpoint: Url) -> Self {
        let provider = ProviderBuilder::new().connect_http(endpoint);
        Self { provider }
    }
}

#[async_trait]
impl ChainRpc for AlloyRpc {
    async fn chain_id(&self) -> Result<u64, RpcFailure> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn balance(&self, address: Address) -> Result<U256, RpcFailure> {
        Ok(self.provider.get_balance(address).await?)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, RpcFailure> {
        Ok(self.provider.get_transaction_count(address).pending().await?)
    }

    async fn gas_price(&self) -> Result<u128, RpcFailure> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn call(&self, request: TransactionRequest) -> Result<Bytes, RpcFailure> {
        Ok(self.provider.call(request).await?)
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64, RpcFailure> {
        Ok(self.provider.estimate_gas(request).await?)
    }

    async fn send_raw_transaction(&self, encoded: Bytes) -> Result<B256, RpcFailure> {
        let pending = self.provider.send_raw_transaction(&encoded).await?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<ReceiptSummary>, RpcFailure> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(|r| ReceiptSummary {
            block_number: r.block_number.unwrap_or(0),
            success: r.status(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use alloy::rpc::json_rpc::ErrorPayload;

    use super::*;

    #[test]
    fn error_responses_become_chain_errors() {
        let kind = ErrorKind::from(RpcFailure::Rejected {
            code: -32000,
            message: "nonce too low".to_string(),
        });
        assert_eq!(
            kind,
            ErrorKind::ChainError {
                code: -32000,
                message: "nonce too low".to_string()
            }
        );
    }

    #[test]
    fn insufficient_funds_is_recognized() {
        let kind = ErrorKind::from(RpcFailure::Rejected {
            code: -32010,
            message: "Insufficient funds for gas * price + value".to_string(),
        });
        assert!(matches!(kind, ErrorKind::InsufficientFunds(_)));
    }

    #[test]
    fn transport_failures_are_unavailable() {
        let kind = ErrorKind::from(RpcFailure::Unavailable("connection refused".to_string()));
        assert_eq!(kind, ErrorKind::RpcUnavailable("connection refused".to_string()));

        let failure = RpcFailure::from(RpcError::<TransportErrorKind>::NullResp);
        assert!(matches!(failure, RpcFailure::Unavailable(_)));
    }

    #[test]
    fn error_payload_keeps_code_and_message() {
        let payload: ErrorPayload =
            serde_json::from_str(r#"{"code":-32602,"message":"invalid argument"}"#).unwrap();
        let failure = RpcFailure::from(RpcError::<TransportErrorKind>::ErrorResp(payload));
        assert_eq!(
            failure,
            RpcFailure::Rejected {
                code: -32602,
                message: "invalid argument".to_string()
            }
        );
    }
}
