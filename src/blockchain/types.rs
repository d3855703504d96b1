// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain configuration and wallet operation result types.

use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use url::Url;

/// Decimals of the native currency on EVM chains.
pub const NATIVE_DECIMALS: u8 = 18;

/// Gas limit of a plain value transfer.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Value of the default self-transfer, in native units.
pub const DEFAULT_TRANSFER_AMOUNT: &str = "0.0001";

/// Target chain configuration. Loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// EIP-155 chain id
    pub chain_id: u64,
    /// JSON-RPC endpoint
    pub rpc_endpoint: Url,
    /// Native currency ticker (e.g. "tRBTC")
    pub native_ticker: String,
    /// Network name for display
    pub display_name: String,
    /// Block explorer base URL
    pub block_explorer_url: Option<String>,
}

impl ChainConfig {
    /// Explorer link for a transaction, if an explorer is configured.
    pub fn explorer_tx_url(&self, tx_hash: &B256) -> Option<String> {
        self.block_explorer_url
            .as_ref()
            .map(|base| format!("{}/tx/{tx_hash}", base.trim_end_matches('/')))
    }
}

/// Native balance of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Balance in wei
    pub raw: String,
    /// Balance in native units, all significant decimals
    pub formatted: String,
    /// Native currency ticker
    pub ticker: String,
}

/// Optional overrides for `send_transaction`.
///
/// Unset fields fall back to a self-transfer of [`DEFAULT_TRANSFER_AMOUNT`]
/// with chain-default gas pricing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxParams {
    /// Recipient (defaults to the sender)
    #[serde(default)]
    pub to: Option<Address>,
    /// Amount in native units, decimal string (e.g. "0.5")
    #[serde(default)]
    pub value: Option<String>,
    /// Call data
    #[serde(default)]
    pub data: Option<Bytes>,
    /// Gas limit override
    #[serde(default)]
    pub gas_limit: Option<u64>,
    /// Gas price override in wei
    #[serde(default)]
    pub gas_price: Option<u128>,
}

impl TxParams {
    pub fn transfer(to: Address, value: impl Into<String>) -> Self {
        Self {
            to: Some(to),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: Bytes) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }
}

/// Status of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TxStatus {
    /// Accepted by the endpoint, not yet in a block
    Pending,
    /// Included and succeeded
    Confirmed { block_number: u64 },
    /// Included and reverted
    Failed { block_number: u64 },
}

/// Result of `send_transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub tx_hash: B256,
    /// Always `Pending` at submission
    pub status: TxStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

/// Receipt fields the adapter needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub block_number: u64,
    pub success: bool,
}

/// Per-operation wallet output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WalletQueryResult {
    Accounts { accounts: Vec<Address> },
    Balance { balance: String, ticker: String },
    Signature { signature: Bytes },
    Transaction { tx_hash: B256, status: TxStatus },
}

impl From<Vec<Address>> for WalletQueryResult {
    fn from(accounts: Vec<Address>) -> Self {
        WalletQueryResult::Accounts { accounts }
    }
}

impl From<Balance> for WalletQueryResult {
    fn from(balance: Balance) -> Self {
        WalletQueryResult::Balance {
            balance: balance.formatted,
            ticker: balance.ticker,
        }
    }
}

impl From<SendResult> for WalletQueryResult {
    fn from(result: SendResult) -> Self {
        WalletQueryResult::Transaction {
            tx_hash: result.tx_hash,
            status: result.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(explorer: Option<&str>) -> ChainConfig {
        ChainConfig {
            chain_id: 31,
            rpc_endpoint: "https://public-node.testnet.rsk.co".parse().unwrap(),
            native_ticker: "tRBTC".to_string(),
            display_name: "Rootstock Testnet".to_string(),
            block_explorer_url: explorer.map(str::to_string),
        }
    }

    #[test]
    fn explorer_url_joins_hash() {
        let hash = B256::repeat_byte(0xab);
        let url = config(Some("https://rootstock-testnet.blockscout.com/"))
            .explorer_tx_url(&hash)
            .unwrap();
        assert_eq!(url, format!("https://rootstock-testnet.blockscout.com/tx/{hash}"));
        assert!(config(None).explorer_tx_url(&hash).is_none());
    }

    #[test]
    fn query_results_are_tagged() {
        let result = WalletQueryResult::from(Balance {
            raw: "1500000000000000000".to_string(),
            formatted: "1.5".to_string(),
            ticker: "tRBTC".to_string(),
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "balance");
        assert_eq!(json["balance"], "1.5");
    }

    #[test]
    fn tx_status_serializes_state() {
        let json = serde_json::to_value(TxStatus::Confirmed { block_number: 7 }).unwrap();
        assert_eq!(json["state"], "confirmed");
        assert_eq!(json["block_number"], 7);
    }

    #[test]
    fn tx_params_builders() {
        let to = Address::repeat_byte(1);
        let params = TxParams::transfer(to, "0.5").with_gas_limit(30_000).with_gas_price(5);
        assert_eq!(params.to, Some(to));
        assert_eq!(params.value.as_deref(), Some("0.5"));
        assert_eq!(params.gas_limit, Some(30_000));
        assert_eq!(params.gas_price, Some(5));
        assert!(params.data.is_none());
    }
}
