// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory EVM ledger for tests and local development.
//!
//! Accepts signed legacy transactions, checks chain id, nonce and funds the
//! way a node's mempool would, and holds them pending until [`MemoryChain::mine`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use alloy::{
    consensus::{SignableTransaction, TxEnvelope},
    eips::eip2718::Decodable2718,
    primitives::{Address, Bytes, TxKind, B256, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;

use super::rpc::{ChainRpc, RpcFailure};
use super::types::{ReceiptSummary, TRANSFER_GAS_LIMIT};

/// JSON-RPC code used by go-ethereum style nodes for rejected submissions.
const SERVER_ERROR: i64 = -32000;

pub const DEFAULT_GAS_PRICE: u128 = 60_000_000;

/// A submitted transaction awaiting inclusion.
#[derive(Debug, Clone)]
struct PendingTx {
    hash: B256,
    from: Address,
    to: Option<Address>,
    value: U256,
    fee: U256,
}

#[derive(Default)]
struct Ledger {
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    pending: Vec<PendingTx>,
    receipts: HashMap<B256, ReceiptSummary>,
    call_results: HashMap<Address, Bytes>,
    block_number: u64,
}

/// In-memory [`ChainRpc`].
pub struct MemoryChain {
    chain_id: u64,
    gas_price: Mutex<u128>,
    ledger: Mutex<Ledger>,
    offline: AtomicBool,
}

impl MemoryChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            gas_price: Mutex::new(DEFAULT_GAS_PRICE),
            ledger: Mutex::new(Ledger::default()),
            offline: AtomicBool::new(false),
        }
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fund(&self, address: Address, amount: U256) {
        *self.ledger().balances.entry(address).or_default() += amount;
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.ledger().balances.get(&address).copied().unwrap_or_default()
    }

    pub fn nonce_of(&self, address: Address) -> u64 {
        self.ledger().nonces.get(&address).copied().unwrap_or_default()
    }

    pub fn set_gas_price(&self, gas_price: u128) {
        *self.gas_price.lock().unwrap_or_else(PoisonError::into_inner) = gas_price;
    }

    /// Make every call fail as unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Canned `eth_call` result for a contract address.
    pub fn set_call_result(&self, to: Address, output: Bytes) {
        self.ledger().call_results.insert(to, output);
    }

    pub fn pending_count(&self) -> usize {
        self.ledger().pending.len()
    }

    /// Include every pending transaction in a new block; returns its number.
    pub fn mine(&self) -> u64 {
        let mut ledger = self.ledger();
        ledger.block_number += 1;
        let block_number = ledger.block_number;

        for tx in std::mem::take(&mut ledger.pending) {
            let from = ledger.balances.entry(tx.from).or_default();
            *from = from.saturating_sub(tx.fee + tx.value);
            if let Some(to) = tx.to {
                *ledger.balances.entry(to).or_default() += tx.value;
            }
            ledger.receipts.insert(
                tx.hash,
                ReceiptSummary {
                    block_number,
                    success: true,
                },
            );
        }
        block_number
    }

    fn check_online(&self) -> Result<(), RpcFailure> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RpcFailure::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn rejected(message: impl Into<String>) -> RpcFailure {
        RpcFailure::Rejected {
            code: SERVER_ERROR,
            message: message.into(),
        }
    }

    /// Base cost plus the per-byte calldata charge.
    fn intrinsic_gas(input: &[u8]) -> u64 {
        input.iter().fold(TRANSFER_GAS_LIMIT, |gas, byte| {
            gas + if *byte == 0 { 4 } else { 16 }
        })
    }

    /// Balance minus what pending transactions already spend.
    fn spendable(ledger: &Ledger, address: Address) -> U256 {
        let committed: U256 = ledger
            .pending
            .iter()
            .filter(|tx| tx.from == address)
            .map(|tx| tx.fee + tx.value)
            .fold(U256::ZERO, |acc, v| acc + v);
        ledger
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default()
            .saturating_sub(committed)
    }
}

#[async_trait]
impl ChainRpc for MemoryChain {
    async fn chain_id(&self) -> Result<u64, RpcFailure> {
        self.check_online()?;
        Ok(self.chain_id)
    }

    async fn balance(&self, address: Address) -> Result<U256, RpcFailure> {
        self.check_online()?;
        Ok(self.balance_of(address))
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, RpcFailure> {
        self.check_online()?;
        Ok(self.nonce_of(address))
    }

    async fn gas_price(&self) -> Result<u128, RpcFailure> {
        self.check_online()?;
        Ok(*self.gas_price.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn call(&self, request: TransactionRequest) -> Result<Bytes, RpcFailure> {
        self.check_online()?;
        let to = match request.to {
            Some(TxKind::Call(to)) => to,
            _ => return Err(Self::rejected("call requires a destination")),
        };
        Ok(self.ledger().call_results.get(&to).cloned().unwrap_or_default())
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64, RpcFailure> {
        self.check_online()?;
        if !matches!(request.to, Some(TxKind::Call(_))) {
            return Err(Self::rejected("estimate requires a destination"));
        }
        Ok(match request.input.input() {
            Some(input) => Self::intrinsic_gas(input),
            None => TRANSFER_GAS_LIMIT,
        })
    }

    async fn send_raw_transaction(&self, encoded: Bytes) -> Result<B256, RpcFailure> {
        self.check_online()?;

        let envelope = TxEnvelope::decode_2718(&mut encoded.as_ref())
            .map_err(|e| Self::rejected(format!("rlp: {e}")))?;
        let signed = match envelope {
            TxEnvelope::Legacy(signed) => signed,
            _ => return Err(Self::rejected("transaction type not supported")),
        };
        let from = signed
            .signature()
            .recover_address_from_prehash(&signed.tx().signature_hash())
            .map_err(|_| Self::rejected("invalid sender"))?;
        let tx = signed.tx();

        if tx.chain_id != Some(self.chain_id) {
            return Err(Self::rejected("invalid chain id"));
        }
        if tx.gas_limit < Self::intrinsic_gas(&tx.input) {
            return Err(Self::rejected("intrinsic gas too low"));
        }

        let mut ledger = self.ledger();
        let expected_nonce = ledger.nonces.get(&from).copied().unwrap_or_default();
        if tx.nonce < expected_nonce {
            return Err(Self::rejected("nonce too low"));
        }
        if tx.nonce > expected_nonce {
            return Err(Self::rejected("nonce too high"));
        }

        let fee = U256::from(tx.gas_limit) * U256::from(tx.gas_price);
        if Self::spendable(&ledger, from) < fee + tx.value {
            return Err(Self::rejected(format!(
                "insufficient funds for gas * price + value: address {from}"
            )));
        }

        let hash = *signed.hash();
        ledger.nonces.insert(from, expected_nonce + 1);
        ledger.pending.push(PendingTx {
            hash,
            from,
            to: tx.to.to().copied(),
            value: tx.value,
            fee,
        });
        tracing::debug!(%hash, %from, nonce = tx.nonce, "Accepted transaction");
        Ok(hash)
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<ReceiptSummary>, RpcFailure> {
        self.check_online()?;
        Ok(self.ledger().receipts.get(&tx_hash).copied())
    }
}
