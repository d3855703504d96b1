// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM chain integration.
//!
//! This module provides functionality for:
//! - Querying the native balance of the session account
//! - EIP-191 message signing
//! - Building, signing and broadcasting legacy transactions
//! - Read-only contract calls and receipt lookups

pub mod adapter;
pub mod memory;
pub mod rpc;
pub mod types;
pub mod units;

pub use adapter::ChainAdapter;
pub use memory::MemoryChain;
pub use rpc::{AlloyRpc, ChainRpc, RpcFailure};
pub use types::*;
