// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SFA Wallet - Single-Factor Auth Wallet Core
//!
//! Binds a verified identity token from an OAuth/OIDC provider to a signing
//! key reconstructed from a threshold key network, then exposes wallet
//! operations on an EVM chain for that key.
//!
//! ## Modules
//!
//! - `auth` - Identity token verification
//! - `keys` - Threshold key reconstruction and the signing capability
//! - `blockchain` - EVM JSON-RPC chain adapter
//! - `session` - Login session lifecycle
//! - `wallet` - Session plus chain operations facade
//! - `config` - Environment configuration
//! - `telemetry` - Tracing setup

pub mod auth;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod keys;
pub mod session;
pub mod telemetry;
pub mod wallet;

pub use error::{ErrorKind, Operation, WalletError};
pub use session::{ExpiryPolicy, SessionManager, SessionState};
pub use wallet::Wallet;
