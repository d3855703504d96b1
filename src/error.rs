// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy shared by the verifier, key reconstruction, chain adapter
//! and session layers.
//!
//! Components fail with a bare [`ErrorKind`]. The session and wallet surface
//! wraps it in a [`WalletError`] that also names the failing [`Operation`].
//! No variant ever carries key material, shares or the raw identity token.

use std::fmt;

/// Failure kinds surfaced by wallet components.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// The identity token could not be decoded into header, claims and signature.
    #[error("Identity token is malformed: {0}")]
    InvalidTokenFormat(String),

    /// The identity token's `exp` is not in the future.
    #[error("Identity token has expired")]
    TokenExpired,

    /// The identity token was issued for another client.
    #[error("Identity token audience does not match")]
    AudienceMismatch,

    /// The identity token was issued by an unexpected issuer.
    #[error("Identity token issuer does not match")]
    IssuerMismatch,

    /// Key nodes refused to release shares for the claim.
    #[error("Key network rejected the claim: {0}")]
    ClaimRejected(String),

    /// Not enough consistent shares were gathered before the deadline.
    #[error("Key network quorum unreachable: {responded} of {required} required shares")]
    QuorumUnreachable { responded: usize, required: usize },

    /// No signing capability is established for the current session.
    #[error("Provider not ready: no authenticated session")]
    ProviderNotReady,

    /// The chain RPC endpoint could not be reached or timed out.
    #[error("Chain RPC unavailable: {0}")]
    RpcUnavailable(String),

    /// The chain RPC endpoint answered with an error response.
    #[error("Chain error {code}: {message}")]
    ChainError { code: i64, message: String },

    /// The account cannot cover value plus fees.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// A login is already running for this session.
    #[error("A login is already in progress")]
    LoginInProgress,

    /// Caller supplied parameters that cannot be turned into a transaction.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// The signing capability could not produce a signature.
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

impl ErrorKind {
    /// Stable machine-readable code for this kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidTokenFormat(_) => "invalid_token_format",
            ErrorKind::TokenExpired => "token_expired",
            ErrorKind::AudienceMismatch => "audience_mismatch",
            ErrorKind::IssuerMismatch => "issuer_mismatch",
            ErrorKind::ClaimRejected(_) => "claim_rejected",
            ErrorKind::QuorumUnreachable { .. } => "quorum_unreachable",
            ErrorKind::ProviderNotReady => "provider_not_ready",
            ErrorKind::RpcUnavailable(_) => "rpc_unavailable",
            ErrorKind::ChainError { .. } => "chain_error",
            ErrorKind::InsufficientFunds(_) => "insufficient_funds",
            ErrorKind::LoginInProgress => "login_in_progress",
            ErrorKind::InvalidParams(_) => "invalid_params",
            ErrorKind::SigningFailed(_) => "signing_failed",
        }
    }

    /// Whether this failure came from identity token validation.
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidTokenFormat(_)
                | ErrorKind::TokenExpired
                | ErrorKind::AudienceMismatch
                | ErrorKind::IssuerMismatch
        )
    }
}

/// Operation names attached to surfaced errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Login,
    Logout,
    UserInfo,
    GetAccounts,
    GetBalance,
    SignMessage,
    SendTransaction,
    Call,
    TransactionStatus,
    VerifyChain,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Login => "login",
            Operation::Logout => "logout",
            Operation::UserInfo => "user_info",
            Operation::GetAccounts => "get_accounts",
            Operation::GetBalance => "get_balance",
            Operation::SignMessage => "sign_message",
            Operation::SendTransaction => "send_transaction",
            Operation::Call => "call",
            Operation::TransactionStatus => "transaction_status",
            Operation::VerifyChain => "verify_chain",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned to callers of the session and wallet surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed: {kind}")]
pub struct WalletError {
    pub operation: Operation,
    #[source]
    pub kind: ErrorKind,
}

impl WalletError {
    pub fn new(operation: Operation, kind: ErrorKind) -> Self {
        Self { operation, kind }
    }

    pub fn error_code(&self) -> &'static str {
        self.kind.error_code()
    }
}

/// Attach an operation name to a component result.
pub(crate) trait OperationContext<T> {
    fn during(self, operation: Operation) -> Result<T, WalletError>;
}

impl<T> OperationContext<T> for Result<T, ErrorKind> {
    fn during(self, operation: Operation) -> Result<T, WalletError> {
        self.map_err(|kind| WalletError::new(operation, kind))
    }
}
