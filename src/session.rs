// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login session lifecycle.
//!
//! ```text
//! Unauthenticated --login--> Authenticating --ok--> Authenticated
//!        ^                          |                     |
//!        +-------- failure ---------+                     |
//!        +------------------- logout / expiry ------------+
//! ```
//!
//! At most one login runs at a time; a second one fails with
//! `LoginInProgress` instead of queuing. The capability exists only while
//! the session is `Authenticated`. Logout, re-login and expiry revoke it, so
//! an operation already holding it fails with `ProviderNotReady` at its next
//! signing step.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::{IdentityVerifier, UserInfo, VerifiedClaim};
use crate::error::{ErrorKind, Operation, OperationContext, WalletError};
use crate::keys::{KeyReconstructionClient, SigningCapability};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated => "authenticated",
        })
    }
}

/// How long an authenticated session lasts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpiryPolicy {
    /// Ends when the identity token's `exp` passes.
    #[default]
    TokenLifetime,
    /// Lasts until logout.
    Indefinite,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Default)]
struct Session {
    state: SessionState,
    capability: Option<Arc<SigningCapability>>,
    user: Option<UserInfo>,
    expires_at: Option<i64>,
}

impl Session {
    /// Revokes the capability so shared handles held by in-flight
    /// operations stop signing too.
    fn clear(&mut self) {
        self.state = SessionState::Unauthenticated;
        if let Some(capability) = self.capability.take() {
            capability.revoke();
        }
        self.user = None;
        self.expires_at = None;
    }
}

/// Resets an abandoned login back to `Unauthenticated`.
struct LoginGuard<'a> {
    session: &'a Mutex<Session>,
    armed: bool,
}

impl LoginGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LoginGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if session.state == SessionState::Authenticating {
            session.clear();
            tracing::warn!("Login abandoned before completion");
        }
    }
}

/// Owns the session and, while authenticated, its signing capability.
pub struct SessionManager {
    verifier: IdentityVerifier,
    keys: KeyReconstructionClient,
    expiry: ExpiryPolicy,
    clock: Clock,
    session: Mutex<Session>,
}

impl SessionManager {
    pub fn new(verifier: IdentityVerifier, keys: KeyReconstructionClient) -> Self {
        Self {
            verifier,
            keys,
            expiry: ExpiryPolicy::default(),
            clock: Arc::new(Utc::now),
            session: Mutex::new(Session::default()),
        }
    }

    pub fn with_expiry_policy(mut self, expiry: ExpiryPolicy) -> Self {
        self.expiry = expiry;
        self
    }

    /// Replace the wall clock used for token and session expiry.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn verifier(&self) -> &IdentityVerifier {
        &self.verifier
    }

    pub fn status(&self) -> SessionState {
        let mut session = self.lock();
        self.expire_if_due(&mut session);
        session.state
    }

    /// Account of the authenticated session.
    pub fn address(&self) -> Option<Address> {
        self.capability().ok().map(|c| c.address())
    }

    /// Verify `raw_token`, reconstruct its key and authenticate the session.
    ///
    /// Logging in while authenticated replaces the session; if the new login
    /// fails the session ends up unauthenticated.
    pub async fn login(&self, raw_token: &str) -> Result<Address, WalletError> {
        let guard = self.begin_login().during(Operation::Login)?;
        let result = self.authenticate(raw_token).await;
        guard.disarm();

        let mut session = self.lock();
        match result {
            Ok((capability, claim)) => {
                let address = capability.address();
                tracing::info!(
                    %address,
                    verifier = %claim.verifier(),
                    subject = %claim.subject_fingerprint(),
                    "Login succeeded"
                );
                session.state = SessionState::Authenticated;
                session.capability = Some(Arc::new(capability));
                session.user = Some(UserInfo::from(&claim));
                session.expires_at = Some(claim.expires_at());
                Ok(address)
            }
            Err(kind) => {
                session.clear();
                if kind.is_token_error() {
                    tracing::info!(
                        error_code = kind.error_code(),
                        error = %kind,
                        "Login refused: identity token invalid"
                    );
                } else {
                    tracing::warn!(error_code = kind.error_code(), error = %kind, "Login failed");
                }
                Err(WalletError::new(Operation::Login, kind))
            }
        }
    }

    /// End the session and drop its capability.
    ///
    /// Idempotent when already unauthenticated.
    pub fn logout(&self) -> Result<(), WalletError> {
        let mut session = self.lock();
        match session.state {
            SessionState::Authenticating => Err(WalletError::new(Operation::Logout, ErrorKind::LoginInProgress)),
            SessionState::Authenticated => {
                session.clear();
                tracing::info!("Logged out");
                Ok(())
            }
            SessionState::Unauthenticated => Ok(()),
        }
    }

    /// Identity of the authenticated user.
    pub fn user_info(&self) -> Result<UserInfo, WalletError> {
        let mut session = self.lock();
        self.expire_if_due(&mut session);
        match (session.state, &session.user) {
            (SessionState::Authenticated, Some(user)) => Ok(user.clone()),
            _ => Err(WalletError::new(Operation::UserInfo, ErrorKind::ProviderNotReady)),
        }
    }

    /// Capability of the authenticated session.
    pub(crate) fn capability(&self) -> Result<Arc<SigningCapability>, ErrorKind> {
        let mut session = self.lock();
        self.expire_if_due(&mut session);
        match (session.state, &session.capability) {
            (SessionState::Authenticated, Some(capability)) => Ok(Arc::clone(capability)),
            _ => Err(ErrorKind::ProviderNotReady),
        }
    }

    fn begin_login(&self) -> Result<LoginGuard<'_>, ErrorKind> {
        let mut session = self.lock();
        match session.state {
            SessionState::Authenticating => return Err(ErrorKind::LoginInProgress),
            SessionState::Authenticated => tracing::info!("Re-authenticating; discarding current session"),
            SessionState::Unauthenticated => {}
        }
        session.clear();
        session.state = SessionState::Authenticating;

        Ok(LoginGuard {
            session: &self.session,
            armed: true,
        })
    }

    async fn authenticate(&self, raw_token: &str) -> Result<(SigningCapability, VerifiedClaim), ErrorKind> {
        let claim = self.verifier.verify_at(raw_token, (self.clock)())?;
        tracing::debug!(
            verifier = %claim.verifier(),
            subject = %claim.subject_fingerprint(),
            "Identity token verified"
        );
        let capability = self.keys.reconstruct(&claim, self.verifier.verifier_id()).await?;
        Ok((capability, claim))
    }

    fn expire_if_due(&self, session: &mut Session) {
        if self.expiry != ExpiryPolicy::TokenLifetime || session.state != SessionState::Authenticated {
            return;
        }
        let now = (self.clock)().timestamp();
        if session.expires_at.is_some_and(|exp| exp <= now) {
            session.clear();
            tracing::info!("Session expired with its identity token");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
