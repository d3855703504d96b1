// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Module
//!
//! Turns an identity token from an external OAuth popup flow into a
//! [`VerifiedClaim`].
//!
//! ## Flow
//!
//! 1. The frontend signs the user in with the identity provider
//! 2. The provider returns an OIDC identity token (JWT)
//! 3. [`IdentityVerifier`] decodes it and checks:
//!    - envelope structure (header, claims, signature)
//!    - `exp` is in the future
//!    - `aud` contains the configured client id
//!    - `iss` when an issuer is configured
//! 4. The resulting claim (`sub` + verifier name) is the only thing key
//!    reconstruction accepts
//!
//! Claim payloads are never exposed before validation succeeds.

pub mod claims;
pub mod verifier;

pub use claims::{Profile, UserInfo, VerifiedClaim};
pub use verifier::IdentityVerifier;
