// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local identity token validation.
//!
//! The verifier decodes the JWT envelope and checks expiry, audience and
//! (optionally) issuer against the current time. It never contacts the
//! identity provider: signature trust is established by the key nodes, each of
//! which validates the token against its own verifier configuration before
//! releasing a share.

use chrono::{DateTime, Utc};

use super::claims::{IdentityClaims, IdentityProof, VerifiedClaim};
use crate::error::ErrorKind;

/// Validates identity tokens for one verifier and client audience.
#[derive(Debug, Clone)]
pub struct IdentityVerifier {
    verifier_id: String,
    audience: String,
    issuer: Option<String>,
}

impl IdentityVerifier {
    /// Create a verifier that accepts tokens issued for `audience`.
    pub fn new(verifier_id: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            verifier_id: verifier_id.into(),
            audience: audience.into(),
            issuer: None,
        }
    }

    /// Also require the `iss` claim to match.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn verifier_id(&self) -> &str {
        &self.verifier_id
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Validate `token` against the current time.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaim, ErrorKind> {
        self.verify_at(token, Utc::now())
    }

    /// Validate `token` as of `now`.
    ///
    /// Checks run in a fixed order: envelope, expiry, audience, issuer. An
    /// expired token is reported as expired whatever else is wrong with it.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedClaim, ErrorKind> {
        let claims = decode_claims(token)?;

        if claims.exp <= now.timestamp() {
            return Err(ErrorKind::TokenExpired);
        }

        match &claims.aud {
            Some(aud) if aud.contains(&self.audience) => {}
            _ => return Err(ErrorKind::AudienceMismatch),
        }

        if let Some(expected) = &self.issuer {
            if &claims.iss != expected {
                return Err(ErrorKind::IssuerMismatch);
            }
        }

        Ok(VerifiedClaim::from_claims(
            &self.verifier_id,
            claims,
            IdentityProof::new(token),
        ))
    }
}

/// Decode a JWT's claims without checking its signature.
pub(crate) fn decode_claims(token: &str) -> Result<IdentityClaims, ErrorKind> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(ErrorKind::InvalidTokenFormat(format!(
            "expected 3 non-empty segments, found {}",
            segments.iter().filter(|s| !s.is_empty()).count()
        )));
    }

    let token_data = jsonwebtoken::dangerous::insecure_decode::<IdentityClaims>(token)
        .map_err(|e| ErrorKind::InvalidTokenFormat(e.to_string()))?;

    let claims = token_data.claims;
    if claims.sub.trim().is_empty() {
        return Err(ErrorKind::InvalidTokenFormat("empty subject".to_string()));
    }

    Ok(claims)
}
