// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity token claims and the validated claim handed to key reconstruction.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Claims decoded from an OIDC identity token.
///
/// Only read by the verifier. Everything downstream sees a [`VerifiedClaim`].
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IdentityClaims {
    /// Subject - the identity provider's stable user identifier
    pub sub: String,

    /// Issuer (e.g. `https://securetoken.google.com/<project>`)
    #[serde(default)]
    pub iss: String,

    /// Audience, a single string or an array
    #[serde(default)]
    pub aud: Option<Audience>,

    /// Expiration timestamp
    pub exp: i64,

    /// Issued at timestamp
    #[serde(default)]
    pub iat: Option<i64>,

    /// Provider-specific claims (email, name, picture, ...)
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// JWT `aud` claim.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub(crate) enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::One(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|a| a == expected),
        }
    }
}

impl IdentityClaims {
    fn extra_str(&self, key: &str) -> Option<String> {
        self.extra.get(key).and_then(|v| v.as_str()).map(str::to_string)
    }
}

/// The raw identity token, kept only to prove the claim to key nodes.
#[derive(Clone)]
pub(crate) struct IdentityProof(Zeroizing<String>);

impl IdentityProof {
    pub fn new(token: &str) -> Self {
        Self(Zeroizing::new(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for IdentityProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdentityProof(<redacted>)")
    }
}

/// Profile fields reported by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// A claim that passed structural, expiry, audience and issuer validation.
///
/// Only [`IdentityVerifier`](super::IdentityVerifier) constructs these.
#[derive(Debug, Clone)]
pub struct VerifiedClaim {
    subject: String,
    verifier: String,
    issuer: String,
    expires_at: i64,
    profile: Profile,
    proof: IdentityProof,
}

impl VerifiedClaim {
    pub(crate) fn from_claims(verifier: &str, claims: IdentityClaims, proof: IdentityProof) -> Self {
        let profile = Profile {
            email: claims.extra_str("email"),
            name: claims.extra_str("name"),
            picture: claims.extra_str("picture"),
        };

        Self {
            subject: claims.sub,
            verifier: verifier.to_string(),
            issuer: claims.iss,
            expires_at: claims.exp,
            profile,
            proof,
        }
    }

    /// Identity provider subject (the verifier id in key network terms).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Verifier name this claim was validated for.
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Token expiration (Unix timestamp).
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub(crate) fn proof(&self) -> &IdentityProof {
        &self.proof
    }

    /// Short, non-reversible subject tag for log fields.
    pub fn subject_fingerprint(&self) -> String {
        subject_fingerprint(&self.subject)
    }
}

pub(crate) fn subject_fingerprint(subject: &str) -> String {
    let digest = Sha256::digest(subject.as_bytes());
    alloy::hex::encode(&digest[..6])
}

/// User information for an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Verifier name
    pub verifier: String,
    /// Subject under that verifier
    pub verifier_id: String,
    /// Token issuer
    pub issuer: String,
    #[serde(flatten)]
    pub profile: Profile,
}

impl From<&VerifiedClaim> for UserInfo {
    fn from(claim: &VerifiedClaim) -> Self {
        Self {
            verifier: claim.verifier.clone(),
            verifier_id: claim.subject.clone(),
            issuer: claim.issuer.clone(),
            profile: claim.profile.clone(),
        }
    }
}
