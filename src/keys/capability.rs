// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing capability over a reconstructed key.
//!
//! The key only exists inside the wrapped signer. There is no accessor for the
//! raw bytes, no `Clone` and no serialization; the signer zeroizes its key when
//! the capability is dropped or revoked. A revoked capability keeps its address
//! but every signing attempt fails with `ProviderNotReady`.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy::{
    consensus::{SignableTransaction, Signed, TxLegacy},
    primitives::{Address, Signature, B256},
    signers::{local::PrivateKeySigner, SignerSync},
};
use k256::Scalar;
use zeroize::Zeroizing;

use crate::error::ErrorKind;

/// Handle that can sign for one reconstructed address.
pub struct SigningCapability {
    address: Address,
    signer: Mutex<Option<PrivateKeySigner>>,
}

impl SigningCapability {
    /// Wrap a reconstructed secret scalar.
    pub(crate) fn from_secret(secret: &Scalar) -> Result<Self, ErrorKind> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        bytes.copy_from_slice(&secret.to_bytes());
        let signer = PrivateKeySigner::from_slice(bytes.as_slice())
            .map_err(|e| ErrorKind::SigningFailed(format!("reconstructed key is invalid: {e}")))?;
        Ok(Self {
            address: signer.address(),
            signer: Mutex::new(Some(signer)),
        })
    }

    /// Address derived from the capability's public key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a raw 32-byte digest.
    pub fn sign_digest(&self, digest: &B256) -> Result<Signature, ErrorKind> {
        let guard = self.signer();
        let signer = guard.as_ref().ok_or(ErrorKind::ProviderNotReady)?;
        signer
            .sign_hash_sync(digest)
            .map_err(|e| ErrorKind::SigningFailed(e.to_string()))
    }

    /// Sign `message` as an EIP-191 personal message.
    pub fn sign_message(&self, message: &[u8]) -> Result<Signature, ErrorKind> {
        let guard = self.signer();
        let signer = guard.as_ref().ok_or(ErrorKind::ProviderNotReady)?;
        signer
            .sign_message_sync(message)
            .map_err(|e| ErrorKind::SigningFailed(e.to_string()))
    }

    /// Sign a legacy transaction (EIP-155 when `chain_id` is set).
    pub fn sign_transaction(&self, tx: TxLegacy) -> Result<Signed<TxLegacy>, ErrorKind> {
        let signature = self.sign_digest(&tx.signature_hash())?;
        Ok(tx.into_signed(signature))
    }

    /// Drop the key. Holders of a shared handle lose signing at once.
    pub(crate) fn revoke(&self) {
        self.signer().take();
    }

    pub fn is_revoked(&self) -> bool {
        self.signer().is_none()
    }

    /// `ProviderNotReady` once the capability has been revoked.
    pub fn ensure_active(&self) -> Result<(), ErrorKind> {
        if self.is_revoked() {
            return Err(ErrorKind::ProviderNotReady);
        }
        Ok(())
    }

    fn signer(&self) -> MutexGuard<'_, Option<PrivateKeySigner>> {
        self.signer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SigningCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCapability")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
