// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shamir secret sharing over the secp256k1 scalar field.
//!
//! A secret `s` is the constant term of a random polynomial
//! `f(x) = s + a_1*x + ... + a_{t-1}*x^{t-1}`. Node `i` holds `f(i)`; any `t`
//! points recover `f(0)` by Lagrange interpolation, fewer reveal nothing.

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::{Field, PrimeField};
use k256::{AffinePoint, ProjectivePoint, Scalar};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

/// A share `(x, f(x))`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SharePoint {
    /// Node index (non-zero)
    pub x: u32,
    pub y: Scalar,
}

impl std::fmt::Debug for SharePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharePoint")
            .field("x", &self.x)
            .field("y", &"<redacted>")
            .finish()
    }
}

/// Errors from share arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShamirError {
    #[error("Threshold must be between 1 and {total}, got {threshold}")]
    InvalidThreshold { threshold: usize, total: usize },

    #[error("Cannot interpolate with zero shares")]
    NoShares,

    #[error("Share index {0} is zero or duplicated")]
    InvalidIndex(u32),

    #[error("Share is not a canonical scalar")]
    NonCanonicalScalar,
}

/// Random polynomial with the secret as constant term.
struct Polynomial {
    coefficients: Vec<Scalar>,
}

impl Polynomial {
    fn random<R: RngCore + CryptoRng>(secret: Scalar, threshold: usize, rng: &mut R) -> Self {
        let mut coefficients = Vec::with_capacity(threshold);
        coefficients.push(secret);
        for _ in 1..threshold {
            coefficients.push(Scalar::random(&mut *rng));
        }
        Self { coefficients }
    }

    /// Horner evaluation.
    fn evaluate(&self, x: Scalar) -> Scalar {
        self.coefficients
            .iter()
            .rev()
            .fold(Scalar::ZERO, |acc, coeff| acc * x + coeff)
    }
}

impl Drop for Polynomial {
    fn drop(&mut self) {
        for coeff in self.coefficients.iter_mut() {
            coeff.zeroize();
        }
    }
}

/// Split `secret` into `total` shares at indices `1..=total`, any `threshold`
/// of which reconstruct it.
pub fn split<R: RngCore + CryptoRng>(
    secret: &Scalar,
    threshold: usize,
    total: usize,
    rng: &mut R,
) -> Result<Vec<SharePoint>, ShamirError> {
    if threshold == 0 || threshold > total || total > u32::MAX as usize {
        return Err(ShamirError::InvalidThreshold { threshold, total });
    }

    let polynomial = Polynomial::random(*secret, threshold, rng);
    Ok((1..=total as u32)
        .map(|x| SharePoint {
            x,
            y: polynomial.evaluate(Scalar::from(x as u64)),
        })
        .collect())
}

/// Recover `f(0)` from the given points.
pub fn interpolate_at_zero(points: &[SharePoint]) -> Result<Scalar, ShamirError> {
    if points.is_empty() {
        return Err(ShamirError::NoShares);
    }

    let mut secret = Scalar::ZERO;
    for (i, point_i) in points.iter().enumerate() {
        if point_i.x == 0 {
            return Err(ShamirError::InvalidIndex(0));
        }
        let x_i = Scalar::from(point_i.x as u64);

        // L_i(0) = prod_{j != i} x_j / (x_j - x_i)
        let mut numerator = Scalar::ONE;
        let mut denominator = Scalar::ONE;
        for (j, point_j) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            if point_j.x == point_i.x {
                return Err(ShamirError::InvalidIndex(point_j.x));
            }
            let x_j = Scalar::from(point_j.x as u64);
            numerator *= x_j;
            denominator *= x_j - x_i;
        }

        let inverse = Option::<Scalar>::from(denominator.invert())
            .ok_or(ShamirError::InvalidIndex(point_i.x))?;
        secret += point_i.y * numerator * inverse;
    }

    Ok(secret)
}

/// Parse a 32-byte big-endian scalar.
pub fn scalar_from_bytes(bytes: &[u8]) -> Result<Scalar, ShamirError> {
    let array: [u8; 32] = bytes.try_into().map_err(|_| ShamirError::NonCanonicalScalar)?;
    Option::<Scalar>::from(Scalar::from_repr(array.into())).ok_or(ShamirError::NonCanonicalScalar)
}

/// Compressed SEC1 public key for `secret * G`.
pub fn public_key_for(secret: &Scalar) -> Vec<u8> {
    AffinePoint::from(ProjectivePoint::GENERATOR * secret)
        .to_encoded_point(true)
        .as_bytes()
        .to_vec()
}
