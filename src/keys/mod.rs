// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Threshold key reconstruction.
//!
//! The signing key for `(verifier, subject)` is never stored whole. It is
//! split into Shamir shares held by independent key nodes; a login gathers a
//! quorum of shares and rebuilds the key into a [`SigningCapability`].

pub mod capability;
pub mod client;
pub mod http;
pub mod local;
pub mod node;
pub mod shamir;

pub use capability::SigningCapability;
pub use client::{KeyReconstructionClient, ReconstructionConfig};
pub use http::{http_nodes, HttpKeyNode};
pub use local::{LocalNetwork, LocalNode};
pub use node::{KeyNode, NodeError, ShareRequest, ShareResponse};
