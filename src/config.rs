// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the wallet. Configuration is loaded from the environment once
//! at startup and is immutable afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SFA_CLIENT_ID` | Application client id, expected token audience | Required |
//! | `SFA_VERIFIER_ID` | Verifier name registered with the key network | Required |
//! | `SFA_CHAIN_ID` | EIP-155 chain id, decimal or `0x` hex | Required |
//! | `SFA_RPC_ENDPOINT` | Chain JSON-RPC URL | Required |
//! | `SFA_NATIVE_TICKER` | Native currency ticker | Required |
//! | `SFA_DISPLAY_NAME` | Network display name | Required |
//! | `SFA_BLOCK_EXPLORER_URL` | Explorer base URL | Optional |
//! | `SFA_TOKEN_ISSUER` | Expected identity token issuer | Optional |
//! | `SFA_KEY_NODES` | Comma-separated key node URLs | Optional |
//! | `SFA_KEY_THRESHOLD` | Shares required to rebuild a key | Required with `SFA_KEY_NODES` |
//! | `SFA_NODE_TIMEOUT_MS` | Per-node request timeout | `5000` |
//! | `SFA_QUORUM_TIMEOUT_MS` | Overall share gathering timeout | `15000` |
//! | `SFA_RPC_TIMEOUT_MS` | Chain RPC call timeout | `10000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::time::Duration;

use url::Url;

use crate::blockchain::ChainConfig;
use crate::keys::ReconstructionConfig;
use crate::telemetry::LogFormat;

/// Application client id. Identity tokens must carry it in `aud`.
pub const CLIENT_ID_ENV: &str = "SFA_CLIENT_ID";

/// Verifier name the key network knows this application's tokens by.
pub const VERIFIER_ID_ENV: &str = "SFA_VERIFIER_ID";

pub const CHAIN_ID_ENV: &str = "SFA_CHAIN_ID";
pub const RPC_ENDPOINT_ENV: &str = "SFA_RPC_ENDPOINT";
pub const NATIVE_TICKER_ENV: &str = "SFA_NATIVE_TICKER";
pub const DISPLAY_NAME_ENV: &str = "SFA_DISPLAY_NAME";
pub const BLOCK_EXPLORER_URL_ENV: &str = "SFA_BLOCK_EXPLORER_URL";

/// Expected `iss` claim. When unset any issuer is accepted.
pub const TOKEN_ISSUER_ENV: &str = "SFA_TOKEN_ISSUER";

/// Key node endpoints, in node index order.
pub const KEY_NODES_ENV: &str = "SFA_KEY_NODES";
pub const KEY_THRESHOLD_ENV: &str = "SFA_KEY_THRESHOLD";
pub const NODE_TIMEOUT_MS_ENV: &str = "SFA_NODE_TIMEOUT_MS";
pub const QUORUM_TIMEOUT_MS_ENV: &str = "SFA_QUORUM_TIMEOUT_MS";

/// Timeout applied to every chain RPC call.
///
/// # Default
/// `10000`
pub const RPC_TIMEOUT_MS_ENV: &str = "SFA_RPC_TIMEOUT_MS";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration loading errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Key network endpoints and reconstruction tuning.
#[derive(Debug, Clone)]
pub struct KeyNetworkConfig {
    pub nodes: Vec<Url>,
    pub reconstruction: ReconstructionConfig,
}

/// Complete wallet configuration.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub client_id: String,
    pub verifier_id: String,
    pub token_issuer: Option<String>,
    pub chain: ChainConfig,
    pub key_network: Option<KeyNetworkConfig>,
    pub rpc_timeout: Duration,
    pub log_format: LogFormat,
}

impl WalletConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let chain = ChainConfig {
            chain_id: parse_chain_id(&vars.required(CHAIN_ID_ENV)?)?,
            rpc_endpoint: parse_url(RPC_ENDPOINT_ENV, &vars.required(RPC_ENDPOINT_ENV)?)?,
            native_ticker: vars.required(NATIVE_TICKER_ENV)?,
            display_name: vars.required(DISPLAY_NAME_ENV)?,
            block_explorer_url: vars.optional(BLOCK_EXPLORER_URL_ENV),
        };

        let key_network = match vars.optional(KEY_NODES_ENV) {
            Some(list) => Some(key_network(&vars, &list)?),
            None => None,
        };

        let log_format = match vars.optional(LOG_FORMAT_ENV) {
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                name: LOG_FORMAT_ENV,
                reason,
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            client_id: vars.required(CLIENT_ID_ENV)?,
            verifier_id: vars.required(VERIFIER_ID_ENV)?,
            token_issuer: vars.optional(TOKEN_ISSUER_ENV),
            chain,
            key_network,
            rpc_timeout: vars.millis(RPC_TIMEOUT_MS_ENV)?.unwrap_or(DEFAULT_RPC_TIMEOUT),
            log_format,
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value; blank counts as unset.
    fn optional(&self, name: &'static str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn millis(&self, name: &'static str) -> Result<Option<Duration>, ConfigError> {
        self.optional(name)
            .map(|v| {
                v.parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|e| ConfigError::Invalid {
                        name,
                        reason: e.to_string(),
                    })
            })
            .transpose()
    }
}

fn key_network<F>(vars: &Vars<'_, F>, list: &str) -> Result<KeyNetworkConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let nodes = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_url(KEY_NODES_ENV, s))
        .collect::<Result<Vec<_>, _>>()?;

    let threshold = vars
        .required(KEY_THRESHOLD_ENV)?
        .parse::<usize>()
        .map_err(|e| ConfigError::Invalid {
            name: KEY_THRESHOLD_ENV,
            reason: e.to_string(),
        })?;
    if threshold == 0 || threshold > nodes.len() {
        return Err(ConfigError::Invalid {
            name: KEY_THRESHOLD_ENV,
            reason: format!("{threshold} is not satisfiable by {} nodes", nodes.len()),
        });
    }

    let mut reconstruction = ReconstructionConfig::new(threshold);
    if let Some(timeout) = vars.millis(NODE_TIMEOUT_MS_ENV)? {
        reconstruction.node_timeout = timeout;
    }
    if let Some(timeout) = vars.millis(QUORUM_TIMEOUT_MS_ENV)? {
        reconstruction.quorum_timeout = timeout;
    }

    Ok(KeyNetworkConfig { nodes, reconstruction })
}

/// Parse a chain id given as decimal (`31`) or hex (`0x1f`).
pub fn parse_chain_id(value: &str) -> Result<u64, ConfigError> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    };
    parsed.map_err(|e| ConfigError::Invalid {
        name: CHAIN_ID_ENV,
        reason: format!("`{value}`: {e}"),
    })
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("`{value}`: {e}"),
    })
}
