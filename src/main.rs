// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Command-line demo: log in with `SFA_ID_TOKEN`, then exercise every wallet
//! operation once and print the results as JSON lines.

use std::env;
use std::process::ExitCode;

use sfa_wallet::blockchain::WalletQueryResult;
use sfa_wallet::config::WalletConfig;
use sfa_wallet::telemetry::init_tracing;
use sfa_wallet::Wallet;

/// Identity token obtained from the provider's sign-in flow.
const ID_TOKEN_ENV: &str = "SFA_ID_TOKEN";

/// Set to `1` to also submit the default self-transfer.
const SEND_TX_ENV: &str = "SFA_SEND_TX";

const DEMO_MESSAGE: &str = "Sign in to SFA Wallet";

#[tokio::main]
async fn main() -> ExitCode {
    let config = WalletConfig::from_env();
    init_tracing(config.as_ref().map(|c| c.log_format).unwrap_or_default());

    let result = match config {
        Ok(config) => run(config).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "SFA wallet demo failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: WalletConfig) -> Result<(), Box<dyn std::error::Error>> {
    let wallet = Wallet::from_config(&config)?;
    let chain_id = wallet.verify_chain().await?;
    tracing::info!(chain_id, endpoint = %config.chain.rpc_endpoint, "Connected to chain");

    let token = env::var(ID_TOKEN_ENV).map_err(|_| format!("{ID_TOKEN_ENV} is not set"))?;
    let address = wallet.login(token.trim()).await?;
    tracing::info!(%address, network = %config.chain.display_name, "Logged in");

    print_json(&wallet.user_info()?)?;
    print_json(&WalletQueryResult::from(wallet.get_accounts()?))?;
    print_json(&WalletQueryResult::from(wallet.get_balance().await?))?;

    let signature = wallet.sign_message(DEMO_MESSAGE.as_bytes())?;
    print_json(&WalletQueryResult::Signature {
        signature: signature.as_bytes().to_vec().into(),
    })?;

    if env::var(SEND_TX_ENV).is_ok_and(|v| v == "1") {
        let result = wallet.send_transaction(None).await?;
        if let Some(url) = &result.explorer_url {
            tracing::info!(%url, "Track the transaction in the explorer");
        }
        print_json(&WalletQueryResult::from(result))?;
    }

    wallet.logout()?;
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
