//! Alpine rebalancer service
//!
//! Runs the rebalancing state machine on demand over HTTP and, when
//! `REBALANCE_INTERVAL_SECS` is set, on a fixed schedule.

use std::sync::Arc;

use alp_rebalancer::{
    app,
    chains::{
        evm::{EvmL1, EvmL2},
        local::LocalNetwork,
        Contracts,
    },
    services::{address_book, AddressBook, ExitProofApi, GuardianApi, Poller},
    AppState, Config, NetworkMode, Rebalancer, RebalancerError,
};
use alp_vault::{constants::ASSET_DECIMALS, Address, Network};
use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to load .env");
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alp_rebalancer=info,alp_vault=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env());

    info!(port = config.port, network = ?config.network, "Starting Alpine rebalancer");
    info!(
        mainnet = config.mainnet,
        contract_version = %config.contract_version,
        api_keys_configured = !config.api_keys.is_empty(),
        interval = ?config.rebalance_interval,
        "Configuration loaded"
    );
    if config.api_keys.is_empty() {
        warn!("No API keys configured - running in development mode");
    }

    let poller = Poller::new(config.proof_poll_attempts, config.proof_poll_interval);
    let rebalancer = match config.network {
        NetworkMode::Evm => connect_evm(&config, poller).await?,
        NetworkMode::Local => start_local(&config, poller),
    };
    let state = AppState::new(config.clone(), Arc::new(rebalancer));

    if let Some(period) = config.rebalance_interval {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let report = state.run_once().await;
                info!(submitted = report.submitted(), "Scheduled rebalance finished");
                state.rebalancer.process_withdrawal_queue().await;
            }
        });
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(address = %addr, "Server listening");

    axum::serve(listener, app(state)).await?;
    Ok(())
}

/// Resolves both vaults from the address book and connects to both chains.
async fn connect_evm(config: &Config, poller: Poller) -> anyhow::Result<Rebalancer> {
    let private_key = config.private_key.as_deref().ok_or_else(|| {
        RebalancerError::Config("REBALANCER_PRIVATE_KEY is required for the evm network".into())
    })?;

    let client = reqwest::Client::new();
    let book =
        AddressBook::fetch(&client, &config.address_book_url, &config.contract_version).await?;
    let l1_vault = book.address(address_book::L1_VAULT)?;
    let l2_vault = book.address(address_book::L2_VAULT)?;
    info!(%l1_vault, %l2_vault, "Vaults resolved");

    let (l1, l2) = futures::try_join!(
        EvmL1::connect(&config.eth_rpc_url, private_key, l1_vault),
        EvmL2::connect(&config.polygon_rpc_url, private_key, l2_vault),
    )?;
    let contracts = Contracts {
        l1: Arc::new(l1),
        l2: Arc::new(l2),
    };

    Ok(Rebalancer::new(
        contracts,
        Arc::new(GuardianApi::new(client.clone(), &config.wormhole_api_url)),
        Arc::new(ExitProofApi::new(client, &config.exit_proof_api_url)),
        poller,
    ))
}

/// In-process devnet with a treasury deposit and background bridge actors.
fn start_local(config: &Config, poller: Poller) -> Rebalancer {
    let mut network = Network::devnet();
    let treasury = 1_000 * 10u64.pow(u32::from(ASSET_DECIMALS));
    let owner = Address::derive("devnet/treasury");
    if let Err(e) = network.fund_treasury(owner, treasury) {
        warn!(error = %e, "Failed to fund devnet treasury");
    }

    let local = LocalNetwork::new(network);
    local.spawn_actors(config.proof_poll_interval);
    info!(treasury, %owner, "Devnet started");

    Rebalancer::new(
        local.contracts(),
        Arc::new(local.clone()),
        Arc::new(local),
        poller,
    )
}
