use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use popsicle_rawtx::{RawTx, RawTxConfig};
use popsicle_server::{
    app_router,
    config::{Cli, Command, QueryArgs, ServeArgs, DEFAULT_LOG_FILTER},
    AppState,
};
use popsicle_utxo_parser::render_table;
use popsicle_wallet_client::WalletClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.faucet.raw_tx_config();

    match cli.command {
        Command::Serve(args) => serve(config, args).await,
        Command::Init => {
            let address = RawTx::with_process_runner(config).bootstrap().await?;
            println!("{address}");
            Ok(())
        }
        Command::Query(args) => query(config, args).await,
        Command::Tip => {
            let faucet = RawTx::with_process_runner(config);
            let tip = faucet.tip_client().query_tip().await?;
            println!("{}", serde_json::to_string_pretty(&tip)?);
            Ok(())
        }
        Command::Clean => {
            let removed = RawTx::with_process_runner(config).clean_transients().await?;
            println!("removed {removed} transient files");
            Ok(())
        }
    }
}

async fn serve(config: RawTxConfig, args: ServeArgs) -> Result<()> {
    let faucet = RawTx::with_process_runner(config);
    let address = faucet
        .bootstrap()
        .await
        .context("failed to establish the faucet")?;
    info!(%address, network = %faucet.config().network, "faucet established");

    let state = AppState::new(WalletClient::new(&args.wallet_url), faucet);
    let shutdown = CancellationToken::new();
    tokio::spawn(watch_node(state.clone(), shutdown.clone()));

    let addr = args.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, wallet = %args.wallet_url, "wss listening");

    axum::serve(
        listener,
        app_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await?;
    Ok(())
}

/// Logs once the node answers `query tip`; the server accepts clients meanwhile.
async fn watch_node(state: AppState, shutdown: CancellationToken) {
    match state.faucet.tip_client().await_node_online(&shutdown).await {
        Ok(tip) => info!(slot = tip.slot, era = ?tip.era, "node online"),
        Err(err) => warn!(%err, "node not reachable"),
    }
}

async fn query(config: RawTxConfig, args: QueryArgs) -> Result<()> {
    let faucet = RawTx::with_process_runner(config);
    let snapshot = faucet.query_address(args.address.as_deref()).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("{}", snapshot.address);
        print!("{}", render_table(&snapshot.utxos));
    }
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}
