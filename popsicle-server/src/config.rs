use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use popsicle_rawtx::{Network, RawTxConfig, RetryPolicy};
use popsicle_transactions::InputSelection;
use popsicle_wallet_client::DEFAULT_WALLET_URL;

pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_LOG_FILTER: &str = "popsicle=info";

#[derive(Debug, Parser)]
#[command(
    name = "popsicle",
    about = "Cardano faucet and wallet bridge for the popsicle UI"
)]
pub struct Cli {
    #[command(flatten)]
    pub faucet: FaucetArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the WebSocket server.
    Serve(ServeArgs),
    /// Create the state tree and the faucet payment address, then exit.
    Init,
    /// Print the UTxOs held by an address (the faucet by default).
    Query(QueryArgs),
    /// Print the node's chain tip.
    Tip,
    /// Delete leftover transaction bodies from the tmp directory.
    Clean,
}

/// Settings shared by every subcommand that touches `cardano-cli`.
#[derive(Debug, Clone, Args)]
pub struct FaucetArgs {
    /// `mainnet`, `testnet` or `testnet:<magic>`.
    #[arg(long, env = "NETWORK", default_value = "testnet", global = true)]
    pub network: Network,

    #[arg(long, env = "CARDANO_CLI", default_value = "cardano-cli", global = true)]
    pub cardano_cli: PathBuf,

    /// Directory holding `priv/` and `tmp/`.
    #[arg(long, env = "POPSICLE_ROOT", default_value = ".", global = true)]
    pub root: PathBuf,

    /// `first` or `largest-first`.
    #[arg(long, env = "INPUT_SELECTION", default_value = "largest-first", global = true)]
    pub input_selection: InputSelection,

    /// How many times to re-query the faucet address after a submit.
    #[arg(long, env = "CONFIRMATION_ATTEMPTS", global = true)]
    pub confirmation_attempts: Option<usize>,
}

impl FaucetArgs {
    pub fn raw_tx_config(&self) -> RawTxConfig {
        let mut confirmation = RetryPolicy::confirmation();
        if let Some(attempts) = self.confirmation_attempts {
            confirmation.max_attempts = attempts.max(1);
        }

        RawTxConfig::new(&self.root, self.network)
            .with_cli_path(&self.cardano_cli)
            .with_input_selection(self.input_selection)
            .with_retry(confirmation, RetryPolicy::node_startup())
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub host: std::net::IpAddr,

    #[arg(long, env = "PORT_LOCAL", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Base URL of the cardano-wallet v2 API.
    #[arg(long, env = "WALLET_URL", default_value = DEFAULT_WALLET_URL)]
    pub wallet_url: String,
}

impl ServeArgs {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Address to inspect instead of the faucet.
    pub address: Option<String>,

    /// Print JSON instead of the CLI table.
    #[arg(long)]
    pub json: bool,
}
