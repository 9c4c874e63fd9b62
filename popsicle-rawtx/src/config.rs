use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use popsicle_transactions::{constants::NFT_SLOT_HORIZON, constants::TESTNET_MAGIC, InputSelection};

use crate::layout::StateLayout;

/// Which chain the CLI talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet { magic: u32 },
}

impl Network {
    pub fn testnet() -> Self {
        Network::Testnet { magic: TESTNET_MAGIC }
    }

    /// Directory name under `priv/` and `tmp/`.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet { .. } => "testnet",
        }
    }

    /// Arguments selecting this network on every node-facing verb.
    pub fn cli_args(&self) -> Vec<String> {
        match self {
            Network::Mainnet => vec!["--mainnet".to_string()],
            Network::Testnet { magic } => vec!["--testnet-magic".to_string(), magic.to_string()],
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::testnet()),
            other => match other.strip_prefix("testnet:").map(str::parse) {
                Some(Ok(magic)) => Ok(Network::Testnet { magic }),
                _ => Err(format!("unknown network `{other}`, expected mainnet, testnet or testnet:<magic>")),
            },
        }
    }
}

/// Bounded exponential backoff for anything that waits on the chain.
///
/// delay = min(max_delay, initial_delay * factor^attempt * (1 ± jitter))
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub factor: f32,
    pub max_delay: Duration,
    /// Random spread applied to every delay (0.0 - 1.0).
    pub jitter: f32,
    pub max_attempts: usize,
    /// Wall-clock budget for the whole wait.
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Blocks land every ~20s; give a submitted transaction ten minutes.
    pub fn confirmation() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            factor: 1.5,
            max_delay: Duration::from_secs(20),
            jitter: 0.1,
            max_attempts: 60,
            timeout: Duration::from_secs(600),
        }
    }

    pub fn node_startup() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
            max_attempts: 40,
            timeout: Duration::from_secs(900),
        }
    }

    /// Constant, jitter-free delays bounded by the attempt count alone.
    pub fn fixed(delay: Duration, max_attempts: usize) -> Self {
        Self {
            initial_delay: delay,
            factor: 1.0,
            max_delay: delay,
            jitter: 0.0,
            max_attempts,
            timeout: Duration::from_secs(3600),
        }
    }

    pub fn next_delay(&self, attempt: usize) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f32 * self.factor.powi(attempt as i32);

        let jitter_factor = if self.jitter > 0.0 {
            1.0 - self.jitter + rand::random::<f32>() * self.jitter * 2.0
        } else {
            1.0
        };

        let capped_ms = (base_ms * jitter_factor).min(self.max_delay.as_millis() as f32);
        Duration::from_millis(capped_ms as u64)
    }
}

/// Everything the raw-transaction layer needs, passed in at construction.
#[derive(Debug, Clone)]
pub struct RawTxConfig {
    pub cli_path: PathBuf,
    pub network: Network,
    pub layout: StateLayout,
    pub input_selection: InputSelection,
    pub confirmation: RetryPolicy,
    pub tip: RetryPolicy,
    pub nft_slot_horizon: u64,
}

impl RawTxConfig {
    pub fn new(root: impl Into<PathBuf>, network: Network) -> Self {
        Self {
            cli_path: PathBuf::from("cardano-cli"),
            network,
            layout: StateLayout::new(root, network),
            input_selection: InputSelection::default(),
            confirmation: RetryPolicy::confirmation(),
            tip: RetryPolicy::node_startup(),
            nft_slot_horizon: NFT_SLOT_HORIZON,
        }
    }

    pub fn testnet(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Network::testnet())
    }

    pub fn with_cli_path(mut self, cli_path: impl Into<PathBuf>) -> Self {
        self.cli_path = cli_path.into();
        self
    }

    pub fn with_input_selection(mut self, input_selection: InputSelection) -> Self {
        self.input_selection = input_selection;
        self
    }

    pub fn with_retry(mut self, confirmation: RetryPolicy, tip: RetryPolicy) -> Self {
        self.confirmation = confirmation;
        self.tip = tip;
        self
    }
}
