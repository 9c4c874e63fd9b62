//! Raw-transaction layer driving `cardano-cli`.
//!
//! [`RawTx`] runs the five faucet operations (send coin, send token, mint token,
//! mint NFT, burn token) end to end: pick an input, draft, estimate the fee,
//! rebuild, sign, submit and wait for the chain to confirm. Every external call
//! goes through a [`CommandRunner`], so the pipeline can be driven by a scripted
//! runner in tests.

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod fee;
pub mod layout;
pub mod locks;
pub mod pipeline;
pub mod poller;
pub mod policy;
pub mod process;
pub mod tip;

pub use cli::CardanoCli;
pub use config::{Network, RawTxConfig, RetryPolicy};
pub use error::RawTxError;
pub use layout::StateLayout;
pub use pipeline::{RawTx, TxOutcome};
pub use policy::{MintingPolicy, PolicyManager};
pub use process::{CommandRunner, ProcessOutput, ProcessRunner};
pub use tip::{Tip, TipClient};
