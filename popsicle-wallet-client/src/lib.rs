//! Client for the `cardano-wallet` v2 REST API.
//!
//! Covers the Shelley wallet lifecycle the bridge relays (list, create or
//! restore, rename, change passphrase, delete) plus the reads that make up a
//! [`WalletSummary`]. Key derivation and recovery-phrase handling stay on the
//! wallet server.

pub mod client;
pub mod error;
pub mod types;

pub use client::{history_start, is_not_found, WalletClient, DEFAULT_WALLET_URL};
pub use error::WalletError;
pub use types::{
    AddressState, Balance, NetworkInformation, Quantity, SyncProgress, UtxoStatistics, Wallet,
    WalletAddress, WalletSummary, WalletTransaction,
};
