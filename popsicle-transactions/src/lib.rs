//! Ledger data model and single-input transaction balancing.
//!
//! Nothing in this crate touches the node: it turns a chosen [`UtxoEntry`] and a
//! [`Recipe`] into a balanced [`DraftTransaction`], with every lovelace and asset
//! quantity accounted for through checked arithmetic.

pub mod constants;
pub mod error;
pub mod policy;
pub mod selection;
pub mod utxo_info;

mod builder;

pub use builder::{nft_metadata, Recipe, TransactionBuilder};
pub use error::TxBuildError;
pub use policy::PolicyScript;
pub use selection::{select_input, InputRequirement, InputSelection};
pub use utxo_info::{AddressSnapshot, AssetAmount, DraftTransaction, MintDirective, TxIn, TxOut, UtxoEntry};
