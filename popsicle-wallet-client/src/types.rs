use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A `{ quantity, unit }` pair as the wallet API reports amounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
    pub quantity: u64,
    pub unit: String,
}

impl Quantity {
    pub fn lovelace(quantity: u64) -> Self {
        Self {
            quantity,
            unit: "lovelace".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub available: Quantity,
    pub reward: Quantity,
    pub total: Quantity,
}

/// A Shelley wallet. Fields the bridge does not interpret are kept verbatim
/// in `extra` so they still reach the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub balance: Balance,
    #[serde(default)]
    pub assets: Value,
    #[serde(default)]
    pub delegation: Value,
    #[serde(default)]
    pub state: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInformation {
    pub sync_progress: SyncProgress,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NetworkInformation {
    /// The node has caught up with the network.
    pub fn is_ready(&self) -> bool {
        self.sync_progress.status == "ready"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressState {
    Used,
    Unused,
}

impl AddressState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressState::Used => "used",
            AddressState::Unused => "unused",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletAddress {
    pub id: String,
    pub state: AddressState,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoStatistics {
    pub total: Quantity,
    pub scale: String,
    pub distribution: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: String,
    pub amount: Quantity,
    pub direction: String,
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The per-wallet view the UI renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub id: String,
    pub name: String,
    pub assets: Value,
    pub statistics: UtxoStatistics,
    pub used_addresses: Vec<WalletAddress>,
    pub unused_addresses: Vec<WalletAddress>,
    pub available_balance: u64,
    pub reward_balance: u64,
    pub total_balance: u64,
    pub delegation: Value,
    pub transactions: Vec<WalletTransaction>,
}

/// Body of `POST /wallets`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateWallet<'a> {
    pub name: &'a str,
    pub mnemonic_sentence: Vec<&'a str>,
    pub passphrase: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdatePassphrase<'a> {
    pub old_passphrase: &'a str,
    pub new_passphrase: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: String,
    pub message: String,
}
