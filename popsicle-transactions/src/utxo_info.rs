use std::fmt;

use popsicle_safe_math::{safe_sum, MathError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A quantity of one native asset, identified by `(policy_id, asset_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAmount {
    pub policy_id: String,
    pub asset_name: String,
    pub quantity: u64,
}

impl AssetAmount {
    pub fn new(policy_id: impl Into<String>, asset_name: impl Into<String>, quantity: u64) -> Self {
        Self {
            policy_id: policy_id.into(),
            asset_name: asset_name.into(),
            quantity,
        }
    }

    /// `policy.name`, or the bare policy id for the empty asset name.
    pub fn unit(&self) -> String {
        if self.asset_name.is_empty() {
            self.policy_id.clone()
        } else {
            format!("{}.{}", self.policy_id, self.asset_name)
        }
    }

    pub fn is(&self, policy_id: &str, asset_name: &str) -> bool {
        self.policy_id == policy_id && self.asset_name == asset_name
    }
}

impl fmt::Display for AssetAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.quantity, self.unit())
    }
}

/// Reference to a transaction output, rendered as `HASH#IX`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxIn {
    pub tx_hash: String,
    pub output_index: u32,
}

impl fmt::Display for TxIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.output_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoEntry {
    pub tx_hash: String,
    pub output_index: u32,
    pub lovelace: u64,
    #[serde(default)]
    pub assets: Vec<AssetAmount>,
}

impl UtxoEntry {
    pub fn tx_in(&self) -> TxIn {
        TxIn {
            tx_hash: self.tx_hash.clone(),
            output_index: self.output_index,
        }
    }

    pub fn asset(&self, policy_id: &str, asset_name: &str) -> Option<&AssetAmount> {
        self.assets.iter().find(|a| a.is(policy_id, asset_name))
    }

    /// First asset with the given name under any policy.
    pub fn asset_by_name(&self, asset_name: &str) -> Option<&AssetAmount> {
        self.assets.iter().find(|a| a.asset_name == asset_name)
    }

    pub fn is_pure_ada(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Parsed view of one address's UTxO set, in the order the node reported it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSnapshot {
    pub address: String,
    pub utxos: Vec<UtxoEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
}

impl AddressSnapshot {
    pub fn new(address: impl Into<String>, utxos: Vec<UtxoEntry>) -> Self {
        Self {
            address: address.into(),
            utxos,
            policy_id: None,
        }
    }

    pub fn with_policy_id(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_id = Some(policy_id.into());
        self
    }

    pub fn contains(&self, tx_in: &TxIn) -> bool {
        self.utxos
            .iter()
            .any(|u| u.tx_hash == tx_in.tx_hash && u.output_index == tx_in.output_index)
    }

    pub fn total_lovelace(&self) -> Result<u64, MathError> {
        safe_sum(self.utxos.iter().map(|u| u.lovelace))
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOut {
    pub address: String,
    pub lovelace: u64,
    #[serde(default)]
    pub assets: Vec<AssetAmount>,
}

impl TxOut {
    pub fn new(address: impl Into<String>, lovelace: u64, assets: Vec<AssetAmount>) -> Self {
        Self {
            address: address.into(),
            lovelace,
            assets,
        }
    }
}

/// Signed quantity of one asset to create (positive) or destroy (negative).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintDirective {
    pub quantity: i64,
    pub policy_id: String,
    pub asset_name: String,
}

impl MintDirective {
    pub fn is_burn(&self) -> bool {
        self.quantity < 0
    }
}

/// Everything needed to render a `transaction build-raw` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftTransaction {
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mint: Option<MintDirective>,
    pub fee: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_after_slot: Option<u64>,
}

impl DraftTransaction {
    pub fn total_output_lovelace(&self) -> Result<u64, MathError> {
        safe_sum(self.outputs.iter().map(|o| o.lovelace))
    }

    /// Sum of one asset across all outputs.
    pub fn output_quantity(&self, policy_id: &str, asset_name: &str) -> Result<u64, MathError> {
        safe_sum(
            self.outputs
                .iter()
                .flat_map(|o| o.assets.iter())
                .filter(|a| a.is(policy_id, asset_name))
                .map(|a| a.quantity),
        )
    }

    pub fn output_to(&self, address: &str) -> Option<&TxOut> {
        self.outputs.iter().find(|o| o.address == address)
    }
}
