use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, TxBuildError},
    utxo_info::{AddressSnapshot, UtxoEntry},
};

/// How an operation picks the single UTxO it spends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSelection {
    /// Spend the first entry the node listed.
    First,
    /// Spend the entry with the most lovelace that can serve the operation.
    #[default]
    LargestFirst,
}

impl std::str::FromStr for InputSelection {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s {
            "first" => Ok(InputSelection::First),
            "largest-first" | "largest_first" => Ok(InputSelection::LargestFirst),
            other => Err(format!("unknown input selection `{other}`")),
        }
    }
}

/// What the spent entry has to provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRequirement<'a> {
    /// Any entry will do.
    Lovelace,
    /// The entry must hold at least `quantity` of the asset. Without a policy id
    /// the asset is matched by name only.
    Asset {
        policy_id: Option<&'a str>,
        asset_name: &'a str,
        quantity: u64,
    },
    /// The entry must carry no native assets.
    PureAda,
}

impl InputRequirement<'_> {
    fn held(&self, utxo: &UtxoEntry) -> u64 {
        match self {
            InputRequirement::Asset {
                policy_id: Some(policy_id),
                asset_name,
                ..
            } => utxo.asset(policy_id, asset_name).map_or(0, |a| a.quantity),
            InputRequirement::Asset {
                policy_id: None,
                asset_name,
                ..
            } => utxo.asset_by_name(asset_name).map_or(0, |a| a.quantity),
            _ => 0,
        }
    }

    fn is_met_by(&self, utxo: &UtxoEntry) -> bool {
        match self {
            InputRequirement::Lovelace => true,
            InputRequirement::PureAda => utxo.is_pure_ada(),
            InputRequirement::Asset { quantity, .. } => self.held(utxo) >= *quantity,
        }
    }
}

/// Picks the UTxO an operation spends.
///
/// `First` ignores the requirement and leaves the shortfall for the builder to
/// report. `LargestFirst` orders entries by lovelace, biggest first (ties keep
/// the node's order), and returns the first one meeting the requirement.
pub fn select_input<'s>(
    snapshot: &'s AddressSnapshot,
    strategy: InputSelection,
    requirement: &InputRequirement<'_>,
) -> Result<&'s UtxoEntry> {
    let utxos = &snapshot.utxos;
    if utxos.is_empty() {
        return Err(TxBuildError::NoSpendableInput(snapshot.address.clone()));
    }

    match strategy {
        InputSelection::First => Ok(&utxos[0]),
        InputSelection::LargestFirst => {
            let mut indices: Vec<usize> = (0..utxos.len()).collect();
            indices.sort_by(|&a, &b| utxos[b].lovelace.cmp(&utxos[a].lovelace));

            if let Some(&idx) = indices.iter().find(|&&i| requirement.is_met_by(&utxos[i])) {
                return Ok(&utxos[idx]);
            }

            Err(match requirement {
                InputRequirement::Asset {
                    policy_id,
                    asset_name,
                    quantity,
                } => TxBuildError::InsufficientAssetBalance {
                    asset: match policy_id {
                        Some(p) if !asset_name.is_empty() => format!("{p}.{asset_name}"),
                        Some(p) => p.to_string(),
                        None => asset_name.to_string(),
                    },
                    requested: *quantity,
                    held: utxos.iter().map(|u| requirement.held(u)).max().unwrap_or(0),
                },
                InputRequirement::PureAda => TxBuildError::UnbalancedAssets,
                InputRequirement::Lovelace => TxBuildError::NoSpendableInput(snapshot.address.clone()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utxo_info::AssetAmount;

    fn utxo(ix: u32, lovelace: u64, assets: Vec<AssetAmount>) -> UtxoEntry {
        UtxoEntry {
            tx_hash: "ab".repeat(32),
            output_index: ix,
            lovelace,
            assets,
        }
    }

    fn snapshot() -> AddressSnapshot {
        AddressSnapshot::new(
            "addr_test1",
            vec![
                utxo(0, 2_000_000, vec![AssetAmount::new("pid", "Tok", 50)]),
                utxo(1, 9_000_000, vec![]),
                utxo(2, 5_000_000, vec![AssetAmount::new("pid", "Tok", 500)]),
            ],
        )
    }

    #[test]
    fn empty_snapshot_has_no_input() {
        let empty = AddressSnapshot::new("addr_test1", vec![]);
        let err = select_input(&empty, InputSelection::LargestFirst, &InputRequirement::Lovelace).unwrap_err();
        assert_eq!(err, TxBuildError::NoSpendableInput("addr_test1".into()));
    }

    #[test]
    fn first_strategy_takes_listed_entry() {
        let s = snapshot();
        let picked = select_input(&s, InputSelection::First, &InputRequirement::PureAda).unwrap();
        assert_eq!(picked.output_index, 0);
    }

    #[test]
    fn largest_first_prefers_value() {
        let s = snapshot();
        let picked = select_input(&s, InputSelection::LargestFirst, &InputRequirement::Lovelace).unwrap();
        assert_eq!(picked.output_index, 1);
    }

    #[test]
    fn largest_first_honours_asset_requirement() {
        let s = snapshot();
        let requirement = InputRequirement::Asset {
            policy_id: None,
            asset_name: "Tok",
            quantity: 100,
        };
        let picked = select_input(&s, InputSelection::LargestFirst, &requirement).unwrap();
        assert_eq!(picked.output_index, 2);
    }

    #[test]
    fn largest_first_reports_best_holding() {
        let s = snapshot();
        let requirement = InputRequirement::Asset {
            policy_id: Some("pid"),
            asset_name: "Tok",
            quantity: 1_000,
        };
        let err = select_input(&s, InputSelection::LargestFirst, &requirement).unwrap_err();
        assert_eq!(
            err,
            TxBuildError::InsufficientAssetBalance {
                asset: "pid.Tok".into(),
                requested: 1_000,
                held: 500,
            }
        );
    }

    #[test]
    fn pure_ada_requirement_skips_asset_entries() {
        let s = AddressSnapshot::new("a", vec![utxo(0, 1, vec![AssetAmount::new("p", "n", 1)])]);
        let err = select_input(&s, InputSelection::LargestFirst, &InputRequirement::PureAda).unwrap_err();
        assert_eq!(err, TxBuildError::UnbalancedAssets);
    }

    #[test]
    fn strategy_parses_from_cli_text() {
        assert_eq!("first".parse::<InputSelection>(), Ok(InputSelection::First));
        assert_eq!("largest-first".parse::<InputSelection>(), Ok(InputSelection::LargestFirst));
        assert!("random".parse::<InputSelection>().is_err());
    }
}
