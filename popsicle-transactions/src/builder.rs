use popsicle_error::require;
use popsicle_safe_math::{safe_add, safe_cast, safe_sub};
use serde_json::{json, Value};

use crate::{
    constants::{MINT_FEE_FLOOR, MIN_ADA, NFT_METADATA_LABEL, NFT_QUANTITY},
    error::{Result, TxBuildError},
    utxo_info::{AssetAmount, DraftTransaction, MintDirective, TxOut, UtxoEntry},
};

/// What a transaction is meant to do. Amounts are lovelace for `SendCoin` and
/// asset units everywhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipe {
    SendCoin {
        amount: u64,
        receiver: String,
    },
    /// Without a policy id the asset is looked up by name on the input.
    SendToken {
        policy_id: Option<String>,
        asset_name: String,
        amount: u64,
        receiver: String,
    },
    MintToken {
        policy_id: String,
        asset_name: String,
        amount: u64,
    },
    MintNft {
        policy_id: String,
        asset_name: String,
        receiver: String,
        metadata: Value,
        before_slot: u64,
        /// Lovelace locked next to the NFT.
        output_lovelace: u64,
    },
    BurnToken {
        policy_id: String,
        asset_name: String,
        amount: u64,
    },
}

impl Recipe {
    pub fn operation(&self) -> &'static str {
        match self {
            Recipe::SendCoin { .. } => "send_coin",
            Recipe::SendToken { .. } => "send_token",
            Recipe::MintToken { .. } => "mint_token",
            Recipe::MintNft { .. } => "mint_nft",
            Recipe::BurnToken { .. } => "burn_token",
        }
    }

    pub fn mints(&self) -> bool {
        matches!(
            self,
            Recipe::MintToken { .. } | Recipe::MintNft { .. } | Recipe::BurnToken { .. }
        )
    }

    fn amount(&self) -> u64 {
        match self {
            Recipe::SendCoin { amount, .. }
            | Recipe::SendToken { amount, .. }
            | Recipe::MintToken { amount, .. }
            | Recipe::BurnToken { amount, .. } => *amount,
            Recipe::MintNft { .. } => NFT_QUANTITY,
        }
    }
}

/// `{"721": {policy_id: {asset_name: metadata}}}`
pub fn nft_metadata(policy_id: &str, asset_name: &str, metadata: &Value) -> Value {
    json!({ NFT_METADATA_LABEL: { policy_id: { asset_name: metadata } } })
}

/// Balances a single-input transaction for one [`Recipe`].
///
/// The builder is pure: the caller drafts once with [`placeholder_fee`], asks the
/// node for the real fee of that body, then drafts again with it.
///
/// [`placeholder_fee`]: TransactionBuilder::placeholder_fee
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    input: UtxoEntry,
    change_address: String,
    recipe: Recipe,
}

impl TransactionBuilder {
    pub fn new(input: UtxoEntry, change_address: impl Into<String>, recipe: Recipe) -> Self {
        Self {
            input,
            change_address: change_address.into(),
            recipe,
        }
    }

    pub fn input(&self) -> &UtxoEntry {
        &self.input
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn change_address(&self) -> &str {
        &self.change_address
    }

    pub fn placeholder_fee(&self) -> u64 {
        match self.recipe {
            Recipe::MintToken { .. } => MINT_FEE_FLOOR,
            _ => 0,
        }
    }

    /// Keys that sign: the payment key, plus the policy key for mints and burns.
    pub fn witness_count(&self) -> usize {
        if self.recipe.mints() {
            2
        } else {
            1
        }
    }

    /// Checks everything that can be known before the node is asked for a fee.
    pub fn validate(&self) -> Result<()> {
        self.draft(self.placeholder_fee()).map(|_| ())
    }

    pub fn draft(&self, fee: u64) -> Result<DraftTransaction> {
        require!(
            self.recipe.amount() > 0,
            TxBuildError::InvalidAmount("amount must be positive".to_string())
        );

        let input = &self.input;
        let mut outputs = Vec::with_capacity(2);
        let mut mint = None;
        let mut metadata = None;
        let mut invalid_after_slot = None;

        match &self.recipe {
            Recipe::SendCoin { amount, receiver } => {
                let change = self.remaining(safe_add(*amount, fee)?)?;
                outputs.push(TxOut::new(receiver, *amount, vec![]));
                outputs.push(TxOut::new(&self.change_address, change, input.assets.clone()));
            }
            Recipe::SendToken {
                policy_id,
                asset_name,
                amount,
                receiver,
            } => {
                let held = self.held_asset(policy_id.as_deref(), asset_name, *amount)?;
                let change = self.remaining(safe_add(MIN_ADA, fee)?)?;
                let assets = debit(&input.assets, &held.policy_id, &held.asset_name, *amount)?;
                outputs.push(TxOut::new(
                    receiver,
                    MIN_ADA,
                    vec![AssetAmount::new(&held.policy_id, &held.asset_name, *amount)],
                ));
                outputs.push(TxOut::new(&self.change_address, change, assets));
            }
            Recipe::MintToken {
                policy_id,
                asset_name,
                amount,
            } => {
                let change = self.remaining(fee)?;
                let assets = credit(&input.assets, policy_id, asset_name, *amount)?;
                outputs.push(TxOut::new(&self.change_address, change, assets));
                mint = Some(MintDirective {
                    quantity: safe_cast(*amount)?,
                    policy_id: policy_id.clone(),
                    asset_name: asset_name.clone(),
                });
            }
            Recipe::MintNft {
                policy_id,
                asset_name,
                receiver,
                metadata: attributes,
                before_slot,
                output_lovelace,
            } => {
                require!(input.is_pure_ada(), TxBuildError::UnbalancedAssets);
                let change = self.remaining(safe_add(*output_lovelace, fee)?)?;
                outputs.push(TxOut::new(
                    receiver,
                    *output_lovelace,
                    vec![AssetAmount::new(policy_id, asset_name, NFT_QUANTITY)],
                ));
                outputs.push(TxOut::new(&self.change_address, change, vec![]));
                mint = Some(MintDirective {
                    quantity: safe_cast(NFT_QUANTITY)?,
                    policy_id: policy_id.clone(),
                    asset_name: asset_name.clone(),
                });
                metadata = Some(nft_metadata(policy_id, asset_name, attributes));
                invalid_after_slot = Some(*before_slot);
            }
            Recipe::BurnToken {
                policy_id,
                asset_name,
                amount,
            } => {
                self.held_asset(Some(policy_id), asset_name, *amount)?;
                let change = self.remaining(fee)?;
                let assets = debit(&input.assets, policy_id, asset_name, *amount)?;
                outputs.push(TxOut::new(&self.change_address, change, assets));
                let quantity: i64 = safe_cast(*amount)?;
                mint = Some(MintDirective {
                    quantity: -quantity,
                    policy_id: policy_id.clone(),
                    asset_name: asset_name.clone(),
                });
            }
        }

        if let Some(short) = outputs
            .iter()
            .find(|o| !o.assets.is_empty() && o.lovelace < MIN_ADA)
        {
            return Err(TxBuildError::InsufficientFunds {
                required: safe_add(input.lovelace, MIN_ADA - short.lovelace)?,
                available: input.lovelace,
            });
        }

        Ok(DraftTransaction {
            inputs: vec![input.tx_in()],
            outputs,
            mint,
            fee,
            metadata,
            invalid_after_slot,
        })
    }

    fn remaining(&self, spent: u64) -> Result<u64> {
        safe_sub(self.input.lovelace, spent).map_err(|_| TxBuildError::InsufficientFunds {
            required: spent,
            available: self.input.lovelace,
        })
    }

    fn held_asset(&self, policy_id: Option<&str>, asset_name: &str, requested: u64) -> Result<AssetAmount> {
        let held = match policy_id {
            Some(policy_id) => self.input.asset(policy_id, asset_name),
            None => self.input.asset_by_name(asset_name),
        };
        match held {
            Some(asset) if asset.quantity >= requested => Ok(asset.clone()),
            _ => Err(TxBuildError::InsufficientAssetBalance {
                asset: match (held, policy_id) {
                    (Some(asset), _) => asset.unit(),
                    (None, Some(policy_id)) => AssetAmount::new(policy_id, asset_name, 0).unit(),
                    (None, None) => asset_name.to_string(),
                },
                requested,
                held: held.map_or(0, |a| a.quantity),
            }),
        }
    }
}

fn credit(assets: &[AssetAmount], policy_id: &str, asset_name: &str, amount: u64) -> Result<Vec<AssetAmount>> {
    let mut assets = assets.to_vec();
    match assets.iter_mut().find(|a| a.is(policy_id, asset_name)) {
        Some(existing) => existing.quantity = safe_add(existing.quantity, amount)?,
        None => assets.push(AssetAmount::new(policy_id, asset_name, amount)),
    }
    Ok(assets)
}

/// Assets reaching zero are dropped from the list.
fn debit(assets: &[AssetAmount], policy_id: &str, asset_name: &str, amount: u64) -> Result<Vec<AssetAmount>> {
    let mut out = Vec::with_capacity(assets.len());
    for asset in assets {
        if asset.is(policy_id, asset_name) {
            let left = safe_sub(asset.quantity, amount)?;
            if left > 0 {
                out.push(AssetAmount::new(policy_id, asset_name, left));
            }
        } else {
            out.push(asset.clone());
        }
    }
    Ok(out)
}
