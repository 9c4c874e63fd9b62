use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use popsicle_transactions::PolicyScript;
use serde::Serialize;
use tracing::info;

use crate::{
    cli::CardanoCli,
    error::{RawTxError, Result},
};

const VKEY: &str = "policy.vkey";
const SKEY: &str = "policy.skey";
const SCRIPT: &str = "policy.script";
const POLICY_ID: &str = "policyID";

/// Key pair, script and derived id of a minting policy, all stored in one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MintingPolicy {
    pub verification_key: PathBuf,
    pub signing_key: PathBuf,
    pub script_file: PathBuf,
    #[serde(skip)]
    pub script: PolicyScript,
    pub policy_id: String,
}

#[derive(Debug, Clone)]
pub struct PolicyManager {
    cli: CardanoCli,
}

impl PolicyManager {
    pub fn new(cli: CardanoCli) -> Self {
        Self { cli }
    }

    /// Mint/burn whenever the policy key signs.
    pub async fn create_signature_policy(&self, dir: &Path) -> Result<MintingPolicy> {
        self.create(dir, |key_hash| PolicyScript::Signature { key_hash }).await
    }

    /// Mint only before `before_slot`. Used for NFTs so the supply is sealed.
    pub async fn create_time_locked_policy(&self, dir: &Path, before_slot: u64) -> Result<MintingPolicy> {
        self.create(dir, |key_hash| PolicyScript::TimeLocked { before_slot, key_hash })
            .await
    }

    /// Token policies are created on first mint and reused afterwards, so the
    /// policy id of a token name never changes.
    pub async fn load_or_create_token_policy(&self, dir: &Path) -> Result<MintingPolicy> {
        match load_policy(dir).await {
            Ok(policy) => Ok(policy),
            Err(RawTxError::PolicyNotFound(_)) => self.create_signature_policy(dir).await,
            Err(err) => Err(err),
        }
    }

    async fn create(&self, dir: &Path, script: impl FnOnce(String) -> PolicyScript) -> Result<MintingPolicy> {
        tokio::fs::create_dir_all(dir).await?;

        let verification_key = dir.join(VKEY);
        let signing_key = dir.join(SKEY);
        let script_file = dir.join(SCRIPT);

        self.cli.key_gen(&verification_key, &signing_key).await?;
        let key_hash = self.cli.key_hash(&verification_key).await?;

        let script = script(key_hash);
        tokio::fs::write(&script_file, script.to_json_string()).await?;

        let policy_id = self.cli.policy_id(&script_file).await?;
        tokio::fs::write(dir.join(POLICY_ID), &policy_id).await?;

        info!(dir = %dir.display(), %policy_id, before_slot = ?script.before_slot(), "created minting policy");

        Ok(MintingPolicy {
            verification_key,
            signing_key,
            script_file,
            script,
            policy_id,
        })
    }
}

/// Reads a policy written by [`PolicyManager`]. `PolicyNotFound` when the
/// directory holds no complete policy.
pub async fn load_policy(dir: &Path) -> Result<MintingPolicy> {
    let not_found = || RawTxError::PolicyNotFound(dir.display().to_string());

    let script_file = dir.join(SCRIPT);
    let policy_id = match tokio::fs::read_to_string(dir.join(POLICY_ID)).await {
        Ok(id) => id.trim().to_string(),
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found()),
        Err(err) => return Err(err.into()),
    };
    let raw_script = match tokio::fs::read_to_string(&script_file).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found()),
        Err(err) => return Err(err.into()),
    };

    let value: serde_json::Value = serde_json::from_str(&raw_script)?;
    let script = PolicyScript::from_json(&value)
        .ok_or_else(|| RawTxError::ParseFailure(format!("unrecognised policy script in {}", script_file.display())))?;

    let signing_key = dir.join(SKEY);
    if !tokio::fs::try_exists(&signing_key).await? {
        return Err(not_found());
    }

    Ok(MintingPolicy {
        verification_key: dir.join(VKEY),
        signing_key,
        script_file,
        script,
        policy_id,
    })
}
