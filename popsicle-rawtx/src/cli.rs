use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use popsicle_transactions::{AddressSnapshot, DraftTransaction, MintDirective, TxIn, TxOut};
use tracing::debug;

use crate::{
    command::{validate_hex, CliCommand, Invocation},
    config::Network,
    error::{RawTxError, Result},
    process::{CommandRunner, ProcessOutput},
    tip::Tip,
};

/// Inputs of an Alonzo `transaction build`, where the CLI computes fee and change.
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    pub inputs: &'a [TxIn],
    pub outputs: &'a [TxOut],
    pub change_address: &'a str,
    pub mint: Option<(&'a MintDirective, &'a Path)>,
    pub metadata_file: Option<&'a Path>,
    pub invalid_hereafter: Option<u64>,
    pub witness_override: usize,
    pub out_file: &'a Path,
}

/// One method per `cardano-cli` verb the bridge uses.
#[derive(Clone)]
pub struct CardanoCli {
    runner: Arc<dyn CommandRunner>,
    program: PathBuf,
    network: Network,
}

impl fmt::Debug for CardanoCli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardanoCli")
            .field("program", &self.program)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl CardanoCli {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<PathBuf>, network: Network) -> Self {
        Self {
            runner,
            program: program.into(),
            network,
        }
    }

    fn command(&self, verb: &[&'static str]) -> CliCommand {
        CliCommand::new(&self.program, verb)
    }

    /// Runs the command and hands back whatever it printed, exit code included.
    pub(crate) async fn exec(&self, command: CliCommand) -> Result<ProcessOutput> {
        let invocation = command.build();
        self.run(&invocation).await
    }

    /// Runs the command and fails with `ProcessFailure` on a non-zero exit.
    pub(crate) async fn exec_checked(&self, command: CliCommand) -> Result<String> {
        let invocation = command.build();
        let output = self.run(&invocation).await?;
        if !output.success() {
            return Err(RawTxError::ProcessFailure {
                command: invocation.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        debug!(command = %invocation, "invoking cardano-cli");
        let output = self.runner.run(invocation).await?;
        debug!(exit_code = output.exit_code, "cardano-cli finished");
        Ok(output)
    }

    pub async fn query_utxo(&self, address: &str) -> Result<AddressSnapshot> {
        let cmd = self
            .command(&["query", "utxo"])
            .network(&self.network)
            .address("--address", address)?;
        let stdout = self.exec_checked(cmd).await?;
        Ok(popsicle_utxo_parser::parse_snapshot(address, &stdout)?)
    }

    pub async fn query_tip(&self) -> Result<Tip> {
        let cmd = self.command(&["query", "tip"]).network(&self.network);
        let stdout = self.exec_checked(cmd).await?;
        Ok(serde_json::from_str(&stdout)?)
    }

    pub async fn query_protocol_parameters(&self, out_file: &Path) -> Result<()> {
        let cmd = self
            .command(&["query", "protocol-parameters"])
            .network(&self.network)
            .path("--out-file", out_file)?;
        self.exec_checked(cmd).await.map(drop)
    }

    pub async fn build_raw(
        &self,
        draft: &DraftTransaction,
        out_file: &Path,
        mint_script: Option<&Path>,
        metadata_file: Option<&Path>,
    ) -> Result<()> {
        let mut cmd = self.command(&["transaction", "build-raw"]).number("--fee", draft.fee);
        for input in &draft.inputs {
            cmd = cmd.tx_in(input)?;
        }
        for output in &draft.outputs {
            cmd = cmd.tx_out(output)?;
        }
        if let Some(mint) = &draft.mint {
            let script = mint_script.ok_or_else(|| RawTxError::InvalidArgument {
                flag: "--minting-script-file".into(),
                reason: "a mint needs its policy script".into(),
            })?;
            cmd = cmd.mint(mint)?.path("--minting-script-file", script)?;
        }
        if let Some(metadata_file) = metadata_file {
            cmd = cmd.path("--metadata-json-file", metadata_file)?;
        }
        if let Some(slot) = draft.invalid_after_slot {
            cmd = cmd.number("--invalid-hereafter", slot);
        }
        cmd = cmd.path("--out-file", out_file)?;
        self.exec_checked(cmd).await.map(drop)
    }

    /// The caller inspects stdout/stderr itself, so a failed build is returned as
    /// output rather than as an error.
    pub async fn build(&self, request: &BuildRequest<'_>) -> Result<ProcessOutput> {
        let mut cmd = self
            .command(&["transaction", "build"])
            .network(&self.network)
            .flag("--alonzo-era");
        for input in request.inputs {
            cmd = cmd.tx_in(input)?;
        }
        for output in request.outputs {
            cmd = cmd.tx_out(output)?;
        }
        cmd = cmd.address("--change-address", request.change_address)?;
        if let Some((mint, script)) = request.mint {
            cmd = cmd.mint(mint)?.path("--minting-script-file", script)?;
        }
        if let Some(metadata_file) = request.metadata_file {
            cmd = cmd.path("--metadata-json-file", metadata_file)?;
        }
        if let Some(slot) = request.invalid_hereafter {
            cmd = cmd.number("--invalid-hereafter", slot);
        }
        cmd = cmd
            .number("--witness-override", request.witness_override as u64)
            .path("--out-file", request.out_file)?;
        self.exec(cmd).await
    }

    pub async fn calculate_min_fee(
        &self,
        body_file: &Path,
        tx_in_count: usize,
        tx_out_count: usize,
        witness_count: usize,
        protocol_file: &Path,
    ) -> Result<String> {
        let cmd = self
            .command(&["transaction", "calculate-min-fee"])
            .path("--tx-body-file", body_file)?
            .number("--tx-in-count", tx_in_count as u64)
            .number("--tx-out-count", tx_out_count as u64)
            .number("--witness-count", witness_count as u64)
            .number("--byron-witness-count", 0u64)
            .network(&self.network)
            .path("--protocol-params-file", protocol_file)?;
        self.exec_checked(cmd).await
    }

    pub async fn calculate_min_required_utxo(&self, output: &TxOut, protocol_file: &Path) -> Result<String> {
        let cmd = self
            .command(&["transaction", "calculate-min-required-utxo"])
            .flag("--alonzo-era")
            .path("--protocol-params-file", protocol_file)?
            .tx_out(output)?;
        self.exec_checked(cmd).await
    }

    pub async fn sign(&self, body_file: &Path, signing_keys: &[PathBuf], out_file: &Path) -> Result<()> {
        let mut cmd = self.command(&["transaction", "sign"]).network(&self.network);
        for key in signing_keys {
            cmd = cmd.path("--signing-key-file", key)?;
        }
        cmd = cmd
            .path("--tx-body-file", body_file)?
            .path("--out-file", out_file)?;
        self.exec_checked(cmd).await.map(drop)
    }

    pub async fn submit(&self, signed_file: &Path) -> Result<()> {
        let cmd = self
            .command(&["transaction", "submit"])
            .network(&self.network)
            .path("--tx-file", signed_file)?;
        self.exec_checked(cmd).await.map(drop)
    }

    pub async fn policy_id(&self, script_file: &Path) -> Result<String> {
        let cmd = self
            .command(&["transaction", "policyid"])
            .path("--script-file", script_file)?;
        let stdout = self.exec_checked(cmd).await?;
        let policy_id = stdout.trim().to_string();
        validate_hex("policyid", &policy_id, Some(56))
            .map_err(|_| RawTxError::ParseFailure(format!("not a policy id: `{policy_id}`")))?;
        Ok(policy_id)
    }

    pub async fn key_gen(&self, verification_key: &Path, signing_key: &Path) -> Result<()> {
        let cmd = self
            .command(&["address", "key-gen"])
            .path("--verification-key-file", verification_key)?
            .path("--signing-key-file", signing_key)?;
        self.exec_checked(cmd).await.map(drop)
    }

    pub async fn key_hash(&self, verification_key: &Path) -> Result<String> {
        let cmd = self
            .command(&["address", "key-hash"])
            .path("--payment-verification-key-file", verification_key)?;
        let stdout = self.exec_checked(cmd).await?;
        let key_hash = stdout.trim().to_string();
        validate_hex("key-hash", &key_hash, Some(56))
            .map_err(|_| RawTxError::ParseFailure(format!("not a key hash: `{key_hash}`")))?;
        Ok(key_hash)
    }

    pub async fn address_build(&self, verification_key: &Path, out_file: &Path) -> Result<()> {
        let cmd = self
            .command(&["address", "build"])
            .path("--payment-verification-key-file", verification_key)?
            .path("--out-file", out_file)?
            .network(&self.network);
        self.exec_checked(cmd).await.map(drop)
    }
}
