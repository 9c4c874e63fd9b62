use std::{future::Future, path::Path, sync::Arc};

use popsicle_transactions::{
    constants::{MIN_ADA, NFT_QUANTITY},
    nft_metadata, select_input, AddressSnapshot, AssetAmount, DraftTransaction, InputRequirement, Recipe,
    TransactionBuilder, TxIn, TxOut, UtxoEntry,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    cli::{BuildRequest, CardanoCli},
    command::{validate_address, validate_asset_name},
    config::RawTxConfig,
    error::{RawTxError, Result},
    fee::parse_labelled_lovelace,
    layout::{ScratchFiles, StateLayout},
    locks::AddressLocks,
    poller::ConfirmationPoller,
    policy::{load_policy, MintingPolicy, PolicyManager},
    process::{CommandRunner, ProcessOutput, ProcessRunner},
    tip::TipClient,
};

const MIN_UTXO_LABEL: &str = "Minimum required UTxO:";
const ESTIMATED_FEE_LABEL: &str = "Estimated transaction fee:";

/// A confirmed operation: what was spent, what was built and the address state
/// after the transaction landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutcome {
    pub operation: String,
    pub tx_in: TxIn,
    pub draft: DraftTransaction,
    pub snapshot: AddressSnapshot,
}

/// Build, sign, submit and confirm transactions spending from the faucet address.
#[derive(Debug)]
pub struct RawTx {
    config: RawTxConfig,
    cli: CardanoCli,
    policies: PolicyManager,
    poller: ConfirmationPoller,
    tip: TipClient,
    locks: AddressLocks,
}

impl RawTx {
    pub fn new(config: RawTxConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let cli = CardanoCli::new(runner, &config.cli_path, config.network);
        Self {
            policies: PolicyManager::new(cli.clone()),
            poller: ConfirmationPoller::new(cli.clone(), config.confirmation.clone()),
            tip: TipClient::new(cli.clone(), config.tip.clone()),
            locks: AddressLocks::new(),
            cli,
            config,
        }
    }

    pub fn with_process_runner(config: RawTxConfig) -> Self {
        Self::new(config, Arc::new(ProcessRunner))
    }

    pub fn config(&self) -> &RawTxConfig {
        &self.config
    }

    pub fn layout(&self) -> &StateLayout {
        &self.config.layout
    }

    pub fn tip_client(&self) -> &TipClient {
        &self.tip
    }

    /// Creates the state tree and, on first run, the faucet's payment key and
    /// address. Returns the faucet address.
    #[instrument(skip(self), fields(network = %self.config.network))]
    pub async fn bootstrap(&self) -> Result<String> {
        let layout = self.layout();
        layout.ensure_dirs().await?;

        if !tokio::fs::try_exists(layout.payment_addr()).await? {
            if !tokio::fs::try_exists(layout.payment_skey()).await? {
                self.cli.key_gen(&layout.payment_vkey(), &layout.payment_skey()).await?;
            }
            self.cli
                .address_build(&layout.payment_vkey(), &layout.payment_addr())
                .await?;
            info!(path = %layout.payment_addr().display(), "generated faucet payment address");
        }

        let address = self.address().await?;
        info!(%address, "faucet ready");
        Ok(address)
    }

    /// The faucet's own address, as written by [`RawTx::bootstrap`].
    pub async fn address(&self) -> Result<String> {
        let address = tokio::fs::read_to_string(self.layout().payment_addr()).await?;
        let address = address.trim().to_string();
        validate_address("payment.addr", &address)?;
        Ok(address)
    }

    pub async fn clean_transients(&self) -> Result<usize> {
        self.layout().clean_transients().await
    }

    /// Snapshot of `address`, or of the faucet when `None`. Every entry is logged.
    pub async fn query_address(&self, address: Option<&str>) -> Result<AddressSnapshot> {
        let address = match address {
            Some(address) => address.to_string(),
            None => self.address().await?,
        };
        let snapshot = self.cli.query_utxo(&address).await?;
        info!(
            address = %snapshot.address,
            utxos = snapshot.utxos.len(),
            lovelace = snapshot.total_lovelace()?,
            "address queried"
        );
        for utxo in &snapshot.utxos {
            info!(
                address = %snapshot.address,
                tx_in = %utxo.tx_in(),
                lovelace = utxo.lovelace,
                assets = utxo.assets.len(),
                "utxo"
            );
        }
        Ok(snapshot)
    }

    #[instrument(skip(self, cancel))]
    pub async fn send_coin(&self, amount: u64, receiver: &str, cancel: &CancellationToken) -> Result<TxOutcome> {
        validate_address("receiver", receiver)?;
        let address = self.address().await?;
        let _lock = self.acquire(&address, cancel).await?;

        let input = self
            .select(&address, &InputRequirement::Lovelace, cancel)
            .await?;
        let builder = TransactionBuilder::new(
            input,
            &address,
            Recipe::SendCoin {
                amount,
                receiver: receiver.to_string(),
            },
        );
        self.submit_raw(&address, builder, None, cancel).await
    }

    #[instrument(skip(self, cancel))]
    pub async fn send_token(
        &self,
        token_name: &str,
        amount: u64,
        receiver: &str,
        cancel: &CancellationToken,
    ) -> Result<TxOutcome> {
        validate_address("receiver", receiver)?;
        validate_asset_name("token", token_name)?;
        let address = self.address().await?;
        let _lock = self.acquire(&address, cancel).await?;

        let requirement = InputRequirement::Asset {
            policy_id: None,
            asset_name: token_name,
            quantity: amount,
        };
        let input = self.select(&address, &requirement, cancel).await?;
        let builder = TransactionBuilder::new(
            input,
            &address,
            Recipe::SendToken {
                policy_id: None,
                asset_name: token_name.to_string(),
                amount,
                receiver: receiver.to_string(),
            },
        );
        self.submit_raw(&address, builder, None, cancel).await
    }

    /// Mints `amount` units to the faucet. The token's signature policy is created
    /// on first use and reused for every later mint and burn.
    #[instrument(skip(self, cancel))]
    pub async fn mint_token(&self, token_name: &str, amount: u64, cancel: &CancellationToken) -> Result<TxOutcome> {
        validate_asset_name("token", token_name)?;
        let address = self.address().await?;
        let _lock = self.acquire(&address, cancel).await?;

        let policy = cancellable(
            cancel,
            self.policies
                .load_or_create_token_policy(&self.layout().token_dir(token_name)),
        )
        .await?;
        let input = self
            .select(&address, &InputRequirement::Lovelace, cancel)
            .await?;
        let builder = TransactionBuilder::new(
            input,
            &address,
            Recipe::MintToken {
                policy_id: policy.policy_id.clone(),
                asset_name: token_name.to_string(),
                amount,
            },
        );
        self.submit_raw(&address, builder, Some(&policy), cancel).await
    }

    #[instrument(skip(self, cancel))]
    pub async fn burn_token(&self, token_name: &str, amount: u64, cancel: &CancellationToken) -> Result<TxOutcome> {
        validate_asset_name("token", token_name)?;
        let address = self.address().await?;
        let _lock = self.acquire(&address, cancel).await?;

        let policy = load_policy(&self.layout().token_dir(token_name)).await?;
        let requirement = InputRequirement::Asset {
            policy_id: Some(&policy.policy_id),
            asset_name: token_name,
            quantity: amount,
        };
        let input = self.select(&address, &requirement, cancel).await?;
        let builder = TransactionBuilder::new(
            input,
            &address,
            Recipe::BurnToken {
                policy_id: policy.policy_id.clone(),
                asset_name: token_name.to_string(),
                amount,
            },
        );
        self.submit_raw(&address, builder, Some(&policy), cancel).await
    }

    /// Mints a single NFT straight to `receiver`.
    ///
    /// Every mint gets a fresh time-locked policy whose lock lies
    /// `nft_slot_horizon` slots past the current tip. The CLI balances this
    /// transaction itself (`transaction build`), so the spent UTxO must hold ADA
    /// only.
    #[instrument(skip(self, metadata, cancel))]
    pub async fn mint_nft(
        &self,
        receiver: &str,
        token_name: &str,
        metadata: Value,
        cancel: &CancellationToken,
    ) -> Result<TxOutcome> {
        validate_address("receiver", receiver)?;
        validate_asset_name("token", token_name)?;
        let address = self.address().await?;
        let _lock = self.acquire(&address, cancel).await?;

        let input = self
            .select(&address, &InputRequirement::PureAda, cancel)
            .await?;

        let recipe = |policy_id: &str, before_slot: u64, output_lovelace: u64| Recipe::MintNft {
            policy_id: policy_id.to_string(),
            asset_name: token_name.to_string(),
            receiver: receiver.to_string(),
            metadata: metadata.clone(),
            before_slot,
            output_lovelace,
        };
        // Rejects an unaffordable mint before a policy key pair is written.
        TransactionBuilder::new(input.clone(), &address, recipe("", 0, MIN_ADA)).validate()?;

        let before_slot = cancellable(cancel, self.tip.future_slot(self.config.nft_slot_horizon)).await?;
        let dir = self.layout().nft_dir(token_name);
        let policy = cancellable(cancel, self.policies.create_time_locked_policy(&dir, before_slot)).await?;

        let metadata_file = dir.join("metadata.json");
        let document = nft_metadata(&policy.policy_id, token_name, &metadata);
        tokio::fs::write(&metadata_file, serde_json::to_string_pretty(&document)?).await?;

        let nft = AssetAmount::new(&policy.policy_id, token_name, NFT_QUANTITY);
        let nft_output = TxOut::new(receiver, 0, vec![nft]);
        let floor = match cancellable(
            cancel,
            self.cli
                .min_required_utxo(&nft_output, &self.layout().protocol_params()),
        )
        .await
        {
            Ok(required) => required.max(MIN_ADA),
            Err(RawTxError::Cancelled) => return Err(RawTxError::Cancelled),
            Err(err) => {
                warn!(%err, "minimum UTxO query failed, using the flat floor");
                MIN_ADA
            }
        };

        let recipe = |output_lovelace| recipe(&policy.policy_id, before_slot, output_lovelace);

        let scratch = self.layout().scratch("mint_nft");
        let result: Result<TxOutcome> = async {
            let mut builder = TransactionBuilder::new(input.clone(), &address, recipe(floor));
            builder.validate()?;
            transition(&scratch, "mint_nft", "input_selected");

            let mut output = self
                .build_balanced(&builder, &policy, &metadata_file, &scratch, cancel)
                .await?;

            if !output.success() {
                let Some(required) = parse_labelled_lovelace(&output.stderr, MIN_UTXO_LABEL) else {
                    return Err(build_failure(&output));
                };
                warn!(required, floor, "node asked for a larger NFT output, rebuilding once");
                builder = TransactionBuilder::new(input.clone(), &address, recipe(required.max(MIN_ADA)));
                builder.validate()?;
                output = self
                    .build_balanced(&builder, &policy, &metadata_file, &scratch, cancel)
                    .await?;
                if !output.success() {
                    return Err(match parse_labelled_lovelace(&output.stderr, MIN_UTXO_LABEL) {
                        Some(required) => RawTxError::MinimumUtxoViolation {
                            required: Some(required),
                            stderr: output.stderr.trim().to_string(),
                        },
                        None => build_failure(&output),
                    });
                }
            }

            let fee = parse_labelled_lovelace(&output.stdout, ESTIMATED_FEE_LABEL)
                .ok_or_else(|| RawTxError::ParseFailure(format!("no fee in `{}`", output.stdout.trim())))?;
            transition(&scratch, "mint_nft", "fee_known");
            let draft = builder.draft(fee)?;

            self.sign_submit_confirm(&address, &builder, draft, Some(&policy), &scratch, cancel)
                .await
        }
        .await;

        report(&scratch, "mint_nft", result)
    }

    async fn acquire(&self, address: &str, cancel: &CancellationToken) -> Result<OwnedMutexGuard<()>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RawTxError::Cancelled),
            guard = self.locks.lock(address) => Ok(guard),
        }
    }

    async fn select(
        &self,
        address: &str,
        requirement: &InputRequirement<'_>,
        cancel: &CancellationToken,
    ) -> Result<UtxoEntry> {
        let snapshot = cancellable(cancel, self.cli.query_utxo(address)).await?;
        let input = select_input(&snapshot, self.config.input_selection, requirement)?;
        debug!(tx_in = %input.tx_in(), lovelace = input.lovelace, "selected input");
        Ok(input.clone())
    }

    /// Two-pass raw build: draft with the placeholder fee, ask the node for the
    /// real fee of that body, rebuild with it.
    async fn submit_raw(
        &self,
        address: &str,
        builder: TransactionBuilder,
        policy: Option<&MintingPolicy>,
        cancel: &CancellationToken,
    ) -> Result<TxOutcome> {
        let operation = builder.recipe().operation();
        let scratch = self.layout().scratch(operation);
        let mint_script = policy.map(|p| p.script_file.as_path());

        let result: Result<TxOutcome> = async {
            builder.validate()?;
            transition(&scratch, operation, "input_selected");

            let placeholder = builder.draft(builder.placeholder_fee())?;
            cancellable(cancel, self.cli.build_raw(&placeholder, &scratch.body, mint_script, None)).await?;
            transition(&scratch, operation, "draft_built");

            let fee = cancellable(
                cancel,
                self.cli.estimate_fee(
                    &scratch.body,
                    placeholder.inputs.len(),
                    placeholder.outputs.len(),
                    builder.witness_count(),
                    &self.layout().protocol_params(),
                ),
            )
            .await?;
            transition(&scratch, operation, "fee_known");

            let draft = builder.draft(fee)?;
            cancellable(cancel, self.cli.build_raw(&draft, &scratch.body, mint_script, None)).await?;
            transition(&scratch, operation, "draft_final");

            self.sign_submit_confirm(address, &builder, draft, policy, &scratch, cancel)
                .await
        }
        .await;

        report(&scratch, operation, result)
    }

    async fn build_balanced(
        &self,
        builder: &TransactionBuilder,
        policy: &MintingPolicy,
        metadata_file: &Path,
        scratch: &ScratchFiles,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput> {
        let draft = builder.draft(0)?;
        // The change output is derived by the CLI.
        let receiver_output: Vec<TxOut> = draft.outputs.first().cloned().into_iter().collect();
        let request = BuildRequest {
            inputs: &draft.inputs,
            outputs: &receiver_output,
            change_address: builder.change_address(),
            mint: draft.mint.as_ref().map(|m| (m, policy.script_file.as_path())),
            metadata_file: Some(metadata_file),
            invalid_hereafter: draft.invalid_after_slot,
            witness_override: builder.witness_count(),
            out_file: &scratch.body,
        };
        cancellable(cancel, self.cli.build(&request)).await
    }

    async fn sign_submit_confirm(
        &self,
        address: &str,
        builder: &TransactionBuilder,
        draft: DraftTransaction,
        policy: Option<&MintingPolicy>,
        scratch: &ScratchFiles,
        cancel: &CancellationToken,
    ) -> Result<TxOutcome> {
        let operation = builder.recipe().operation();
        let mut signing_keys = vec![self.layout().payment_skey()];
        if let Some(policy) = policy {
            signing_keys.push(policy.signing_key.clone());
        }

        cancellable(cancel, self.cli.sign(&scratch.body, &signing_keys, &scratch.signed)).await?;
        transition(scratch, operation, "signed");

        cancellable(cancel, self.cli.submit(&scratch.signed)).await?;
        transition(scratch, operation, "submitted");

        let tx_in = builder.input().tx_in();
        let mut snapshot = self.poller.await_new_utxo(address, &tx_in, cancel).await?;
        if let Some(policy) = policy {
            snapshot = snapshot.with_policy_id(&policy.policy_id);
        }
        transition(scratch, operation, "confirmed");

        Ok(TxOutcome {
            operation: operation.to_string(),
            tx_in,
            draft,
            snapshot,
        })
    }
}

async fn cancellable<T>(cancel: &CancellationToken, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RawTxError::Cancelled),
        result = fut => result,
    }
}

fn transition(scratch: &ScratchFiles, operation: &str, state: &'static str) {
    debug!(op_id = %scratch.id, operation, state, "pipeline transition");
}

fn report(scratch: &ScratchFiles, operation: &str, result: Result<TxOutcome>) -> Result<TxOutcome> {
    result.map_err(|err| {
        debug!(op_id = %scratch.id, operation, state = "failed", "pipeline transition");
        popsicle_error::error!(err)
    })
}

fn build_failure(output: &ProcessOutput) -> RawTxError {
    RawTxError::ProcessFailure {
        command: "cardano-cli transaction build".to_string(),
        exit_code: output.exit_code,
        stderr: output.stderr.trim().to_string(),
    }
}
