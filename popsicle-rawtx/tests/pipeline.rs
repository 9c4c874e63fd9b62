mod common;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use common::*;
use popsicle_rawtx::{command::Invocation, CommandRunner, ProcessOutput, RawTxError};
use popsicle_transactions::{constants::MIN_ADA, AssetAmount, TxBuildError, TxOut};
use serde_json::json;
use tokio_util::sync::CancellationToken;

mod send_coin {
    use super::*;

    #[tokio::test]
    async fn two_pass_build_sign_submit_confirm() {
        let before = utxo('a', 0, 1_000_000_000, vec![]);
        let after = utxo('b', 1, 994_830_000, vec![]);
        let runner = with_raw_verbs(ScriptedRunner::new(), 170_000).on(
            &["query", "utxo"],
            [table(&[before.clone()]), table(&[before]), table(&[after.clone()])],
        );
        let (root, rawtx, runner) = faucet(runner).await;

        let outcome = rawtx
            .send_coin(5_000_000, RECEIVER, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.operation, "send_coin");
        assert_eq!(outcome.draft.fee, 170_000);
        assert_eq!(
            outcome.draft.outputs,
            vec![
                TxOut::new(RECEIVER, 5_000_000, vec![]),
                TxOut::new(FAUCET, 994_830_000, vec![]),
            ]
        );
        assert_eq!(outcome.snapshot.utxos, vec![after]);
        assert_eq!(outcome.tx_in.to_string(), format!("{}#0", "a".repeat(64)));

        let builds = runner.calls_to(&["transaction", "build-raw"]);
        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].value_of("--fee"), Some("0"));
        assert_eq!(builds[1].value_of("--fee"), Some("170000"));
        assert_eq!(
            builds[1].values_of("--tx-out").collect::<Vec<_>>(),
            vec![format!("{RECEIVER}+5000000"), format!("{FAUCET}+994830000")]
        );

        let fee_calls = runner.calls_to(&["transaction", "calculate-min-fee"]);
        assert_eq!(fee_calls[0].value_of("--witness-count"), Some("1"));
        assert_eq!(fee_calls[0].value_of("--tx-out-count"), Some("2"));
        assert_eq!(runner.calls_to(&["query", "protocol-parameters"]).len(), 1);

        let sign = &runner.calls_to(&["transaction", "sign"])[0];
        assert_eq!(sign.values_of("--signing-key-file").count(), 1);
        assert_eq!(runner.calls_to(&["transaction", "submit"]).len(), 1);

        let tmp = root.path().join("tmp").join("testnet");
        assert_eq!(std::fs::read_dir(tmp).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn bad_receiver_never_reaches_the_cli() {
        let (_root, rawtx, runner) = faucet(ScriptedRunner::new()).await;
        let err = rawtx
            .send_coin(1, "addr_test1 --mainnet", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RawTxError::InvalidArgument { .. }));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn overspend_fails_before_building() {
        let runner = with_raw_verbs(ScriptedRunner::new(), 170_000)
            .on(&["query", "utxo"], [table(&[utxo('a', 0, 1_000_000, vec![])])]);
        let (_root, rawtx, runner) = faucet(runner).await;

        let err = rawtx
            .send_coin(2_000_000, RECEIVER, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RawTxError::Build(TxBuildError::InsufficientFunds { .. })
        ));
        assert!(runner.calls_to(&["transaction", "build-raw"]).is_empty());
    }

    #[tokio::test]
    async fn unconfirmed_transaction_times_out() {
        let stuck = utxo('a', 0, 1_000_000_000, vec![]);
        let runner = with_raw_verbs(ScriptedRunner::new(), 170_000).on(&["query", "utxo"], [table(&[stuck])]);
        let (_root, rawtx, runner) = faucet(runner).await;

        let err = rawtx
            .send_coin(5_000_000, RECEIVER, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RawTxError::ConfirmationTimeout { attempts: 5, .. }));
        // One selection query plus five polls.
        assert_eq!(runner.calls_to(&["query", "utxo"]).len(), 6);
    }

    #[tokio::test]
    async fn failed_confirmation_query_keeps_waiting() {
        let before = utxo('a', 0, 1_000_000_000, vec![]);
        let after = utxo('b', 1, 994_830_000, vec![]);
        let runner = with_raw_verbs(ScriptedRunner::new(), 170_000).on(
            &["query", "utxo"],
            [
                table(&[before]),
                ProcessOutput::failed(1, "cardano-cli: Network.Socket.connect: resource vanished"),
                table(&[after.clone()]),
            ],
        );
        let (_root, rawtx, runner) = faucet(runner).await;

        let outcome = rawtx
            .send_coin(5_000_000, RECEIVER, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.snapshot.utxos, vec![after]);
        assert_eq!(runner.calls_to(&["query", "utxo"]).len(), 3);
        assert_eq!(runner.calls_to(&["transaction", "submit"]).len(), 1);
    }

    #[tokio::test]
    async fn cancelled_operation_stops() {
        let runner = with_raw_verbs(ScriptedRunner::new(), 170_000)
            .on(&["query", "utxo"], [table(&[utxo('a', 0, 1_000_000_000, vec![])])]);
        let (_root, rawtx, runner) = faucet(runner).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = rawtx.send_coin(5_000_000, RECEIVER, &cancel).await.unwrap_err();
        assert!(matches!(err, RawTxError::Cancelled));
        assert!(runner.calls_to(&["transaction", "submit"]).is_empty());
    }
}

mod serialization {
    use super::*;

    /// Holds the first `query utxo` until the test opens the gate.
    struct Gated {
        inner: ScriptedRunner,
        held: AtomicBool,
        entered: tokio::sync::Notify,
        gate: tokio::sync::Notify,
    }

    #[async_trait]
    impl CommandRunner for Gated {
        async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, RawTxError> {
            if invocation.is(&["query", "utxo"]) && !self.held.swap(true, Ordering::SeqCst) {
                self.entered.notify_one();
                self.gate.notified().await;
            }
            self.inner.run(invocation).await
        }
    }

    #[tokio::test]
    async fn second_operation_selects_after_the_first_confirms() {
        let first = utxo('a', 0, 1_000_000_000, vec![]);
        let change = utxo('b', 1, 994_830_000, vec![]);
        let change_again = utxo('c', 1, 989_660_000, vec![]);
        let runner = Arc::new(Gated {
            inner: with_raw_verbs(ScriptedRunner::new(), 170_000).on(
                &["query", "utxo"],
                [
                    table(&[first]),
                    table(&[change.clone()]),
                    table(&[change.clone()]),
                    table(&[change_again]),
                ],
            ),
            held: AtomicBool::new(false),
            entered: tokio::sync::Notify::new(),
            gate: tokio::sync::Notify::new(),
        });
        let (_root, rawtx) = faucet_with(runner.clone()).await;
        let rawtx = Arc::new(rawtx);

        let send = |rawtx: Arc<popsicle_rawtx::RawTx>| async move {
            rawtx
                .send_coin(5_000_000, RECEIVER, &CancellationToken::new())
                .await
        };
        let a = tokio::spawn(send(rawtx.clone()));
        runner.entered.notified().await;

        let b = tokio::spawn(send(rawtx.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!b.is_finished());
        assert!(runner.inner.calls().is_empty());

        runner.gate.notify_one();
        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        assert_eq!(a.tx_in.to_string(), format!("{}#0", "a".repeat(64)));
        assert_eq!(b.tx_in, change.tx_in());

        let calls = runner.inner.calls();
        let first_submit = calls
            .iter()
            .position(|c| c.is(&["transaction", "submit"]))
            .unwrap();
        let second_selection = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is(&["query", "utxo"]))
            .nth(2)
            .map(|(ix, _)| ix)
            .unwrap();
        assert!(second_selection > first_submit);
        assert_eq!(runner.inner.calls_to(&["transaction", "submit"]).len(), 2);
    }
}

mod tokens {
    use super::*;

    fn tok(qty: u64) -> AssetAmount {
        AssetAmount::new(POLICY_ID, "TOK", qty)
    }

    #[tokio::test]
    async fn send_token_moves_asset_with_min_ada() {
        let before = utxo('a', 0, 1_000_000_000, vec![tok(100)]);
        let after = utxo('c', 1, 998_420_000, vec![tok(70)]);
        let runner = with_raw_verbs(ScriptedRunner::new(), 180_000)
            .on(&["query", "utxo"], [table(&[before]), table(&[after])]);
        let (_root, rawtx, runner) = faucet(runner).await;

        let outcome = rawtx
            .send_token("TOK", 30, RECEIVER, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.draft.outputs[0], TxOut::new(RECEIVER, MIN_ADA, vec![tok(30)]));
        assert_eq!(
            outcome.draft.outputs[1],
            TxOut::new(FAUCET, 1_000_000_000 - MIN_ADA - 180_000, vec![tok(70)])
        );
        let last_build = runner.calls_to(&["transaction", "build-raw"]).pop().unwrap();
        assert_eq!(
            last_build.values_of("--tx-out").next(),
            Some(format!("{RECEIVER}+1400000+30 {POLICY_ID}.TOK").as_str())
        );
    }

    #[tokio::test]
    async fn mint_reuses_the_token_policy() {
        let first = utxo('a', 0, 1_000_000_000, vec![]);
        let second = utxo('b', 0, 999_800_000, vec![tok(5)]);
        let third = utxo('c', 0, 999_600_000, vec![tok(10)]);
        let runner = with_policy_verbs(with_raw_verbs(ScriptedRunner::new(), 200_000)).on(
            &["query", "utxo"],
            [table(&[first]), table(&[second.clone()]), table(&[second]), table(&[third])],
        );
        let (root, rawtx, runner) = faucet(runner).await;
        let cancel = CancellationToken::new();

        let one = rawtx.mint_token("TOK", 5, &cancel).await.unwrap();
        let two = rawtx.mint_token("TOK", 5, &cancel).await.unwrap();

        assert_eq!(runner.calls_to(&["address", "key-gen"]).len(), 1);
        assert_eq!(runner.calls_to(&["transaction", "policyid"]).len(), 1);
        assert_eq!(one.snapshot.policy_id.as_deref(), Some(POLICY_ID));
        assert_eq!(two.snapshot.policy_id.as_deref(), Some(POLICY_ID));
        assert_eq!(two.draft.outputs, vec![TxOut::new(FAUCET, 999_600_000, vec![tok(10)])]);

        let token_dir = root.path().join("priv/testnet/tokens/TOK");
        assert_eq!(std::fs::read_to_string(token_dir.join("policyID")).unwrap(), POLICY_ID);
        let script: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(token_dir.join("policy.script")).unwrap()).unwrap();
        assert_eq!(script, json!({"type": "sig", "keyHash": KEY_HASH}));

        let build = &runner.calls_to(&["transaction", "build-raw"])[0];
        assert!(build.args.contains(&format!("--mint=5 {POLICY_ID}.TOK")));
        assert_eq!(build.value_of("--fee"), Some("300000"));
        let sign = &runner.calls_to(&["transaction", "sign"])[0];
        assert_eq!(sign.values_of("--signing-key-file").count(), 2);
        let fee_call = &runner.calls_to(&["transaction", "calculate-min-fee"])[0];
        assert_eq!(fee_call.value_of("--witness-count"), Some("2"));
    }

    #[tokio::test]
    async fn burn_needs_an_existing_policy() {
        let (_root, rawtx, runner) = faucet(ScriptedRunner::new()).await;
        let err = rawtx
            .burn_token("TOK", 1, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RawTxError::PolicyNotFound(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn burning_the_whole_balance_drops_the_asset() {
        let before = utxo('a', 0, 1_000_000_000, vec![tok(100)]);
        let after = utxo('d', 0, 999_810_000, vec![]);
        let runner = with_raw_verbs(ScriptedRunner::new(), 190_000)
            .on(&["query", "utxo"], [table(&[before]), table(&[after])]);
        let (root, rawtx, runner) = faucet(runner).await;

        let dir = root.path().join("priv/testnet/tokens/TOK");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("policy.skey"), "{}").unwrap();
        std::fs::write(dir.join("policyID"), format!("{POLICY_ID}\n")).unwrap();
        std::fs::write(
            dir.join("policy.script"),
            json!({"type": "sig", "keyHash": KEY_HASH}).to_string(),
        )
        .unwrap();

        let outcome = rawtx
            .burn_token("TOK", 100, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.draft.outputs, vec![TxOut::new(FAUCET, 999_810_000, vec![])]);
        assert_eq!(outcome.draft.mint.as_ref().map(|m| m.quantity), Some(-100));
        let build = runner.calls_to(&["transaction", "build-raw"]).pop().unwrap();
        assert!(build.args.contains(&format!("--mint=-100 {POLICY_ID}.TOK")));
        assert_eq!(runner.calls_to(&["address", "key-gen"]).len(), 0);
    }

    #[tokio::test]
    async fn burning_more_than_held_is_refused() {
        let runner = with_raw_verbs(ScriptedRunner::new(), 190_000)
            .on(&["query", "utxo"], [table(&[utxo('a', 0, 5_000_000, vec![tok(3)])])]);
        let (root, rawtx, runner) = faucet(runner).await;
        let dir = root.path().join("priv/testnet/tokens/TOK");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("policy.skey"), "{}").unwrap();
        std::fs::write(dir.join("policyID"), POLICY_ID).unwrap();
        std::fs::write(dir.join("policy.script"), json!({"type": "sig", "keyHash": KEY_HASH}).to_string()).unwrap();

        let err = rawtx
            .burn_token("TOK", 4, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RawTxError::Build(TxBuildError::InsufficientAssetBalance { requested: 4, held: 3, .. })
        ));
        assert!(runner.calls_to(&["transaction", "build-raw"]).is_empty());
    }
}

mod nft {
    use super::*;

    const MIN_UTXO_ERROR: &str =
        "Command failed: transaction build  Error: Minimum required UTxO: Lovelace 1448244\n";

    fn nft_runner(builds: Vec<ProcessOutput>) -> ScriptedRunner {
        let before = utxo('a', 0, 50_000_000, vec![]);
        let after = utxo('e', 1, 48_373_011, vec![]);
        with_policy_verbs(ScriptedRunner::new())
            .ok(&["query", "tip"], r#"{"slot": 1000, "era": "Alonzo"}"#)
            .ok(&["query", "protocol-parameters"], "")
            .on(
                &["transaction", "calculate-min-required-utxo"],
                [ProcessOutput::failed(1, "unknown command")],
            )
            .on(&["transaction", "build"], builds)
            .ok(&["transaction", "sign"], "")
            .ok(&["transaction", "submit"], "")
            .on(&["query", "utxo"], [table(&[before]), table(&[after])])
    }

    #[tokio::test]
    async fn minimum_utxo_shim_retries_once() {
        let runner = nft_runner(vec![
            ProcessOutput::failed(1, MIN_UTXO_ERROR),
            ProcessOutput::ok("Estimated transaction fee: Lovelace 178745\n"),
        ]);
        let (root, rawtx, runner) = faucet(runner).await;

        let outcome = rawtx
            .mint_nft(RECEIVER, "Art", json!({"name": "Art"}), &CancellationToken::new())
            .await
            .unwrap();

        let nft = AssetAmount::new(POLICY_ID, "Art", 1);
        assert_eq!(outcome.draft.fee, 178_745);
        assert_eq!(outcome.draft.invalid_after_slot, Some(11_000));
        assert_eq!(
            outcome.draft.outputs,
            vec![
                TxOut::new(RECEIVER, 1_448_244, vec![nft]),
                TxOut::new(FAUCET, 50_000_000 - 1_448_244 - 178_745, vec![]),
            ]
        );

        let builds = runner.calls_to(&["transaction", "build"]);
        assert_eq!(builds.len(), 2);
        assert_eq!(
            builds[0].value_of("--tx-out"),
            Some(format!("{RECEIVER}+{MIN_ADA}+1 {POLICY_ID}.Art").as_str())
        );
        assert_eq!(
            builds[1].value_of("--tx-out"),
            Some(format!("{RECEIVER}+1448244+1 {POLICY_ID}.Art").as_str())
        );
        assert_eq!(builds[1].value_of("--change-address"), Some(FAUCET));
        assert_eq!(builds[1].value_of("--invalid-hereafter"), Some("11000"));
        assert_eq!(builds[1].value_of("--witness-override"), Some("2"));

        let nft_dir = root.path().join("priv/testnet/nfts/Art");
        let metadata: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(nft_dir.join("metadata.json")).unwrap()).unwrap();
        assert_eq!(metadata, json!({"721": {POLICY_ID: {"Art": {"name": "Art"}}}}));
        let script: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(nft_dir.join("policy.script")).unwrap()).unwrap();
        assert_eq!(script["scripts"][0], json!({"type": "before", "slot": 11_000}));
    }

    #[tokio::test]
    async fn second_minimum_utxo_failure_is_reported() {
        let runner = nft_runner(vec![ProcessOutput::failed(1, MIN_UTXO_ERROR)]);
        let (_root, rawtx, runner) = faucet(runner).await;

        let err = rawtx
            .mint_nft(RECEIVER, "Art", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RawTxError::MinimumUtxoViolation {
                required: Some(1_448_244),
                ..
            }
        ));
        assert_eq!(runner.calls_to(&["transaction", "build"]).len(), 2);
        assert!(runner.calls_to(&["transaction", "submit"]).is_empty());
    }

    #[tokio::test]
    async fn every_nft_gets_a_fresh_policy() {
        let runner = nft_runner(vec![ProcessOutput::ok("Estimated transaction fee: Lovelace 178745\n")]).on(
            &["query", "utxo"],
            [
                table(&[utxo('a', 0, 50_000_000, vec![])]),
                table(&[utxo('b', 0, 48_000_000, vec![])]),
                table(&[utxo('b', 0, 48_000_000, vec![])]),
                table(&[utxo('c', 0, 46_000_000, vec![])]),
            ],
        );
        let (_root, rawtx, runner) = faucet(runner).await;
        let cancel = CancellationToken::new();

        rawtx.mint_nft(RECEIVER, "Art", json!({}), &cancel).await.unwrap();
        rawtx.mint_nft(RECEIVER, "Art", json!({}), &cancel).await.unwrap();
        assert_eq!(runner.calls_to(&["address", "key-gen"]).len(), 2);
    }

    #[tokio::test]
    async fn ledger_minimum_sizes_the_first_build() {
        let runner = nft_runner(vec![ProcessOutput::ok("Estimated transaction fee: Lovelace 178745\n")])
            .ok(&["transaction", "calculate-min-required-utxo"], "Lovelace 1500000\n");
        let (_root, rawtx, runner) = faucet(runner).await;

        let outcome = rawtx
            .mint_nft(RECEIVER, "Art", json!({}), &CancellationToken::new())
            .await
            .unwrap();

        let builds = runner.calls_to(&["transaction", "build"]);
        assert_eq!(builds.len(), 1);
        assert_eq!(
            builds[0].value_of("--tx-out"),
            Some(format!("{RECEIVER}+1500000+1 {POLICY_ID}.Art").as_str())
        );
        assert_eq!(outcome.draft.outputs[0].lovelace, 1_500_000);
    }

    #[tokio::test]
    async fn ledger_minimum_below_the_floor_is_raised() {
        let runner = nft_runner(vec![ProcessOutput::ok("Estimated transaction fee: Lovelace 178745\n")])
            .ok(&["transaction", "calculate-min-required-utxo"], "Lovelace 969750\n");
        let (_root, rawtx, runner) = faucet(runner).await;

        rawtx
            .mint_nft(RECEIVER, "Art", json!({}), &CancellationToken::new())
            .await
            .unwrap();

        let builds = runner.calls_to(&["transaction", "build"]);
        assert_eq!(
            builds[0].value_of("--tx-out"),
            Some(format!("{RECEIVER}+{MIN_ADA}+1 {POLICY_ID}.Art").as_str())
        );
    }

    #[tokio::test]
    async fn unaffordable_mint_creates_no_policy() {
        let runner = nft_runner(vec![]).on(&["query", "utxo"], [table(&[utxo('a', 0, 1_000_000, vec![])])]);
        let (root, rawtx, runner) = faucet(runner).await;

        let err = rawtx
            .mint_nft(RECEIVER, "Art", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RawTxError::Build(TxBuildError::InsufficientFunds { .. })
        ));
        assert!(runner.calls_to(&["address", "key-gen"]).is_empty());
        assert!(runner.calls_to(&["query", "tip"]).is_empty());
        assert!(!root.path().join("priv/testnet/nfts/Art").exists());
    }

    #[tokio::test]
    async fn asset_bearing_address_cannot_mint() {
        let runner = nft_runner(vec![]).on(
            &["query", "utxo"],
            [table(&[utxo('a', 0, 50_000_000, vec![AssetAmount::new(POLICY_ID, "TOK", 1)])])],
        );
        let (_root, rawtx, runner) = faucet(runner).await;
        let err = rawtx
            .mint_nft(RECEIVER, "Art", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RawTxError::Build(TxBuildError::UnbalancedAssets)));
        assert!(runner.calls_to(&["address", "key-gen"]).is_empty());
    }
}
