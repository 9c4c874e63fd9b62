#![allow(dead_code)]

use std::{
    collections::VecDeque,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use popsicle_rawtx::{
    command::Invocation, CommandRunner, ProcessOutput, RawTx, RawTxConfig, RawTxError, RetryPolicy,
};
use popsicle_transactions::{AssetAmount, UtxoEntry};
use popsicle_utxo_parser::render_table;

pub const FAUCET: &str = "addr_test1vqxyz0pjs7ypd2x0ekcxd7rdw0u3ap5ts9e9jh4m7qk8yqgqk4z8n";
pub const RECEIVER: &str = "addr_test1vzlkq6s9x8s2ueckq5yhg9tv4g3d6jwxhkqhsxdm0j8acyqwjx9tf";
pub const POLICY_ID: &str = "e0b3a2d6a8f0d1f7c2b1a0e9d8c7b6a5f4e3d2c1b0a9f8e7d6c5b4a3";
pub const KEY_HASH: &str = "5a1e7c3b9d2f4e6a8c0b1d3f5e7a9c2b4d6f8e0a1c3e5b7d9f2a4c6e";

struct Rule {
    verb: Vec<&'static str>,
    responses: VecDeque<ProcessOutput>,
    writes: Option<String>,
}

/// Replays canned CLI output per verb and records every invocation.
///
/// Responses for a verb are consumed in order; the last one repeats. A rule
/// registered later for the same verb takes precedence.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, verb: &[&'static str], responses: impl IntoIterator<Item = ProcessOutput>) -> Self {
        self.rules.lock().unwrap().push(Rule {
            verb: verb.to_vec(),
            responses: responses.into_iter().collect(),
            writes: None,
        });
        self
    }

    pub fn ok(self, verb: &[&'static str], stdout: &str) -> Self {
        self.on(verb, [ProcessOutput::ok(stdout)])
    }

    /// Succeeds and writes `contents` to every output file the command names.
    pub fn writing(self, verb: &[&'static str], contents: &str) -> Self {
        self.rules.lock().unwrap().push(Rule {
            verb: verb.to_vec(),
            responses: VecDeque::from([ProcessOutput::ok("")]),
            writes: Some(contents.to_string()),
        });
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, verb: &[&str]) -> Vec<Invocation> {
        self.calls().into_iter().filter(|c| c.is(verb)).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, RawTxError> {
        self.calls.lock().unwrap().push(invocation.clone());

        let mut rules = self.rules.lock().unwrap();
        let Some(rule) = rules.iter_mut().rev().find(|r| invocation.is(&r.verb)) else {
            return Ok(ProcessOutput::failed(1, format!("unscripted: {invocation}")));
        };

        if let Some(contents) = &rule.writes {
            for flag in ["--out-file", "--verification-key-file", "--signing-key-file"] {
                if let Some(path) = invocation.value_of(flag) {
                    std::fs::write(path, contents).unwrap();
                }
            }
        }

        let response = if rule.responses.len() > 1 {
            rule.responses.pop_front().unwrap()
        } else {
            rule.responses.front().cloned().unwrap_or_default()
        };
        Ok(response)
    }
}

pub fn utxo(hash: char, ix: u32, lovelace: u64, assets: Vec<AssetAmount>) -> UtxoEntry {
    UtxoEntry {
        tx_hash: hash.to_string().repeat(64),
        output_index: ix,
        lovelace,
        assets,
    }
}

pub fn table(entries: &[UtxoEntry]) -> ProcessOutput {
    ProcessOutput::ok(render_table(entries))
}

pub fn fast_config(root: &Path) -> RawTxConfig {
    RawTxConfig::testnet(root).with_retry(
        RetryPolicy::fixed(Duration::from_millis(1), 5),
        RetryPolicy::fixed(Duration::from_millis(1), 3),
    )
}

/// A bootstrapped faucet whose payment address already exists.
pub async fn faucet(runner: ScriptedRunner) -> (tempfile::TempDir, RawTx, Arc<ScriptedRunner>) {
    let runner = Arc::new(runner);
    let (root, rawtx) = faucet_with(runner.clone()).await;
    (root, rawtx, runner)
}

pub async fn faucet_with<R: CommandRunner + 'static>(runner: Arc<R>) -> (tempfile::TempDir, RawTx) {
    let root = tempfile::tempdir().unwrap();
    let config = fast_config(root.path());
    config.layout.ensure_dirs().await.unwrap();
    std::fs::write(config.layout.payment_addr(), format!("{FAUCET}\n")).unwrap();

    let rawtx = RawTx::new(config, runner);
    (root, rawtx)
}

/// The routine verbs every raw pipeline touches.
pub fn with_raw_verbs(runner: ScriptedRunner, fee: u64) -> ScriptedRunner {
    runner
        .ok(&["transaction", "build-raw"], "")
        .ok(&["query", "protocol-parameters"], "")
        .ok(&["transaction", "calculate-min-fee"], &format!("{fee} Lovelace\n"))
        .ok(&["transaction", "sign"], "")
        .ok(&["transaction", "submit"], "Transaction successfully submitted.\n")
}

pub fn with_policy_verbs(runner: ScriptedRunner) -> ScriptedRunner {
    runner
        .writing(&["address", "key-gen"], "{\"type\": \"PaymentSigningKeyShelley_ed25519\"}")
        .ok(&["address", "key-hash"], &format!("{KEY_HASH}\n"))
        .ok(&["transaction", "policyid"], &format!("{POLICY_ID}\n"))
}
