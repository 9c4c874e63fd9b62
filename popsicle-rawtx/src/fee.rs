use std::path::Path;

use popsicle_transactions::TxOut;
use tracing::debug;

use crate::{
    cli::CardanoCli,
    error::{RawTxError, Result},
};

impl CardanoCli {
    /// Minimum fee for the body in `body_file`.
    ///
    /// Protocol parameters change at epoch boundaries, so they are fetched again
    /// before every calculation.
    pub async fn estimate_fee(
        &self,
        body_file: &Path,
        tx_in_count: usize,
        tx_out_count: usize,
        witness_count: usize,
        protocol_file: &Path,
    ) -> Result<u64> {
        self.query_protocol_parameters(protocol_file).await?;
        let stdout = self
            .calculate_min_fee(body_file, tx_in_count, tx_out_count, witness_count, protocol_file)
            .await?;
        let fee = parse_leading_integer(&stdout)?;
        debug!(fee, tx_in_count, tx_out_count, witness_count, "estimated fee");
        Ok(fee)
    }

    /// Ledger minimum for `output`, from a structured CLI query.
    pub async fn min_required_utxo(&self, output: &TxOut, protocol_file: &Path) -> Result<u64> {
        self.query_protocol_parameters(protocol_file).await?;
        let stdout = self.calculate_min_required_utxo(output, protocol_file).await?;
        parse_trailing_integer(&stdout)
    }
}

/// `170000 Lovelace` -> 170000
pub fn parse_leading_integer(stdout: &str) -> Result<u64> {
    stdout
        .split_whitespace()
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| RawTxError::ParseFailure(format!("expected a leading integer in `{}`", stdout.trim())))
}

/// `Lovelace 1444443` -> 1444443
pub fn parse_trailing_integer(stdout: &str) -> Result<u64> {
    stdout
        .split_whitespace()
        .last()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| RawTxError::ParseFailure(format!("expected a trailing integer in `{}`", stdout.trim())))
}

/// Finds `<label> Lovelace N` (or `<label> N`) anywhere in `text`.
pub fn parse_labelled_lovelace(text: &str, label: &str) -> Option<u64> {
    let rest = &text[text.find(label)? + label.len()..];
    let rest = rest.trim_start();
    let rest = rest.strip_prefix("Lovelace").unwrap_or(rest).trim_start();
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
