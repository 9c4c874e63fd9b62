//! Parser for the table printed by `cardano-cli query utxo`.
//!
//! ```text
//!                            TxHash                                 TxIx        Amount
//! --------------------------------------------------------------------------------------
//! 4e3a6e7fdcb0d0efa17bf79c13aed2b4cb9baf37fb1aa2e39553d5bd720c5c99     0        1000000000 lovelace + 100 e0b3.TOK + TxOutDatumNone
//! ```
//!
//! The CLI makes no promise about this layout, so the parser is strict about the
//! parts a transaction depends on (hash, index, lovelace) and lenient about the
//! rest: an asset segment it cannot read makes the entry fall back to
//! `assets: []` instead of failing the whole query.

mod error;

use popsicle_safe_math::safe_add;
use popsicle_transactions::{AddressSnapshot, AssetAmount, UtxoEntry};
use tracing::warn;

pub use error::UtxoParseError;

pub type Result<T> = core::result::Result<T, UtxoParseError>;

const HEADER_LINES: usize = 2;
const TX_HASH_LEN: usize = 64;
const DATUM_PREFIX: &str = "TxOutDatum";

/// Parses the full stdout of `query utxo`, header included.
pub fn parse_utxo_table(stdout: &str) -> Result<Vec<UtxoEntry>> {
    stdout
        .lines()
        .enumerate()
        .skip(HEADER_LINES)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| parse_line(idx + 1, line))
        .collect()
}

pub fn parse_snapshot(address: &str, stdout: &str) -> Result<AddressSnapshot> {
    Ok(AddressSnapshot::new(address, parse_utxo_table(stdout)?))
}

fn parse_line(line_no: usize, line: &str) -> Result<UtxoEntry> {
    let mut columns = line.split_whitespace();

    let tx_hash = columns.next().unwrap_or_default();
    if tx_hash.len() != TX_HASH_LEN || !tx_hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(UtxoParseError::InvalidTxHash {
            line: line_no,
            found: tx_hash.to_string(),
        });
    }

    let index = columns.next().unwrap_or_default();
    let output_index = index.parse::<u32>().map_err(|_| UtxoParseError::InvalidOutputIndex {
        line: line_no,
        found: index.to_string(),
    })?;

    let amount = columns.collect::<Vec<_>>().join(" ");
    if amount.is_empty() {
        return Err(UtxoParseError::MissingAmount { line: line_no });
    }

    let mut segments = amount.split('+').map(str::trim);
    let lovelace = segments
        .next()
        .and_then(parse_lovelace)
        .ok_or(UtxoParseError::MissingLovelace { line: line_no })?;

    let mut assets: Vec<AssetAmount> = Vec::new();
    for segment in segments {
        if segment.is_empty() || segment.starts_with(DATUM_PREFIX) {
            continue;
        }
        let Some(asset) = parse_asset(segment) else {
            warn!(line = line_no, segment, "unreadable asset segment, keeping lovelace only");
            assets.clear();
            break;
        };
        match assets.iter_mut().find(|a| a.is(&asset.policy_id, &asset.asset_name)) {
            Some(existing) => existing.quantity = safe_add(existing.quantity, asset.quantity)?,
            None => assets.push(asset),
        }
    }

    Ok(UtxoEntry {
        tx_hash: tx_hash.to_string(),
        output_index,
        lovelace,
        assets,
    })
}

fn parse_lovelace(segment: &str) -> Option<u64> {
    let mut parts = segment.split_whitespace();
    let quantity = parts.next()?.parse().ok()?;
    match (parts.next(), parts.next()) {
        (Some("lovelace"), None) => Some(quantity),
        _ => None,
    }
}

/// `<qty> <policy>.<name>` or `<qty> <policy>`.
fn parse_asset(segment: &str) -> Option<AssetAmount> {
    let mut parts = segment.split_whitespace();
    let quantity = parts.next()?.parse::<u64>().ok()?;
    let unit = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let (policy_id, asset_name) = unit.split_once('.').unwrap_or((unit, ""));
    if policy_id.is_empty() || !policy_id.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(AssetAmount::new(policy_id, asset_name, quantity))
}

/// Renders entries in the layout `query utxo` prints.
pub fn render_table(entries: &[UtxoEntry]) -> String {
    let mut out = String::new();
    out.push_str("                           TxHash                                 TxIx        Amount\n");
    out.push_str(&"-".repeat(86));
    out.push('\n');
    for entry in entries {
        out.push_str(&format!(
            "{}     {:<8} {} lovelace",
            entry.tx_hash, entry.output_index, entry.lovelace
        ));
        for asset in &entry.assets {
            out.push_str(&format!(" + {asset}"));
        }
        out.push_str(" + TxOutDatumNone\n");
    }
    out
}
