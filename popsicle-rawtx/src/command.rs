//! Typed construction of `cardano-cli` argument vectors.
//!
//! Every value is validated before it is appended and the program is spawned
//! without a shell, so nothing a client sends can change what is executed.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use popsicle_transactions::{AssetAmount, MintDirective, TxIn, TxOut};

use crate::{
    config::Network,
    error::{RawTxError, Result},
};

const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const MAX_ASSET_NAME_LEN: usize = 64;

/// A fully-validated program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    /// True when the first arguments are exactly `verb`, e.g. `["query", "utxo"]`.
    pub fn is(&self, verb: &[&str]) -> bool {
        self.args.len() >= verb.len() && self.args.iter().zip(verb).all(|(a, v)| a == v)
    }

    /// Value following `flag`, if present.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn values_of<'a>(&'a self, flag: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.args
            .windows(2)
            .filter(move |w| w[0] == flag)
            .map(|w| w[1].as_str())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CliCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl CliCommand {
    pub fn new(program: impl Into<PathBuf>, verb: &[&'static str]) -> Self {
        Self {
            program: program.into(),
            args: verb.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn flag(mut self, flag: &'static str) -> Self {
        self.args.push(flag.to_string());
        self
    }

    pub fn network(mut self, network: &Network) -> Self {
        self.args.extend(network.cli_args());
        self
    }

    pub fn number(mut self, flag: &'static str, value: impl Into<i128>) -> Self {
        self.args.push(flag.to_string());
        self.args.push(value.into().to_string());
        self
    }

    pub fn address(mut self, flag: &'static str, address: &str) -> Result<Self> {
        validate_address(flag, address)?;
        self.args.push(flag.to_string());
        self.args.push(address.to_string());
        Ok(self)
    }

    pub fn path(mut self, flag: &'static str, path: &Path) -> Result<Self> {
        let value = validate_path(flag, path)?;
        self.args.push(flag.to_string());
        self.args.push(value.to_string());
        Ok(self)
    }

    pub fn tx_in(mut self, tx_in: &TxIn) -> Result<Self> {
        validate_hex("--tx-in", &tx_in.tx_hash, Some(64))?;
        self.args.push("--tx-in".to_string());
        self.args.push(tx_in.to_string());
        Ok(self)
    }

    /// `ADDRESS+LOVELACE[+QTY POLICY.NAME + ...]`
    pub fn tx_out(mut self, out: &TxOut) -> Result<Self> {
        validate_address("--tx-out", &out.address)?;
        let mut value = format!("{}+{}", out.address, out.lovelace);
        if !out.assets.is_empty() {
            let assets = out
                .assets
                .iter()
                .map(|a| render_asset("--tx-out", a.quantity as i128, a))
                .collect::<Result<Vec<_>>>()?;
            value.push('+');
            value.push_str(&assets.join(" + "));
        }
        self.args.push("--tx-out".to_string());
        self.args.push(value);
        Ok(self)
    }

    /// Emitted as a single `--mint=...` argument so a negative quantity is not
    /// mistaken for a flag.
    pub fn mint(mut self, mint: &MintDirective) -> Result<Self> {
        let asset = AssetAmount::new(&mint.policy_id, &mint.asset_name, 0);
        let value = render_asset("--mint", mint.quantity as i128, &asset)?;
        self.args.push(format!("--mint={value}"));
        Ok(self)
    }

    pub fn build(self) -> Invocation {
        Invocation {
            program: self.program,
            args: self.args,
        }
    }
}

fn invalid(flag: &str, reason: impl Into<String>) -> RawTxError {
    RawTxError::InvalidArgument {
        flag: flag.to_string(),
        reason: reason.into(),
    }
}

fn render_asset(flag: &str, quantity: i128, asset: &AssetAmount) -> Result<String> {
    validate_hex(flag, &asset.policy_id, Some(56))?;
    if !asset.asset_name.is_empty() {
        validate_asset_name(flag, &asset.asset_name)?;
    }
    Ok(format!("{quantity} {}", asset.unit()))
}

/// Shelley bech32 payment address (`addr1...` / `addr_test1...`).
pub fn validate_address(flag: &str, address: &str) -> Result<()> {
    let Some((hrp, data)) = address.rsplit_once('1') else {
        return Err(invalid(flag, "address has no bech32 separator"));
    };
    if hrp != "addr" && hrp != "addr_test" {
        return Err(invalid(flag, format!("unsupported address prefix `{hrp}`")));
    }
    if data.len() < 6 || !data.chars().all(|c| BECH32_CHARSET.contains(c)) {
        return Err(invalid(flag, "address payload is not bech32"));
    }
    Ok(())
}

pub fn validate_hex(flag: &str, value: &str, len: Option<usize>) -> Result<()> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid(flag, format!("`{value}` is not hex")));
    }
    match len {
        Some(len) if value.len() != len => Err(invalid(flag, format!("expected {len} hex characters"))),
        _ => Ok(()),
    }
}

/// 1-64 printable characters, none of which can be confused with CLI syntax or a
/// path component.
pub fn validate_asset_name(flag: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_ASSET_NAME_LEN {
        return Err(invalid(flag, "asset name must be 1-64 characters"));
    }
    if name.chars().all(|c| c == '.') {
        return Err(invalid(flag, "asset name cannot be only dots"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !c.is_ascii_graphic() || matches!(c, '+' | '.' | '/' | '\\' | '"'))
    {
        return Err(invalid(flag, format!("asset name contains `{c}`")));
    }
    Ok(())
}

fn validate_path<'a>(flag: &str, path: &'a Path) -> Result<&'a str> {
    let value = path
        .to_str()
        .ok_or_else(|| invalid(flag, "path is not UTF-8"))?;
    if value.is_empty() || value.contains(['\0', '\n', '\r']) {
        return Err(invalid(flag, "path is empty or contains control characters"));
    }
    Ok(value)
}
