use popsicle_error::popsicle_error;
use popsicle_safe_math::MathError;

#[popsicle_error(offset = 800)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxBuildError {
    #[error("Insufficient funds: {required} lovelace required, {available} available")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Insufficient balance of {asset}: requested {requested}, held {held}")]
    InsufficientAssetBalance {
        asset: String,
        requested: u64,
        held: u64,
    },

    #[error("Cannot mint an NFT from a UTxO that carries native assets")]
    UnbalancedAssets,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("No spendable UTxO at address {0}")]
    NoSpendableInput(String),

    #[code(delegate)]
    Math(#[from] MathError),
}

pub type Result<T> = core::result::Result<T, TxBuildError>;
