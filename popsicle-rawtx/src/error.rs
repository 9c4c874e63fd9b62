use popsicle_error::popsicle_error;
use popsicle_safe_math::MathError;
use popsicle_transactions::TxBuildError;
use popsicle_utxo_parser::UtxoParseError;

#[popsicle_error(offset = 600)]
#[derive(Debug)]
pub enum RawTxError {
    #[error("`{command}` exited with {exit_code}: {stderr}")]
    ProcessFailure {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Unexpected CLI output: {0}")]
    ParseFailure(String),

    #[error("Output is below the ledger's minimum UTxO value: {stderr}")]
    MinimumUtxoViolation { required: Option<u64>, stderr: String },

    #[error("{tx_in} still unspent after {attempts} polls")]
    ConfirmationTimeout { tx_in: String, attempts: usize },

    #[error("Node did not answer after {attempts} attempts")]
    NodeUnreachable { attempts: usize },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid argument for {flag}: {reason}")]
    InvalidArgument { flag: String, reason: String },

    #[error("No minting policy at {0}")]
    PolicyNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[code(delegate)]
    Build(#[from] TxBuildError),

    #[code(delegate)]
    Utxo(#[from] UtxoParseError),

    #[code(delegate)]
    Math(#[from] MathError),
}

pub type Result<T> = core::result::Result<T, RawTxError>;
