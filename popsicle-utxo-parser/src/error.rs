use popsicle_error::popsicle_error;
use popsicle_safe_math::MathError;

#[popsicle_error(offset = 100)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtxoParseError {
    #[error("Line {line}: expected a 64 character hex transaction hash, got `{found}`")]
    InvalidTxHash { line: usize, found: String },

    #[error("Line {line}: invalid output index `{found}`")]
    InvalidOutputIndex { line: usize, found: String },

    #[error("Line {line}: amount column does not start with `<n> lovelace`")]
    MissingLovelace { line: usize },

    #[error("Line {line}: missing amount column")]
    MissingAmount { line: usize },

    #[code(delegate)]
    Math(#[from] MathError),
}
