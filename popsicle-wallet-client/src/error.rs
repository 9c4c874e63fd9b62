use popsicle_error::popsicle_error;

#[popsicle_error(offset = 400)]
#[derive(Debug)]
pub enum WalletError {
    /// The wallet server answered with its `{ code, message }` error body.
    #[error("Wallet API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Wallet API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to parse wallet API response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl WalletError {
    /// The wallet server's own error tag (`no_such_wallet`, `wrong_encryption_passphrase`, ...).
    pub fn api_code(&self) -> Option<&str> {
        match self {
            WalletError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type Result<T> = core::result::Result<T, WalletError>;
