//! Popsicle core error handling.
//!
//! This crate provides three things:
//! 1. The [`ErrorCode`] trait and the [`ErrorPayload`] wire shape (`{ message, code }`)
//!    that every failure is reduced to before it reaches a WebSocket client.
//! 2. A small built-in [`PopsicleErrorCode`] enum (range 0–99) for framework-level
//!    failures.
//! 3. Utility macros (`require!`, `error!`) and the `#[popsicle_error(offset = ...)]`
//!    attribute so each crate can declare its own coded error enum.
//!
//! Code ranges in use: framework `0..=99`, utxo parser `100`, safe math `200`,
//! wallet client `400`, raw transactions `600`, transaction building `800`.

use serde::{Deserialize, Serialize};

/// Anything that can report a stable numeric error code.
pub trait ErrorCode {
    fn code(&self) -> u32;
}

/// The `{ message, code }` object the UI expects under `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    pub code: u32,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>, code: u32) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}

impl std::fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Errors produced by the framework itself.
///
/// These are assigned the numeric range `0..=99`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
#[repr(u32)]
pub enum PopsicleErrorCode {
    /// The request could not be decoded.
    #[error("Malformed request")]
    MalformedRequest = 0,
    /// The request named an event nobody handles.
    #[error("Unknown event")]
    UnknownEvent = 1,
    /// Integer overflow / underflow.
    #[error("Math overflow or underflow")]
    MathOverflow = 2,
    /// Generic error placeholder. Prefer adding concrete variants.
    #[error("Generic popsicle error")]
    GenericError = 99,
}

impl ErrorCode for PopsicleErrorCode {
    #[inline]
    fn code(&self) -> u32 {
        *self as u32
    }
}

impl From<PopsicleErrorCode> for ErrorPayload {
    #[inline]
    fn from(e: PopsicleErrorCode) -> Self {
        ErrorPayload::new(e.to_string(), e as u32)
    }
}

/// Evaluates the provided expression and returns the supplied error
/// (converted with `Into`) if the condition is `false`.
#[macro_export]
macro_rules! require {
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return core::result::Result::Err($err.into());
        }
    };
}

/// Require that `$left` is greater than **or equal** to `$right` (`>=`).
#[macro_export]
macro_rules! require_gte {
    ($left:expr, $right:expr, $err:expr $(,)?) => {
        $crate::require!($left >= $right, $err);
    };
}

/// Require that `$left` is strictly greater than `$right` (`>`).
#[macro_export]
macro_rules! require_gt {
    ($left:expr, $right:expr, $err:expr $(,)?) => {
        $crate::require!($left > $right, $err);
    };
}

// -------------------------------------------------------------------------
// Re-exports
// -------------------------------------------------------------------------

pub use popsicle_error_derive::popsicle_error;

/// Internal re-exports that the procedural macro relies on.
///
/// Users should **not** depend on anything inside this module; its layout is
/// private and may change without notice.
#[doc(hidden)]
pub mod __private {
    pub use thiserror;
    pub use tracing;
}

/// Logs the given error with file, line and code, then evaluates to the error
/// itself so the call-site decides whether to wrap it in `Err(..)`.
///
/// ```ignore
/// return Err(error!(RawTxError::UnbalancedAssets));
/// ```
#[macro_export]
macro_rules! error {
    ($err:expr $(,)?) => {{
        let err = $err;
        $crate::__private::tracing::error!(
            code = $crate::ErrorCode::code(&err),
            concat!("error thrown in ", file!(), ":", line!(), ": {}"),
            err
        );
        err
    }};
}
