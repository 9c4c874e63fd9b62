//! Checked arithmetic for lovelace and native-asset quantities.
//!
//! Real money moves through these helpers, so every operation either yields the exact
//! result or a [`MathError`]. Nothing wraps, saturates or truncates silently.

use num_traits::{CheckedAdd, CheckedMul, CheckedSub, Zero};
use popsicle_error::popsicle_error;

#[popsicle_error(offset = 200)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("Addition overflow")]
    AdditionOverflow,
    #[error("Subtraction underflow")]
    SubtractionUnderflow,
    #[error("Multiplication overflow")]
    MultiplicationOverflow,
    #[error("Value does not fit in the target integer type")]
    ConversionError,
}

pub type Result<T> = core::result::Result<T, MathError>;

#[inline]
pub fn safe_add<T: CheckedAdd>(a: T, b: T) -> Result<T> {
    a.checked_add(&b).ok_or(MathError::AdditionOverflow)
}

#[inline]
pub fn safe_sub<T: CheckedSub>(a: T, b: T) -> Result<T> {
    a.checked_sub(&b).ok_or(MathError::SubtractionUnderflow)
}

#[inline]
pub fn safe_mul<T: CheckedMul>(a: T, b: T) -> Result<T> {
    a.checked_mul(&b).ok_or(MathError::MultiplicationOverflow)
}

/// Sums an iterator, failing on the first overflow.
pub fn safe_sum<T, I>(values: I) -> Result<T>
where
    T: CheckedAdd + Zero,
    I: IntoIterator<Item = T>,
{
    values
        .into_iter()
        .try_fold(T::zero(), |acc, value| safe_add(acc, value))
}

/// Converts between integer types, e.g. a `u64` quantity into the signed `i64`
/// used by mint directives.
#[inline]
pub fn safe_cast<T, U>(value: T) -> Result<U>
where
    U: TryFrom<T>,
{
    U::try_from(value).map_err(|_| MathError::ConversionError)
}
