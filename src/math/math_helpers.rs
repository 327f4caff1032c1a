use crate::error::MathError;
use alloy_primitives::U256;

/// Computes `x * y / denominator`, rounding down.
///
/// This mirrors Solidity `FixedPointMath.mulDivDown`: the intermediate
/// product must fit in 256 bits, otherwise `MathError::Overflow` is
/// returned. A zero denominator yields `MathError::DivisionByZero`.
#[inline(always)]
pub fn mul_div_down(x: U256, y: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let product = x.checked_mul(y).ok_or(MathError::Overflow)?;
    Ok(product / denominator)
}

/// Like [`mul_div_down`], but rounds the quotient up when the division
/// leaves a non‑zero remainder.
#[inline(always)]
pub fn mul_div_up(x: U256, y: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let product = x.checked_mul(y).ok_or(MathError::Overflow)?;
    let (quotient, remainder) = product.div_rem(denominator);
    if remainder.is_zero() {
        Ok(quotient)
    } else {
        // quotient < U256::MAX whenever the remainder is non-zero
        Ok(quotient + U256::ONE)
    }
}
