use std::fmt;
use std::str::FromStr;

use alloy_primitives::{I256, U256};

use crate::error::{ConversionError, MathError};
use crate::math::log_exp::{exp, ln};
use crate::math::math_helpers::{mul_div_down, mul_div_up};

/// Number of decimals carried by [`FixedPoint`].
pub const DECIMALS: usize = 18;

/// `1e18`, the raw representation of `1.0`.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// An unsigned 18-decimal fixed-point number backed by a `U256`.
///
/// Every arithmetic method is checked: overflow, underflow and division by
/// zero surface as [`MathError`] instead of wrapping. Rounding direction is
/// explicit in the method name (`mul_down`, `div_up`, ...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedPoint(U256);

impl FixedPoint {
    pub const ZERO: Self = Self(U256::ZERO);
    pub const ONE: Self = Self(WAD);

    /// Wraps an already scaled value, so `from_raw(U256::from(5))` is `5e-18`.
    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    /// Const constructor for scaled literals up to `u128::MAX`.
    pub const fn from_scaled(raw: u128) -> Self {
        Self(U256::from_limbs([raw as u64, (raw >> 64) as u64, 0, 0]))
    }

    /// Lifts a whole number into fixed point, so `from_int(3)` is `3.0`.
    pub fn from_int(value: u64) -> Self {
        Self(U256::from(value) * WAD)
    }

    /// Parses a scaled base-10 integer such as `"1500000000000000000"` (1.5).
    ///
    /// This is the encoding used by contract bindings, as opposed to
    /// [`FromStr`], which parses human readable decimals.
    pub fn from_scaled_str(s: &str) -> Result<Self, ConversionError> {
        if s.is_empty() {
            return Err(ConversionError::Empty);
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_digit()) {
            return Err(ConversionError::InvalidCharacter(c));
        }
        parse_digits(s).map(Self)
    }

    pub const fn raw(self) -> U256 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Self) -> Result<Self, MathError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(MathError::Overflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, MathError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(MathError::Underflow)
    }

    pub fn mul_div_down(self, other: Self, divisor: Self) -> Result<Self, MathError> {
        mul_div_down(self.0, other.0, divisor.0).map(Self)
    }

    pub fn mul_div_up(self, other: Self, divisor: Self) -> Result<Self, MathError> {
        mul_div_up(self.0, other.0, divisor.0).map(Self)
    }

    pub fn mul_down(self, other: Self) -> Result<Self, MathError> {
        self.mul_div_down(other, Self::ONE)
    }

    pub fn mul_up(self, other: Self) -> Result<Self, MathError> {
        self.mul_div_up(other, Self::ONE)
    }

    pub fn div_down(self, other: Self) -> Result<Self, MathError> {
        self.mul_div_down(Self::ONE, other)
    }

    pub fn div_up(self, other: Self) -> Result<Self, MathError> {
        self.mul_div_up(Self::ONE, other)
    }

    /// Computes `self ^ exponent` as `exp(exponent * ln(self))`.
    ///
    /// Matches the on-chain `FixedPointMath.pow` to the last unit. Both
    /// operands must be below `2^255` so they can be handled as signed
    /// values; the product `exponent * ln(self)` is checked rather than
    /// wrapped.
    pub fn pow(self, exponent: Self) -> Result<Self, MathError> {
        if exponent.is_zero() {
            return Ok(Self::ONE);
        }
        if self.is_zero() {
            return Ok(Self::ZERO);
        }

        let x = I256::try_from(self.0).map_err(|_| MathError::Overflow)?;
        let y = I256::try_from(exponent.0).map_err(|_| MathError::Overflow)?;
        let wad = I256::from_raw(WAD);

        let y_ln_x = y
            .checked_mul(ln(x)?)
            .ok_or(MathError::Overflow)?
            .checked_div(wad)
            .ok_or(MathError::DivisionByZero)?;

        Ok(Self(exp(y_ln_x)?.into_raw()))
    }
}

fn parse_digits(digits: &str) -> Result<U256, ConversionError> {
    U256::from_str_radix(digits, 10).map_err(|_| ConversionError::Overflow)
}

impl FromStr for FixedPoint {
    type Err = ConversionError;

    /// Parses a decimal literal such as `"12.5"`, `"3"` or `".25"`.
    ///
    /// Only ASCII digits and a single `.` are accepted. Fraction digits past
    /// the 18th are truncated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(c) = s.chars().find(|c| !c.is_ascii_digit() && *c != '.') {
            return Err(ConversionError::InvalidCharacter(c));
        }

        let mut parts = s.split('.');
        let integer = parts.next().unwrap_or_default();
        let fraction = parts.next().unwrap_or_default();
        if parts.next().is_some() {
            return Err(ConversionError::MultipleDecimalPoints);
        }
        if integer.is_empty() && fraction.is_empty() {
            return Err(ConversionError::Empty);
        }

        let integer = if integer.is_empty() {
            U256::ZERO
        } else {
            parse_digits(integer)?
        };

        let fraction = &fraction[..fraction.len().min(DECIMALS)];
        let fraction = if fraction.is_empty() {
            U256::ZERO
        } else {
            let scale = 10u64.pow((DECIMALS - fraction.len()) as u32);
            parse_digits(fraction)? * U256::from(scale)
        };

        integer
            .checked_mul(WAD)
            .and_then(|scaled| scaled.checked_add(fraction))
            .map(Self)
            .ok_or(ConversionError::Overflow)
    }
}

impl fmt::Display for FixedPoint {
    /// Canonical decimal form: trailing zeros trimmed, at least one
    /// fractional digit (`1.0`, `0.25`, `2583.754033693357393077`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (integer, fraction) = self.0.div_rem(WAD);
        // fraction < 1e18 fits in the low limb
        let digits = format!("{:018}", fraction.as_limbs()[0]);
        let trimmed = digits.trim_end_matches('0');
        let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
        write!(f, "{integer}.{trimmed}")
    }
}

impl From<U256> for FixedPoint {
    fn from(raw: U256) -> Self {
        Self(raw)
    }
}

impl From<FixedPoint> for U256 {
    fn from(value: FixedPoint) -> Self {
        value.0
    }
}
