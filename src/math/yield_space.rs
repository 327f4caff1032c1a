//! YieldSpace bonding curve primitives.
//!
//! The curve invariant is `k = (c / µ) * (µ * ze)^(1 - t) + y^(1 - t)`,
//! where `ze` is the effective share reserves, `y` the bond reserves, `c` the
//! vault share price, `µ` the initial share price and `t` the time stretch.
//!
//! Every function rounds in a fixed direction so the pool never gives away
//! more than the contract would. When a result is raised to `1 / (1 - t)`
//! the exponent itself is rounded too, and that direction flips depending on
//! whether the base is above or below one.

use alloy_primitives::I256;

use crate::error::MathError;
use crate::fixed_point::FixedPoint;

/// `ze = z - ζ`. Negative effective reserves are an `Underflow`.
pub fn calculate_effective_share_reserves(z: FixedPoint, zeta: I256) -> Result<FixedPoint, MathError> {
    let z = I256::try_from(z.raw()).map_err(|_| MathError::Overflow)?;
    let ze = z.checked_sub(zeta).ok_or(MathError::Overflow)?;
    if ze.is_negative() {
        return Err(MathError::Underflow);
    }
    Ok(FixedPoint::from_raw(ze.into_raw()))
}

#[inline]
fn one_minus(t: FixedPoint) -> Result<FixedPoint, MathError> {
    FixedPoint::ONE.checked_sub(t)
}

/// `base^(1 / t1)`, with the reciprocal rounded up when `round_up` is set.
#[inline]
fn pow_inverse(base: FixedPoint, t1: FixedPoint, round_up: bool) -> Result<FixedPoint, MathError> {
    let exponent = if round_up {
        FixedPoint::ONE.div_up(t1)?
    } else {
        FixedPoint::ONE.div_down(t1)?
    };
    base.pow(exponent)
}

/// The curve invariant rounded up.
pub fn k_up(
    ze: FixedPoint,
    y: FixedPoint,
    c: FixedPoint,
    mu: FixedPoint,
    t: FixedPoint,
) -> Result<FixedPoint, MathError> {
    let t1 = one_minus(t)?;
    c.mul_div_up(mu.mul_up(ze)?.pow(t1)?, mu)?
        .checked_add(y.pow(t1)?)
}

/// The curve invariant rounded down.
pub fn k_down(
    ze: FixedPoint,
    y: FixedPoint,
    c: FixedPoint,
    mu: FixedPoint,
    t: FixedPoint,
) -> Result<FixedPoint, MathError> {
    let t1 = one_minus(t)?;
    c.mul_div_down(mu.mul_down(ze)?.pow(t1)?, mu)?
        .checked_add(y.pow(t1)?)
}

/// `p = ((µ * ze) / y)^t`
pub fn calculate_spot_price(
    ze: FixedPoint,
    y: FixedPoint,
    mu: FixedPoint,
    t: FixedPoint,
) -> Result<FixedPoint, MathError> {
    mu.mul_down(ze)?.div_down(y)?.pow(t)
}

/// Bonds a trader receives for `dz` shares, rounded down.
pub fn calculate_bonds_out_given_shares_in_down(
    ze: FixedPoint,
    y: FixedPoint,
    dz: FixedPoint,
    c: FixedPoint,
    mu: FixedPoint,
    t: FixedPoint,
) -> Result<FixedPoint, MathError> {
    let t1 = one_minus(t)?;
    let k = k_up(ze, y, c, mu, t)?;
    let ze_new = c.mul_div_down(mu.mul_down(ze.checked_add(dz)?)?.pow(t1)?, mu)?;
    let y_new = k.checked_sub(ze_new)?;
    let y_new = pow_inverse(y_new, t1, y_new >= FixedPoint::ONE)?;
    y.checked_sub(y_new)
}

/// Shares a trader must pay for `dy` bonds, rounded up.
pub fn calculate_shares_in_given_bonds_out_up(
    ze: FixedPoint,
    y: FixedPoint,
    dy: FixedPoint,
    c: FixedPoint,
    mu: FixedPoint,
    t: FixedPoint,
) -> Result<FixedPoint, MathError> {
    let t1 = one_minus(t)?;
    let k = k_up(ze, y, c, mu, t)?;
    let y_new = y.checked_sub(dy)?.pow(t1)?;
    let z_new = k.checked_sub(y_new)?.mul_div_up(mu, c)?;
    let z_new = pow_inverse(z_new, t1, z_new >= FixedPoint::ONE)?;
    z_new.div_up(mu)?.checked_sub(ze)
}

/// Shares a trader must pay for `dy` bonds, rounded down.
pub fn calculate_shares_in_given_bonds_out_down(
    ze: FixedPoint,
    y: FixedPoint,
    dy: FixedPoint,
    c: FixedPoint,
    mu: FixedPoint,
    t: FixedPoint,
) -> Result<FixedPoint, MathError> {
    let t1 = one_minus(t)?;
    let k = k_down(ze, y, c, mu, t)?;
    let y_new = y.checked_sub(dy)?.pow(t1)?;
    let z_new = k.checked_sub(y_new)?.mul_div_down(mu, c)?;
    let z_new = pow_inverse(z_new, t1, z_new < FixedPoint::ONE)?;
    z_new.div_down(mu)?.checked_sub(ze)
}

/// Shares a trader receives for `dy` bonds, rounded down.
///
/// Rounding can push the new share reserves above the current ones for very
/// small trades; the output is clamped to zero in that case.
pub fn calculate_shares_out_given_bonds_in_down(
    ze: FixedPoint,
    y: FixedPoint,
    dy: FixedPoint,
    c: FixedPoint,
    mu: FixedPoint,
    t: FixedPoint,
) -> Result<FixedPoint, MathError> {
    let t1 = one_minus(t)?;
    let k = k_up(ze, y, c, mu, t)?;
    let y_new = y.checked_add(dy)?.pow(t1)?;
    let z_new = k.checked_sub(y_new)?.mul_div_up(mu, c)?;
    let z_new = pow_inverse(z_new, t1, z_new >= FixedPoint::ONE)?.div_up(mu)?;
    if ze > z_new {
        ze.checked_sub(z_new)
    } else {
        Ok(FixedPoint::ZERO)
    }
}

/// Largest share amount that can be traded in before the spot price reaches
/// one (zero interest).
pub fn calculate_max_buy_shares_in(
    ze: FixedPoint,
    y: FixedPoint,
    c: FixedPoint,
    mu: FixedPoint,
    t: FixedPoint,
) -> Result<FixedPoint, MathError> {
    let t1 = one_minus(t)?;
    let k = k_down(ze, y, c, mu, t)?;
    let optimal = k.div_down(c.div_up(mu)?.checked_add(FixedPoint::ONE)?)?;
    pow_inverse(optimal, t1, false)?
        .div_down(mu)?
        .checked_sub(ze)
}

/// Largest bond amount that can be bought before the spot price reaches one.
pub fn calculate_max_buy_bonds_out(
    ze: FixedPoint,
    y: FixedPoint,
    c: FixedPoint,
    mu: FixedPoint,
    t: FixedPoint,
) -> Result<FixedPoint, MathError> {
    let t1 = one_minus(t)?;
    let k = k_up(ze, y, c, mu, t)?;
    let optimal = k.div_up(c.div_down(mu)?.checked_add(FixedPoint::ONE)?)?;
    let optimal = pow_inverse(optimal, t1, optimal >= FixedPoint::ONE)?;
    y.checked_sub(optimal)
}

/// Largest bond amount that can be sold before the share reserves fall to
/// `z_min`. A negative share adjustment raises that floor by `|ζ|`.
pub fn calculate_max_sell_bonds_in(
    ze: FixedPoint,
    y: FixedPoint,
    c: FixedPoint,
    mu: FixedPoint,
    t: FixedPoint,
    zeta: I256,
    z_min: FixedPoint,
) -> Result<FixedPoint, MathError> {
    let mut z_min = z_min;
    if zeta.is_negative() {
        z_min = z_min.checked_add(FixedPoint::from_raw(zeta.unsigned_abs()))?;
    }

    let t1 = one_minus(t)?;
    let k = k_down(ze, y, c, mu, t)?;
    let optimal = k.checked_sub(c.mul_div_up(mu.mul_up(z_min)?.pow(t1)?, mu)?)?;
    let optimal = pow_inverse(optimal, t1, optimal < FixedPoint::ONE)?;
    optimal.checked_sub(y)
}

/// Curve view over a pool snapshot.
///
/// Implementors supply the raw reserves and parameters; the provided methods
/// evaluate the curve primitives at the current effective share reserves.
pub trait YieldSpace {
    /// Share reserves.
    fn z(&self) -> FixedPoint;
    /// Share adjustment.
    fn zeta(&self) -> I256;
    /// Bond reserves.
    fn y(&self) -> FixedPoint;
    /// Vault share price.
    fn c(&self) -> FixedPoint;
    /// Initial vault share price.
    fn mu(&self) -> FixedPoint;
    /// Time stretch.
    fn t(&self) -> FixedPoint;

    fn ze(&self) -> Result<FixedPoint, MathError> {
        calculate_effective_share_reserves(self.z(), self.zeta())
    }

    fn k_up(&self) -> Result<FixedPoint, MathError> {
        k_up(self.ze()?, self.y(), self.c(), self.mu(), self.t())
    }

    fn k_down(&self) -> Result<FixedPoint, MathError> {
        k_down(self.ze()?, self.y(), self.c(), self.mu(), self.t())
    }

    fn calculate_spot_price(&self) -> Result<FixedPoint, MathError> {
        calculate_spot_price(self.ze()?, self.y(), self.mu(), self.t())
    }

    fn calculate_bonds_out_given_shares_in_down(&self, dz: FixedPoint) -> Result<FixedPoint, MathError> {
        calculate_bonds_out_given_shares_in_down(self.ze()?, self.y(), dz, self.c(), self.mu(), self.t())
    }

    fn calculate_shares_in_given_bonds_out_up(&self, dy: FixedPoint) -> Result<FixedPoint, MathError> {
        calculate_shares_in_given_bonds_out_up(self.ze()?, self.y(), dy, self.c(), self.mu(), self.t())
    }

    fn calculate_shares_in_given_bonds_out_down(&self, dy: FixedPoint) -> Result<FixedPoint, MathError> {
        calculate_shares_in_given_bonds_out_down(self.ze()?, self.y(), dy, self.c(), self.mu(), self.t())
    }

    fn calculate_shares_out_given_bonds_in_down(&self, dy: FixedPoint) -> Result<FixedPoint, MathError> {
        calculate_shares_out_given_bonds_in_down(self.ze()?, self.y(), dy, self.c(), self.mu(), self.t())
    }

    fn calculate_max_buy_shares_in(&self) -> Result<FixedPoint, MathError> {
        calculate_max_buy_shares_in(self.ze()?, self.y(), self.c(), self.mu(), self.t())
    }

    fn calculate_max_buy_bonds_out(&self) -> Result<FixedPoint, MathError> {
        calculate_max_buy_bonds_out(self.ze()?, self.y(), self.c(), self.mu(), self.t())
    }

    fn calculate_max_sell_bonds_in(&self, z_min: FixedPoint) -> Result<FixedPoint, MathError> {
        calculate_max_sell_bonds_in(
            self.ze()?,
            self.y(),
            self.c(),
            self.mu(),
            self.t(),
            self.zeta(),
            z_min,
        )
    }
}
