use alloy_primitives::I256;
use tracing::{debug, trace};

use crate::error::{Error, MathError, SolvencyError};
use crate::fixed_point::FixedPoint;
use crate::math::yield_space::{calculate_effective_share_reserves, calculate_spot_price, YieldSpace};
use crate::pool::state::State;

/// Default distance from the target rate a targeted long may land at.
pub const TARGETED_LONG_TOLERANCE: FixedPoint = FixedPoint::from_scaled(100_000_000_000_000);

impl State {
    /// Spot price after a long that pays `base_amount` for `bond_amount`.
    pub(crate) fn spot_price_after_long_given_bonds(
        &self,
        base_amount: FixedPoint,
        bond_amount: FixedPoint,
    ) -> Result<FixedPoint, MathError> {
        let share_reserves = self.z().checked_add(base_amount.div_down(self.c())?)?;
        calculate_spot_price(
            calculate_effective_share_reserves(share_reserves, self.zeta())?,
            self.y().checked_sub(bond_amount)?,
            self.mu(),
            self.t(),
        )
    }

    /// Spot rate after opening a long with `base_amount`. The bond amount is
    /// priced with [`State::calculate_open_long`] when not given.
    pub fn calculate_spot_rate_after_long(
        &self,
        base_amount: FixedPoint,
        bond_amount: Option<FixedPoint>,
    ) -> Result<FixedPoint, Error> {
        let bond_amount = match bond_amount {
            Some(bond_amount) => bond_amount,
            None => self.calculate_open_long(base_amount)?,
        };
        let spot_price = self.spot_price_after_long_given_bonds(base_amount, bond_amount)?;
        Ok(self.calculate_rate_given_price(spot_price)?)
    }

    /// Base paid and bonds received by a long that moves the effective
    /// reserves to `(share_reserves, bond_reserves)`.
    fn long_trade_deltas_from_reserves(
        &self,
        share_reserves: FixedPoint,
        bond_reserves: FixedPoint,
    ) -> Result<(FixedPoint, FixedPoint), MathError> {
        let base_amount = share_reserves.checked_sub(self.ze()?)?.mul_down(self.c())?;
        let bond_amount = self
            .y()
            .checked_sub(bond_reserves)?
            .checked_sub(self.open_long_curve_fee(base_amount)?)?;
        Ok((base_amount, bond_amount))
    }

    /// Derivative of the spot price after a long with respect to base paid.
    ///
    /// With `p = r^t` and `r = µ (z_e + x / c) / (y - y(x))` this is
    /// `t r' r^(t - 1)`.
    fn price_after_long_derivative(
        &self,
        base_amount: FixedPoint,
        bond_amount: FixedPoint,
    ) -> Result<FixedPoint, Error> {
        let t = self.t();
        let inner_numerator = self
            .mu()
            .mul_down(self.ze()?.checked_add(base_amount.div_down(self.c())?)?)?;
        let inner_numerator_derivative = self.mu().div_down(self.c())?;
        let inner_denominator = self.y().checked_sub(bond_amount)?;
        let long_amount_derivative = self
            .long_amount_derivative(base_amount)?
            .ok_or(SolvencyError::InsolventGuess)?;

        let inner_derivative = inner_denominator
            .mul_down(inner_numerator_derivative)?
            .checked_add(inner_numerator.mul_down(long_amount_derivative)?)?
            .div_down(inner_denominator.mul_down(inner_denominator)?)?;
        Ok(inner_derivative.mul_down(t)?.mul_down(
            inner_denominator
                .div_down(inner_numerator)?
                .pow(FixedPoint::ONE.checked_sub(t)?)?,
        )?)
    }

    /// Rate after a long, differentiated with respect to base and negated.
    /// The rate falls as the long grows, so this is positive.
    fn rate_after_long_derivative_negation(
        &self,
        base_amount: FixedPoint,
        bond_amount: FixedPoint,
    ) -> Result<FixedPoint, Error> {
        let price = self.spot_price_after_long_given_bonds(base_amount, bond_amount)?;
        let price_derivative = self.price_after_long_derivative(base_amount, bond_amount)?;
        let denominator = self
            .annualized_position_duration()?
            .mul_down(price)?
            .mul_down(price)?;
        Ok(price_derivative.div_down(denominator)?)
    }

    /// Base a long must pay to bring the spot rate down to `target_rate`.
    ///
    /// Starts from the trade implied by
    /// [`State::reserves_given_rate_ignoring_exposure`] and runs Newton's
    /// method on the rate after the long. The result lands at or above the
    /// target, within `allowable_error` (default
    /// [`TARGETED_LONG_TOLERANCE`]), and leaves the pool solvent.
    pub fn calculate_targeted_long(
        &self,
        target_rate: FixedPoint,
        checkpoint_exposure: I256,
        max_iterations: usize,
        allowable_error: Option<FixedPoint>,
    ) -> Result<FixedPoint, Error> {
        let allowable_error = allowable_error.unwrap_or(TARGETED_LONG_TOLERANCE);
        if target_rate > self.calculate_spot_rate()? {
            return Err(SolvencyError::TargetRateAboveSpotRate.into());
        }

        let (share_reserves, bond_reserves) = self.reserves_given_rate_ignoring_exposure(target_rate)?;
        let (mut base_amount, bond_amount) = self.long_trade_deltas_from_reserves(share_reserves, bond_reserves)?;
        let resulting_rate = self.calculate_spot_rate_after_long(base_amount, Some(bond_amount))?;
        let solvent = self
            .solvency_after_long(base_amount, bond_amount, checkpoint_exposure)?
            .is_some();

        if target_rate > resulting_rate {
            if solvent && target_rate.checked_sub(resulting_rate)? < allowable_error {
                return Ok(base_amount);
            }
            // Fees pushed the rate past the target. Restart well below it.
            base_amount = base_amount.div_down(FixedPoint::from_int(10))?;
        } else if solvent && resulting_rate.checked_sub(target_rate)? < allowable_error {
            return Ok(base_amount);
        }
        debug!(guess = %base_amount, %target_rate, "starting targeted long search");

        for iteration in 0..max_iterations {
            let bond_amount = self.calculate_open_long(base_amount)?;
            let resulting_rate = self.calculate_spot_rate_after_long(base_amount, Some(bond_amount))?;
            if target_rate > resulting_rate {
                return Err(SolvencyError::TargetRateOvershot.into());
            }

            let loss = resulting_rate.checked_sub(target_rate)?;
            if loss < allowable_error
                && self
                    .solvency_after_long(base_amount, bond_amount, checkpoint_exposure)?
                    .is_some()
            {
                debug!(iteration, base_amount = %base_amount, "targeted long converged");
                return Ok(base_amount);
            }

            let derivative = self.rate_after_long_derivative_negation(base_amount, bond_amount)?;
            base_amount = base_amount.checked_add(loss.div_down(derivative)?)?;
            trace!(iteration, %base_amount, %loss, "targeted long step");
        }

        let bond_amount = self.calculate_open_long(base_amount)?;
        if self
            .solvency_after_long(base_amount, bond_amount, checkpoint_exposure)?
            .is_none()
        {
            return Err(SolvencyError::InsolventGuess.into());
        }
        let resulting_rate = self.calculate_spot_rate_after_long(base_amount, Some(bond_amount))?;
        if target_rate > resulting_rate {
            return Err(SolvencyError::TargetRateOvershot.into());
        }
        if resulting_rate.checked_sub(target_rate)? >= allowable_error {
            return Err(SolvencyError::TargetRateNotReached.into());
        }
        Ok(base_amount)
    }

    /// [`State::calculate_targeted_long`] capped at `budget`.
    pub fn calculate_targeted_long_with_budget(
        &self,
        budget: FixedPoint,
        target_rate: FixedPoint,
        checkpoint_exposure: I256,
        max_iterations: usize,
        allowable_error: Option<FixedPoint>,
    ) -> Result<FixedPoint, Error> {
        let base_amount =
            self.calculate_targeted_long(target_rate, checkpoint_exposure, max_iterations, allowable_error)?;
        Ok(base_amount.min(budget))
    }
}
