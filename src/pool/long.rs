use alloy_primitives::I256;
use tracing::{debug, trace};

use crate::error::{Error, MathError, SolvencyError};
use crate::fixed_point::FixedPoint;
use crate::math::yield_space::{calculate_effective_share_reserves, calculate_spot_price, YieldSpace};
use crate::pool::state::State;

impl State {
    // ---- fees ----

    /// Curve fee charged on a long: `φ_c * (1 / p - 1) * base`.
    pub fn open_long_curve_fee(&self, base_amount: FixedPoint) -> Result<FixedPoint, MathError> {
        let spot_price = self.calculate_spot_price()?;
        self.curve_fee()
            .mul_down(FixedPoint::ONE.div_down(spot_price)?.checked_sub(FixedPoint::ONE)?)?
            .mul_down(base_amount)
    }

    /// Share of the long curve fee paid to governance: `φ_g * p * curve_fee`.
    pub fn open_long_governance_fee(&self, base_amount: FixedPoint) -> Result<FixedPoint, MathError> {
        let spot_price = self.calculate_spot_price()?;
        self.governance_fee()
            .mul_down(spot_price)?
            .mul_down(self.open_long_curve_fee(base_amount)?)
    }

    // ---- pricing ----

    /// Bonds received for `base_amount` of base, net of the curve fee.
    ///
    /// Fails with [`SolvencyError::NegativeInterest`] when the trade would
    /// push the spot price above [`State::calculate_max_spot_price`].
    pub fn calculate_open_long(&self, base_amount: FixedPoint) -> Result<FixedPoint, Error> {
        let share_amount = base_amount.div_down(self.c())?;
        let long_amount = self.calculate_bonds_out_given_shares_in_down(share_amount)?;

        let ending_spot_price = calculate_spot_price(
            calculate_effective_share_reserves(self.z().checked_add(share_amount)?, self.zeta())?,
            self.y().checked_sub(long_amount)?,
            self.mu(),
            self.t(),
        )?;
        if ending_spot_price > self.calculate_max_spot_price()? {
            return Err(SolvencyError::NegativeInterest.into());
        }

        Ok(long_amount.checked_sub(self.open_long_curve_fee(base_amount)?)?)
    }

    /// Spot price after opening a long with `base_amount`.
    pub fn calculate_spot_price_after_long(&self, base_amount: FixedPoint) -> Result<FixedPoint, Error> {
        let bond_amount = self.calculate_open_long(base_amount)?;
        Ok(self.spot_price_after_long_given_bonds(base_amount, bond_amount)?)
    }

    // ---- max long ----

    /// Largest long the pool can absorb before the spot price reaches the
    /// max spot price. Returns `(base_amount, bond_amount)`.
    pub fn calculate_absolute_max_long(&self) -> Result<(FixedPoint, FixedPoint), MathError> {
        let spot_price = self.calculate_spot_price()?;
        let t = self.t();
        let one_minus_t = FixedPoint::ONE.checked_sub(t)?;
        let one_minus_flat = FixedPoint::ONE.checked_sub(self.flat_fee())?;

        let fee_up = FixedPoint::ONE
            .checked_add(
                self.curve_fee()
                    .mul_up(FixedPoint::ONE.div_up(spot_price)?.checked_sub(FixedPoint::ONE)?)?
                    .mul_up(one_minus_flat)?,
            )?
            .div_up(one_minus_flat)?;
        let inner = self
            .k_down()?
            .div_down(
                self.c()
                    .div_up(self.mu())?
                    .checked_add(fee_up.pow(one_minus_t.div_down(t)?)?)?,
            )?
            .pow(FixedPoint::ONE.div_down(one_minus_t)?)?;
        let target_share_reserves = inner.div_down(self.mu())?;

        let fee_down = FixedPoint::ONE
            .checked_add(
                self.curve_fee()
                    .mul_down(FixedPoint::ONE.div_down(spot_price)?.checked_sub(FixedPoint::ONE)?)?
                    .mul_down(one_minus_flat)?,
            )?
            .div_down(one_minus_flat)?;
        let target_bond_reserves = inner.mul_down(fee_down.pow(FixedPoint::ONE.div_up(t)?)?)?;

        let base_amount = target_share_reserves
            .checked_sub(self.ze()?)?
            .mul_down(self.c())?;
        let bond_amount = self
            .y()
            .checked_sub(target_bond_reserves)?
            .checked_sub(self.open_long_curve_fee(base_amount)?)?;
        Ok((base_amount, bond_amount))
    }

    /// Pool solvency after a long of `base_amount` for `bond_amount` bonds,
    /// or `None` when the pool would be insolvent.
    pub fn solvency_after_long(
        &self,
        base_amount: FixedPoint,
        bond_amount: FixedPoint,
        checkpoint_exposure: I256,
    ) -> Result<Option<FixedPoint>, MathError> {
        let c = self.c();
        let governance_fee = self.open_long_governance_fee(base_amount)?;
        let share_reserves = self
            .z()
            .checked_add(base_amount.div_down(c)?)?
            .checked_sub(governance_fee.div_down(c)?)?;
        let exposure = self.long_exposure().checked_add(bond_amount)?;

        let lhs = share_reserves.checked_add(Self::negative_part(checkpoint_exposure).div_down(c)?)?;
        let rhs = exposure
            .div_down(c)?
            .checked_add(self.minimum_share_reserves())?;
        Ok(lhs.checked_sub(rhs).ok())
    }

    /// Derivative of the bonds received with respect to base paid, net of
    /// the curve fee. `None` when undefined at `base_amount`.
    pub fn long_amount_derivative(&self, base_amount: FixedPoint) -> Result<Option<FixedPoint>, MathError> {
        let t = self.t();
        let one_minus_t = FixedPoint::ONE.checked_sub(t)?;
        let share_amount = base_amount.div_down(self.c())?;
        let inner = self.mu().mul_down(self.ze()?.checked_add(share_amount)?)?;
        let mut derivative = FixedPoint::ONE.div_down(inner.pow(t)?)?;

        let k = self.k_down()?;
        let rhs = self.c().mul_div_down(inner.pow(one_minus_t)?, self.mu())?;
        if k < rhs {
            return Ok(None);
        }
        derivative = derivative.mul_down(k.checked_sub(rhs)?.pow(t.div_up(one_minus_t)?)?)?;

        let spot_price = self.calculate_spot_price()?;
        let fee = self
            .curve_fee()
            .mul_down(FixedPoint::ONE.div_down(spot_price)?.checked_sub(FixedPoint::ONE)?)?;
        Ok(derivative.checked_sub(fee).ok())
    }

    /// Derivative of [`State::solvency_after_long`] with respect to base,
    /// negated so Newton steps move toward the solvency boundary.
    pub fn solvency_after_long_derivative(&self, base_amount: FixedPoint) -> Result<Option<FixedPoint>, MathError> {
        let Some(derivative) = self.long_amount_derivative(base_amount)? else {
            return Ok(None);
        };
        let spot_price = self.calculate_spot_price()?;
        let value = derivative.checked_add(
            self.governance_fee()
                .mul_down(self.curve_fee())?
                .mul_down(FixedPoint::ONE.checked_sub(spot_price)?)?,
        )?;
        if value < FixedPoint::ONE {
            return Ok(None);
        }
        Ok(Some(value.checked_sub(FixedPoint::ONE)?.mul_div_down(FixedPoint::ONE, self.c())?))
    }

    /// Linear estimate of the max long at an assumed realized price.
    fn max_long_estimate(
        &self,
        estimate_price: FixedPoint,
        spot_price: FixedPoint,
        checkpoint_exposure: I256,
    ) -> Result<FixedPoint, MathError> {
        let c = self.c();
        let estimate = self
            .calculate_solvency()?
            .checked_add(Self::negative_part(checkpoint_exposure).div_down(c)?)?
            .mul_div_down(c, FixedPoint::from_int(2))?;

        let denominator = FixedPoint::ONE
            .div_down(estimate_price)?
            .checked_add(
                self.governance_fee()
                    .mul_down(self.curve_fee())?
                    .mul_down(FixedPoint::ONE.checked_sub(spot_price)?)?,
            )?
            .checked_sub(FixedPoint::ONE)?
            .checked_sub(
                self.curve_fee()
                    .mul_down(FixedPoint::ONE.div_down(spot_price)?.checked_sub(FixedPoint::ONE)?)?,
            )?;
        estimate.div_down(denominator)
    }

    /// Starting point for the max long search: the linear estimate refined
    /// once with a realized price interpolated toward one.
    fn max_long_guess(
        &self,
        absolute_max_base_amount: FixedPoint,
        checkpoint_exposure: I256,
    ) -> Result<FixedPoint, MathError> {
        const INTERPOLATION_WEIGHT: FixedPoint = FixedPoint::from_scaled(800_000_000_000_000_000);

        let spot_price = self.calculate_spot_price()?;
        let guess = self.max_long_estimate(spot_price, spot_price, checkpoint_exposure)?;

        let one_minus_t = FixedPoint::ONE.checked_sub(self.t())?;
        let weight = guess
            .div_down(absolute_max_base_amount)?
            .pow(FixedPoint::ONE.div_up(one_minus_t)?)?
            .mul_down(INTERPOLATION_WEIGHT)?;
        let estimate_price = spot_price
            .mul_down(FixedPoint::ONE.checked_sub(weight)?)?
            .checked_add(weight)?;
        self.max_long_estimate(estimate_price, spot_price, checkpoint_exposure)
    }

    /// Largest long, in base, that fits `budget` and keeps the pool solvent.
    ///
    /// When the absolute max long is solvent the answer is simply the
    /// smaller of it and the budget. Otherwise Newton's method walks the
    /// solvency curve for at most `max_iterations` steps, stopping early
    /// once a step would be undefined or insolvent.
    pub fn calculate_max_long(
        &self,
        budget: FixedPoint,
        checkpoint_exposure: I256,
        max_iterations: usize,
    ) -> Result<FixedPoint, Error> {
        let (absolute_max_base_amount, absolute_max_bond_amount) = self.calculate_absolute_max_long()?;
        if self
            .solvency_after_long(absolute_max_base_amount, absolute_max_bond_amount, checkpoint_exposure)?
            .is_some()
        {
            debug!(absolute_max = %absolute_max_base_amount, %budget, "absolute max long is solvent");
            return Ok(absolute_max_base_amount.min(budget));
        }

        let mut max_base_amount = self.max_long_guess(absolute_max_base_amount, checkpoint_exposure)?;
        let mut solvency = self
            .solvency_after_long(
                max_base_amount,
                self.calculate_open_long(max_base_amount)?,
                checkpoint_exposure,
            )?
            .ok_or(SolvencyError::InsolventGuess)?;
        debug!(guess = %max_base_amount, %solvency, "starting max long search");

        for iteration in 0..max_iterations {
            if max_base_amount >= absolute_max_base_amount {
                return Err(SolvencyError::AbsoluteMaxLongReached.into());
            }
            if max_base_amount >= budget {
                return Ok(budget);
            }

            let Some(derivative) = self.solvency_after_long_derivative(max_base_amount)? else {
                break;
            };
            let candidate = max_base_amount.checked_add(solvency.div_down(derivative)?)?;
            let bond_amount = match self.calculate_open_long(candidate) {
                Ok(bond_amount) => bond_amount,
                Err(Error::Solvency(_)) => break,
                Err(err) => return Err(err),
            };
            let Some(next_solvency) = self.solvency_after_long(candidate, bond_amount, checkpoint_exposure)? else {
                break;
            };

            trace!(iteration, %candidate, solvency = %next_solvency, "max long step");
            solvency = next_solvency;
            max_base_amount = candidate;
        }

        if max_base_amount >= absolute_max_base_amount {
            return Err(SolvencyError::AbsoluteMaxLongReached.into());
        }
        if max_base_amount >= budget {
            return Ok(budget);
        }
        Ok(max_base_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_MAX_ITERATIONS;
    use crate::pool::state::tests::{fee_state, fp, share_adjusted_state, test_state};
    use proptest::prelude::*;
    use tracing_test::traced_test;

    fn exposed_state() -> State {
        let mut state = test_state();
        state.info.long_exposure = fp("990000");
        state
    }

    // ------------------------- fee tests -------------------------

    #[test]
    fn long_fees() {
        let state = fee_state();
        assert_eq!(state.open_long_curve_fee(fp("1000")).unwrap(), fp("3.588673126814658"));
        assert_eq!(
            state.open_long_governance_fee(fp("1000")).unwrap(),
            fp("0.502252563473944349")
        );
    }

    #[test]
    fn no_fees_without_fee_config() {
        let state = test_state();
        assert_eq!(state.open_long_curve_fee(fp("1000")).unwrap(), FixedPoint::ZERO);
        assert_eq!(state.open_long_governance_fee(fp("1000")).unwrap(), FixedPoint::ZERO);
    }

    // ------------------------- open long tests -------------------------

    #[test]
    fn open_long_matches_curve_without_fees() {
        let state = test_state();
        let bonds = state.calculate_open_long(fp("1000")).unwrap();
        assert_eq!(bonds, fp("1071.691174809631531568"));
        assert_eq!(bonds, state.calculate_bonds_out_given_shares_in_down(fp("1000")).unwrap());
    }

    #[test]
    fn open_long_deducts_curve_fee() {
        let mut state = fee_state();
        state.info.long_exposure = fp("990000");
        assert_eq!(state.calculate_open_long(fp("1000")).unwrap(), fp("1068.102501682816873568"));
    }

    #[test]
    fn open_long_past_max_spot_price_is_negative_interest() {
        let state = test_state();
        let res = state.calculate_open_long(fp("600000"));
        assert!(matches!(res, Err(Error::Solvency(SolvencyError::NegativeInterest))));
    }

    #[test]
    fn spot_price_after_long_rises() {
        let state = test_state();
        let after = state.calculate_spot_price_after_long(fp("1000")).unwrap();
        assert_eq!(after, fp("0.933176268776182946"));
        assert!(after > state.calculate_spot_price().unwrap());
    }

    // ------------------------- absolute max tests -------------------------

    #[test]
    fn absolute_max_long_of_balanced_pool() {
        let (base, bonds) = test_state().calculate_absolute_max_long().unwrap();
        assert_eq!(base, fp("491481.901272699541500859"));
        assert_eq!(bonds, fp("508518.098727300458499141"));
    }

    #[test]
    fn solvency_after_long_flags_insolvency() {
        let state = exposed_state();
        let (base, bonds) = state.calculate_absolute_max_long().unwrap();
        assert_eq!(state.solvency_after_long(base, bonds, I256::ZERO).unwrap(), None);

        let small = state
            .solvency_after_long(fp("1000"), state.calculate_open_long(fp("1000")).unwrap(), I256::ZERO)
            .unwrap();
        assert!(small.is_some());
    }

    // ------------------------- max long tests -------------------------

    #[test]
    fn max_long_is_budget_bound_for_small_budgets() {
        let state = test_state();
        let max = state.calculate_max_long(FixedPoint::ONE, I256::ZERO, DEFAULT_MAX_ITERATIONS).unwrap();
        assert_eq!(max, FixedPoint::ONE);
    }

    #[test]
    fn max_long_is_absolute_max_for_large_budgets() {
        let state = test_state();
        let max = state
            .calculate_max_long(fp("1000000000000"), I256::ZERO, DEFAULT_MAX_ITERATIONS)
            .unwrap();
        assert_eq!(max, fp("491481.901272699541500859"));
    }

    #[test]
    fn max_long_bound_by_solvency() {
        let state = exposed_state();
        let max = state
            .calculate_max_long(fp("1000000000"), I256::ZERO, DEFAULT_MAX_ITERATIONS)
            .unwrap();
        assert_eq!(max, fp("172122.373760584495603236"));
        assert!(state
            .solvency_after_long(max, state.calculate_open_long(max).unwrap(), I256::ZERO)
            .unwrap()
            .is_some());
    }

    #[test]
    fn max_long_bound_by_solvency_returns_budget_when_smaller() {
        let state = exposed_state();
        let max = state.calculate_max_long(fp("1000"), I256::ZERO, DEFAULT_MAX_ITERATIONS).unwrap();
        assert_eq!(max, fp("1000"));
    }

    #[test]
    fn max_long_with_fees_and_exposure() {
        let mut state = fee_state();
        state.info.long_exposure = fp("990000");
        let max = state
            .calculate_max_long(fp("1000000000"), I256::ZERO, DEFAULT_MAX_ITERATIONS)
            .unwrap();
        assert_eq!(max, fp("185140.782872920604228021"));
    }

    #[test]
    fn max_long_with_share_adjustment() {
        let state = share_adjusted_state();
        let max = state
            .calculate_max_long(fp("1000000"), I256::ZERO, DEFAULT_MAX_ITERATIONS)
            .unwrap();
        assert_eq!(max, fp("527726.782677740301394662"));
    }

    #[test]
    #[traced_test]
    fn max_long_logs_the_branch_taken() {
        let state = exposed_state();
        state
            .calculate_max_long(fp("1000000000"), I256::ZERO, DEFAULT_MAX_ITERATIONS)
            .unwrap();
        assert!(logs_contain("starting max long search"));
        assert!(!logs_contain("absolute max long is solvent"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn max_long_is_monotone_in_budget(a in 1u64..2_000_000, b in 1u64..2_000_000) {
            let state = test_state();
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let low = state
                .calculate_max_long(FixedPoint::from_int(low), I256::ZERO, DEFAULT_MAX_ITERATIONS)
                .unwrap();
            let high = state
                .calculate_max_long(FixedPoint::from_int(high), I256::ZERO, DEFAULT_MAX_ITERATIONS)
                .unwrap();
            prop_assert!(low <= high);
        }
    }
}
