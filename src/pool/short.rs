use alloy_primitives::I256;
use tracing::{debug, trace};

use crate::error::{Error, MathError, SolvencyError};
use crate::fixed_point::FixedPoint;
use crate::math::yield_space::{calculate_effective_share_reserves, calculate_spot_price, YieldSpace};
use crate::pool::state::State;

/// Shortfall from the budget, in base, at which the max short search stops.
pub const MAX_SHORT_TOLERANCE: FixedPoint = FixedPoint::from_scaled(1_000_000_000);

impl State {
    /// Treats an open share price of zero as "checkpoint not minted yet".
    fn resolve_open_share_price(&self, open_share_price: FixedPoint) -> FixedPoint {
        if open_share_price.is_zero() {
            self.c()
        } else {
            open_share_price
        }
    }

    // ---- fees ----

    /// Curve fee charged on a short: `φ_c * (1 - p) * bonds`.
    pub fn open_short_curve_fee(
        &self,
        bond_amount: FixedPoint,
        spot_price: FixedPoint,
    ) -> Result<FixedPoint, MathError> {
        self.curve_fee()
            .mul_down(FixedPoint::ONE.checked_sub(spot_price)?)?
            .mul_down(bond_amount)
    }

    pub fn open_short_governance_fee(
        &self,
        bond_amount: FixedPoint,
        spot_price: FixedPoint,
    ) -> Result<FixedPoint, MathError> {
        self.governance_fee()
            .mul_down(self.open_short_curve_fee(bond_amount, spot_price)?)
    }

    // ---- pricing ----

    /// Shares the pool pays out for the bonds a short sells into the curve.
    pub fn calculate_short_principal(&self, bond_amount: FixedPoint) -> Result<FixedPoint, MathError> {
        self.calculate_shares_out_given_bonds_in_down(bond_amount)
    }

    /// Base a trader deposits to short `bond_amount` bonds:
    ///
    /// `D(x) = x * c / c0 + φ_f * x + φ_c * (1 - p) * x - c * P(x)`
    ///
    /// where `P(x)` is the short principal in shares. An `open_share_price`
    /// of zero uses the current share price.
    pub fn calculate_open_short(
        &self,
        bond_amount: FixedPoint,
        spot_price: FixedPoint,
        open_share_price: FixedPoint,
    ) -> Result<FixedPoint, MathError> {
        let c = self.c();
        let open_share_price = self.resolve_open_share_price(open_share_price);
        bond_amount
            .mul_div_down(c, open_share_price)?
            .checked_add(self.flat_fee().mul_down(bond_amount)?)?
            .checked_add(self.open_short_curve_fee(bond_amount, spot_price)?)?
            .checked_sub(c.mul_down(self.calculate_short_principal(bond_amount)?)?)
    }

    /// Spot price after shorting `bond_amount` bonds.
    pub fn calculate_spot_price_after_short(&self, bond_amount: FixedPoint) -> Result<FixedPoint, MathError> {
        let share_reserves = self
            .z()
            .checked_sub(self.calculate_short_principal(bond_amount)?)?;
        calculate_spot_price(
            calculate_effective_share_reserves(share_reserves, self.zeta())?,
            self.y().checked_add(bond_amount)?,
            self.mu(),
            self.t(),
        )
    }

    // ---- derivatives ----

    /// `(µ / c) * (k - (y + x)^(1 - t))`
    fn short_theta(&self, bond_amount: FixedPoint) -> Result<FixedPoint, MathError> {
        let one_minus_t = FixedPoint::ONE.checked_sub(self.t())?;
        self.mu().div_down(self.c())?.mul_down(
            self.k_down()?
                .checked_sub(self.y().checked_add(bond_amount)?.pow(one_minus_t)?)?,
        )
    }

    /// `D'(x)`, the derivative of [`State::calculate_open_short`].
    pub fn short_deposit_derivative(
        &self,
        bond_amount: FixedPoint,
        spot_price: FixedPoint,
        open_share_price: FixedPoint,
    ) -> Result<FixedPoint, MathError> {
        let t = self.t();
        let one_minus_t = FixedPoint::ONE.checked_sub(t)?;
        let open_share_price = self.resolve_open_share_price(open_share_price);

        let principal_term = FixedPoint::ONE
            .div_down(self.y().checked_add(bond_amount)?.pow(t)?)?
            .mul_down(self.short_theta(bond_amount)?.pow(t.div_down(one_minus_t)?)?)?;
        self.c()
            .div_down(open_share_price)?
            .checked_add(self.flat_fee())?
            .checked_add(self.curve_fee().mul_down(FixedPoint::ONE.checked_sub(spot_price)?)?)?
            .checked_sub(principal_term)
    }

    /// `P'(x)`, the derivative of the short principal.
    pub fn short_principal_derivative(&self, bond_amount: FixedPoint) -> Result<FixedPoint, MathError> {
        let t = self.t();
        let one_minus_t = FixedPoint::ONE.checked_sub(t)?;
        let lhs = FixedPoint::ONE.div_down(
            self.c()
                .mul_up(self.y().checked_add(bond_amount)?.pow(t)?)?,
        )?;
        let rhs = self.short_theta(bond_amount)?.pow(t.div_up(one_minus_t)?)?;
        lhs.mul_down(rhs)
    }

    // ---- solvency ----

    /// Pool solvency after shorting `bond_amount` bonds, or `None` when the
    /// short can't be priced or would leave the pool insolvent.
    pub fn solvency_after_short(
        &self,
        bond_amount: FixedPoint,
        spot_price: FixedPoint,
        checkpoint_exposure: I256,
    ) -> Result<Option<FixedPoint>, MathError> {
        let Ok(principal) = self.calculate_short_principal(bond_amount) else {
            return Ok(None);
        };
        let c = self.c();
        let fees = self
            .open_short_curve_fee(bond_amount, spot_price)?
            .checked_sub(self.open_short_governance_fee(bond_amount, spot_price)?)?
            .div_down(c)?;

        // the pool keeps the fees net of governance and pays out the principal
        let share_reserves = if fees > principal {
            self.z().checked_add(fees.checked_sub(principal)?)?
        } else {
            match self.z().checked_sub(principal.checked_sub(fees)?) {
                Ok(share_reserves) => share_reserves,
                Err(_) => return Ok(None),
            }
        };

        let exposure = self
            .long_exposure()
            .checked_sub(Self::positive_part(checkpoint_exposure))?
            .div_down(c)?;
        let rhs = exposure.checked_add(self.minimum_share_reserves())?;
        Ok(share_reserves.checked_sub(rhs).ok())
    }

    /// Derivative of [`State::solvency_after_short`], or `None` when it would
    /// be negative.
    pub fn solvency_after_short_derivative(
        &self,
        bond_amount: FixedPoint,
        spot_price: FixedPoint,
    ) -> Result<Option<FixedPoint>, MathError> {
        let lhs = self.short_principal_derivative(bond_amount)?;
        let rhs = self
            .curve_fee()
            .mul_down(FixedPoint::ONE.checked_sub(spot_price)?)?
            .mul_down(FixedPoint::ONE.checked_sub(self.governance_fee())?)?
            .div_down(self.c())?;
        Ok(lhs.checked_sub(rhs).ok())
    }

    // ---- max short ----

    /// Conservative starting point for the solvency-bound absolute max short.
    fn absolute_max_short_guess(
        &self,
        spot_price: FixedPoint,
        checkpoint_exposure: I256,
    ) -> Result<FixedPoint, MathError> {
        let c = self.c();
        let one_minus_p = FixedPoint::ONE.checked_sub(spot_price)?;
        let numerator = c.mul_down(
            self.calculate_solvency()?
                .checked_add(Self::positive_part(checkpoint_exposure).div_down(c)?)?,
        )?;
        let denominator = spot_price
            .checked_sub(self.curve_fee().mul_down(one_minus_p)?)?
            .checked_add(self.governance_fee().mul_down(self.curve_fee())?.mul_down(one_minus_p)?)?;
        numerator.div_down(denominator)
    }

    /// Largest short the pool can take, ignoring the trader's budget.
    ///
    /// This is the short that draws the share reserves down to the minimum.
    /// When the pool would be insolvent there, Newton's method on
    /// [`State::solvency_after_short`] finds the largest solvent short
    /// instead.
    pub fn calculate_absolute_max_short(
        &self,
        spot_price: FixedPoint,
        checkpoint_exposure: I256,
        max_iterations: usize,
    ) -> Result<FixedPoint, Error> {
        let t = self.t();
        let one_minus_t = FixedPoint::ONE.checked_sub(t)?;
        let mu = self.mu();

        let optimal_share_reserves = self
            .minimum_share_reserves()
            .checked_add(Self::positive_part(self.zeta()))?;
        let optimal_effective_share_reserves =
            calculate_effective_share_reserves(optimal_share_reserves, self.zeta())?;
        let optimal_bond_reserves = self.k_down()?.checked_sub(
            self.c()
                .div_up(mu)?
                .mul_up(mu.mul_up(optimal_effective_share_reserves)?.pow(one_minus_t)?)?,
        )?;
        let optimal_bond_reserves = if optimal_bond_reserves >= FixedPoint::ONE {
            optimal_bond_reserves.pow(FixedPoint::ONE.div_down(one_minus_t)?)?
        } else {
            optimal_bond_reserves.pow(FixedPoint::ONE.div_up(one_minus_t)?)?
        };

        let absolute_max_bond_amount = optimal_bond_reserves.checked_sub(self.y())?;
        if self
            .solvency_after_short(absolute_max_bond_amount, spot_price, checkpoint_exposure)?
            .is_some()
        {
            return Ok(absolute_max_bond_amount);
        }

        let mut max_bond_amount = self.absolute_max_short_guess(spot_price, checkpoint_exposure)?;
        let mut solvency = self
            .solvency_after_short(max_bond_amount, spot_price, checkpoint_exposure)?
            .ok_or(SolvencyError::InsolventGuess)?;
        debug!(guess = %max_bond_amount, %solvency, "absolute max short is insolvent, searching");

        for iteration in 0..max_iterations {
            let Some(derivative) = self.solvency_after_short_derivative(max_bond_amount, spot_price)? else {
                break;
            };
            let candidate = max_bond_amount.checked_add(solvency.div_down(derivative)?)?;
            if candidate > absolute_max_bond_amount {
                break;
            }
            let Some(next_solvency) = self.solvency_after_short(candidate, spot_price, checkpoint_exposure)? else {
                break;
            };

            trace!(iteration, %candidate, solvency = %next_solvency, "absolute max short step");
            solvency = next_solvency;
            max_bond_amount = candidate;
        }

        Ok(max_bond_amount)
    }

    /// Guess from a price the caller knows is below the realized price, kept
    /// only when its deposit fits the budget.
    fn conservative_short_guess(
        &self,
        budget: FixedPoint,
        spot_price: FixedPoint,
        open_share_price: FixedPoint,
        conservative_price: FixedPoint,
    ) -> Result<Option<FixedPoint>, MathError> {
        let denominator = self
            .c()
            .div_up(open_share_price)?
            .checked_add(self.flat_fee())?
            .checked_add(self.curve_fee().mul_down(FixedPoint::ONE.checked_sub(spot_price)?)?)?
            .checked_sub(conservative_price)?;
        let guess = budget.div_down(denominator)?;
        let deposit = self.calculate_open_short(guess, spot_price, open_share_price)?;
        Ok((budget >= deposit).then_some(guess))
    }

    /// Starting point for the max short search.
    ///
    /// A conservative price below the realized price gives a close guess.
    /// Without one, a price of zero stands in: it ignores the principal, so
    /// the guess's deposit is bounded by the budget.
    fn max_short_guess(
        &self,
        budget: FixedPoint,
        spot_price: FixedPoint,
        open_share_price: FixedPoint,
        conservative_price: Option<FixedPoint>,
    ) -> FixedPoint {
        if let Some(conservative_price) = conservative_price {
            if let Ok(Some(guess)) =
                self.conservative_short_guess(budget, spot_price, open_share_price, conservative_price)
            {
                return guess;
            }
        }

        match self.conservative_short_guess(budget, spot_price, open_share_price, FixedPoint::ZERO) {
            Ok(Some(guess)) => guess,
            _ => FixedPoint::ZERO,
        }
    }

    /// Largest short, in bonds, whose deposit fits `budget`.
    ///
    /// The search keeps a bracket around the root of `B - D(x)`: `low` always
    /// fits the budget and `high` never does, starting from the guess and the
    /// absolute max short. `D` is convex, so a Newton step from `low` lands
    /// on or past the root and tightens `high`, while the secant between the
    /// bracket ends stays under the curve and raises `low`. The search stops
    /// once `low` is within [`MAX_SHORT_TOLERANCE`] of the budget or after
    /// `max_iterations`, and returns `low`.
    ///
    /// Fails with [`SolvencyError::MaxShortExceededBudget`] when no positive
    /// short fits the budget.
    pub fn calculate_max_short(
        &self,
        budget: FixedPoint,
        open_share_price: FixedPoint,
        checkpoint_exposure: I256,
        conservative_price: Option<FixedPoint>,
        max_iterations: usize,
    ) -> Result<FixedPoint, Error> {
        if budget.is_zero() {
            return Ok(FixedPoint::ZERO);
        }

        let spot_price = self.calculate_spot_price()?;
        let open_share_price = self.resolve_open_share_price(open_share_price);

        let absolute_max_bond_amount =
            self.calculate_absolute_max_short(spot_price, checkpoint_exposure, max_iterations)?;
        let Ok(absolute_max_deposit) =
            self.calculate_open_short(absolute_max_bond_amount, spot_price, open_share_price)
        else {
            return Ok(absolute_max_bond_amount);
        };
        if absolute_max_deposit <= budget {
            debug!(absolute_max = %absolute_max_bond_amount, deposit = %absolute_max_deposit, "absolute max short fits the budget");
            return Ok(absolute_max_bond_amount);
        }

        let guess = self.max_short_guess(budget, spot_price, open_share_price, conservative_price);
        let guess_deposit = if guess < absolute_max_bond_amount {
            self.calculate_open_short(guess, spot_price, open_share_price).ok()
        } else {
            None
        };
        let (mut low, mut low_deposit) = match guess_deposit {
            Some(deposit) if deposit <= budget => (guess, deposit),
            _ => (FixedPoint::ZERO, FixedPoint::ZERO),
        };
        let (mut high, mut high_deposit) = (absolute_max_bond_amount, absolute_max_deposit);
        debug!(guess = %low, %budget, "starting max short search");

        for iteration in 0..max_iterations {
            let residual = budget.checked_sub(low_deposit)?;
            if residual <= MAX_SHORT_TOLERANCE {
                debug!(iteration, candidate = %low, %residual, "max short converged");
                break;
            }

            let derivative = self.short_deposit_derivative(low, spot_price, open_share_price)?;
            let candidate = low.checked_add(residual.div_down(derivative)?)?;
            if low < candidate && candidate < high {
                if let Ok(deposit) = self.calculate_open_short(candidate, spot_price, open_share_price) {
                    if deposit <= budget {
                        trace!(iteration, %candidate, %deposit, "max short newton step");
                        low = candidate;
                        low_deposit = deposit;
                        continue;
                    }
                    trace!(iteration, %candidate, %deposit, "max short newton step overshot");
                    high = candidate;
                    high_deposit = deposit;
                }
            }

            let secant = low.checked_add(
                residual.mul_div_down(high.checked_sub(low)?, high_deposit.checked_sub(low_deposit)?)?,
            )?;
            match self.calculate_open_short(secant, spot_price, open_share_price) {
                Ok(deposit) if deposit <= budget => {
                    if secant > low {
                        low = secant;
                        low_deposit = deposit;
                    }
                }
                Ok(deposit) if secant < high => {
                    high = secant;
                    high_deposit = deposit;
                }
                _ => {}
            }
            trace!(iteration, %low, %high, "max short secant step");
        }

        if low.is_zero() {
            return Err(SolvencyError::MaxShortExceededBudget.into());
        }
        if low > absolute_max_bond_amount {
            return Err(SolvencyError::AbsoluteMaxShortExceeded.into());
        }
        Ok(low)
    }
}
