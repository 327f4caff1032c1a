use crate::error::MathError;
use crate::fixed_point::FixedPoint;
use crate::math::yield_space::YieldSpace;
use crate::pool::state::State;

impl State {
    /// Curve fee on the portion of a position still trading on the curve.
    pub fn close_curve_fee(
        &self,
        bond_amount: FixedPoint,
        normalized_time_remaining: FixedPoint,
    ) -> Result<FixedPoint, MathError> {
        let spot_price = self.calculate_spot_price()?;
        self.curve_fee()
            .mul_down(FixedPoint::ONE.checked_sub(spot_price)?)?
            .mul_down(bond_amount.mul_div_down(normalized_time_remaining, self.c())?)
    }

    /// Flat fee on the matured portion of a position.
    pub fn close_flat_fee(
        &self,
        bond_amount: FixedPoint,
        normalized_time_remaining: FixedPoint,
    ) -> Result<FixedPoint, MathError> {
        bond_amount
            .mul_div_down(FixedPoint::ONE.checked_sub(normalized_time_remaining)?, self.c())?
            .mul_down(self.flat_fee())
    }

    /// Shares paid out for closing `bond_amount` of longs.
    ///
    /// The matured fraction is redeemed at par and the rest is sold into the
    /// curve. Both fees come out of the proceeds.
    pub fn calculate_close_long(
        &self,
        bond_amount: FixedPoint,
        maturity_time: u64,
        current_time: u64,
    ) -> Result<FixedPoint, MathError> {
        let time_remaining = self.calculate_normalized_time_remaining(maturity_time, current_time)?;

        let flat = bond_amount.mul_div_down(FixedPoint::ONE.checked_sub(time_remaining)?, self.c())?;
        let curve = if time_remaining > FixedPoint::ZERO {
            self.calculate_shares_out_given_bonds_in_down(bond_amount.mul_down(time_remaining)?)?
        } else {
            FixedPoint::ZERO
        };

        flat.checked_add(curve)?
            .checked_sub(self.close_curve_fee(bond_amount, time_remaining)?)?
            .checked_sub(self.close_flat_fee(bond_amount, time_remaining)?)
    }

    /// Shares returned to a trader closing `bond_amount` of shorts opened at
    /// `open_share_price` and closed at `close_share_price`.
    ///
    /// The trader gets back the bonds' value grown by the share price ratio
    /// plus the flat fee they prepaid, minus the cost of buying the bonds
    /// back. Proceeds never go below zero.
    pub fn calculate_close_short(
        &self,
        bond_amount: FixedPoint,
        open_share_price: FixedPoint,
        close_share_price: FixedPoint,
        maturity_time: u64,
        current_time: u64,
    ) -> Result<FixedPoint, MathError> {
        let time_remaining = self.calculate_normalized_time_remaining(maturity_time, current_time)?;
        let c = self.c();

        let flat = bond_amount.mul_div_down(FixedPoint::ONE.checked_sub(time_remaining)?, c)?;
        let curve = if time_remaining > FixedPoint::ZERO {
            self.calculate_shares_in_given_bonds_out_up(bond_amount.mul_down(time_remaining)?)?
        } else {
            FixedPoint::ZERO
        };
        let share_reserves_delta = flat
            .checked_add(curve)?
            .checked_add(self.close_curve_fee(bond_amount, time_remaining)?)?
            .checked_add(self.close_flat_fee(bond_amount, time_remaining)?)?;

        let bond_factor = bond_amount
            .mul_div_down(close_share_price, open_share_price.mul_up(c)?)?
            .checked_add(bond_amount.mul_div_down(self.flat_fee(), c)?)?;

        Ok(bond_factor
            .checked_sub(share_reserves_delta)
            .unwrap_or(FixedPoint::ZERO))
    }
}
