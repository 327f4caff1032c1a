use alloy_primitives::I256;

use crate::error::{Error, MathError, SolvencyError};
use crate::fixed_point::FixedPoint;
use crate::math::yield_space::YieldSpace;
use crate::pool::state::State;

fn signed(value: FixedPoint) -> Result<I256, MathError> {
    I256::try_from(value.raw()).map_err(|_| MathError::Overflow)
}

impl State {
    /// Present value of the LPs' capital, in shares.
    ///
    /// Outstanding positions are netted and closed against the pool: the
    /// part still on the curve is traded on the curve and the matured part
    /// is settled flat. What remains above the minimum share reserves
    /// belongs to the LPs.
    pub fn calculate_present_value(&self, current_time: u64) -> Result<FixedPoint, Error> {
        let long_time_remaining =
            self.calculate_scaled_normalized_time_remaining(self.info.long_average_maturity_time, current_time)?;
        let short_time_remaining =
            self.calculate_scaled_normalized_time_remaining(self.info.short_average_maturity_time, current_time)?;

        let net_curve_trade = self.calculate_net_curve_trade(long_time_remaining, short_time_remaining)?;
        let net_flat_trade = self.calculate_net_flat_trade(long_time_remaining, short_time_remaining)?;
        let present_value = signed(self.z())?
            .checked_add(net_curve_trade)
            .and_then(|value| value.checked_add(net_flat_trade))
            .ok_or(MathError::Overflow)?
            .checked_sub(signed(self.minimum_share_reserves())?)
            .ok_or(MathError::Underflow)?;

        if present_value.is_negative() {
            return Err(SolvencyError::NegativePresentValue.into());
        }
        Ok(FixedPoint::from_raw(present_value.into_raw()))
    }

    /// Change in share reserves from closing the net curve position.
    ///
    /// A net long position is sold into the curve, so the result is
    /// negative. Bonds beyond what the curve can absorb are marked to zero.
    /// A net short position is bought back; bonds beyond what the curve can
    /// supply are bought at a price of one.
    pub fn calculate_net_curve_trade(
        &self,
        long_time_remaining: FixedPoint,
        short_time_remaining: FixedPoint,
    ) -> Result<I256, MathError> {
        let longs = self.info.longs_outstanding.mul_down(long_time_remaining)?;
        let shorts = self.info.shorts_outstanding.mul_down(short_time_remaining)?;

        if longs > shorts {
            let net_curve_position = longs.checked_sub(shorts)?;
            let max_curve_trade = self.calculate_max_sell_bonds_in(self.minimum_share_reserves())?;
            let shares = if max_curve_trade >= net_curve_position {
                self.calculate_shares_out_given_bonds_in_down(net_curve_position)?
            } else {
                self.ze()?.checked_sub(self.minimum_share_reserves())?
            };
            Ok(-signed(shares)?)
        } else if shorts > longs {
            let net_curve_position = shorts.checked_sub(longs)?;
            let max_curve_trade = self.calculate_max_buy_bonds_out()?;
            let shares = if max_curve_trade >= net_curve_position {
                self.calculate_shares_in_given_bonds_out_up(net_curve_position)?
            } else {
                self.calculate_max_buy_shares_in()?.checked_add(
                    net_curve_position
                        .checked_sub(max_curve_trade)?
                        .div_down(self.c())?,
                )?
            };
            signed(shares)
        } else {
            Ok(I256::ZERO)
        }
    }

    /// Change in share reserves from settling the matured parts of the
    /// outstanding positions at par.
    pub fn calculate_net_flat_trade(
        &self,
        long_time_remaining: FixedPoint,
        short_time_remaining: FixedPoint,
    ) -> Result<I256, MathError> {
        let c = self.c();
        let shorts = self
            .info
            .shorts_outstanding
            .mul_div_down(FixedPoint::ONE.checked_sub(short_time_remaining)?, c)?;
        let longs = self
            .info
            .longs_outstanding
            .mul_div_down(FixedPoint::ONE.checked_sub(long_time_remaining)?, c)?;
        signed(shorts)?
            .checked_sub(signed(longs)?)
            .ok_or(MathError::Underflow)
    }
}
