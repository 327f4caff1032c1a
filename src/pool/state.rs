use alloy_primitives::I256;

use crate::error::{ConversionError, MathError};
use crate::fixed_point::FixedPoint;
use crate::math::yield_space::YieldSpace;
use crate::pool::config::{PoolConfig, PoolInfo, RawState};

/// Seconds in a 365 day year.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// A pool snapshot: the immutable config plus one `PoolInfo` reading.
///
/// Every quantity is derived on demand from these two values; a `State` is
/// never mutated, a newer snapshot means a new `State`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct State {
    pub config: PoolConfig,
    pub info: PoolInfo,
}

impl State {
    pub fn new(config: PoolConfig, info: PoolInfo) -> Self {
        Self { config, info }
    }

    /// Builds a state from the string wire form.
    pub fn try_from_raw(raw: &RawState) -> Result<Self, ConversionError> {
        Ok(Self {
            config: PoolConfig::try_from(&raw.config)?,
            info: PoolInfo::try_from(&raw.info)?,
        })
    }

    // ---- accessors ----

    pub(crate) fn minimum_share_reserves(&self) -> FixedPoint {
        self.config.minimum_share_reserves
    }

    pub(crate) fn curve_fee(&self) -> FixedPoint {
        self.config.fees.curve
    }

    pub(crate) fn flat_fee(&self) -> FixedPoint {
        self.config.fees.flat
    }

    pub(crate) fn governance_fee(&self) -> FixedPoint {
        self.config.fees.governance
    }

    pub(crate) fn long_exposure(&self) -> FixedPoint {
        self.info.long_exposure
    }

    /// Position duration expressed in years.
    pub fn annualized_position_duration(&self) -> Result<FixedPoint, MathError> {
        FixedPoint::from_int(self.config.position_duration)
            .div_down(FixedPoint::from_int(SECONDS_PER_YEAR))
    }

    // ---- derived quantities ----

    /// Fixed APR implied by the spot price: `(1 - p) / (p * t)`.
    pub fn calculate_spot_rate(&self) -> Result<FixedPoint, MathError> {
        self.calculate_rate_given_price(self.calculate_spot_price()?)
    }

    /// Fixed APR a bond bought at `price` earns over the position duration.
    pub fn calculate_rate_given_price(&self, price: FixedPoint) -> Result<FixedPoint, MathError> {
        FixedPoint::ONE
            .checked_sub(price)?
            .div_down(price.mul_down(self.annualized_position_duration()?)?)
    }

    /// Effective share and bond reserves that put the spot rate at
    /// `target_rate` while keeping the curve invariant.
    ///
    /// Long exposure is not taken into account, so the reserves may leave
    /// the pool insolvent.
    pub fn reserves_given_rate_ignoring_exposure(
        &self,
        target_rate: FixedPoint,
    ) -> Result<(FixedPoint, FixedPoint), MathError> {
        let one_minus_t = FixedPoint::ONE.checked_sub(self.t())?;
        let c_over_mu = self.c().div_up(self.mu())?;
        let scaled_rate = target_rate
            .mul_up(self.annualized_position_duration()?)?
            .checked_add(FixedPoint::ONE)?
            .pow(FixedPoint::ONE.div_down(self.t())?)?;
        let inner = self
            .k_down()?
            .div_down(c_over_mu.checked_add(scaled_rate.pow(one_minus_t)?)?)?
            .pow(FixedPoint::ONE.div_down(one_minus_t)?)?;
        Ok((inner.div_down(self.mu())?, inner.mul_down(scaled_rate)?))
    }

    /// Highest spot price a long can push the pool to before the trader
    /// would pay negative interest once fees are taken.
    pub fn calculate_max_spot_price(&self) -> Result<FixedPoint, MathError> {
        let spot_price = self.calculate_spot_price()?;
        let one_minus_flat = FixedPoint::ONE.checked_sub(self.flat_fee())?;
        let curve_term = self
            .curve_fee()
            .mul_up(FixedPoint::ONE.div_up(spot_price)?.checked_sub(FixedPoint::ONE)?)?
            .mul_up(one_minus_flat)?;
        one_minus_flat.div_down(FixedPoint::ONE.checked_add(curve_term)?)
    }

    /// Spot price once the share reserves are drawn down to the minimum.
    pub fn calculate_min_price(&self) -> Result<FixedPoint, MathError> {
        let t = self.t();
        let one_minus_t = FixedPoint::ONE.checked_sub(t)?;
        let mu = self.mu();
        let z_min = self.minimum_share_reserves();

        let y_max = self.k_up()?.checked_sub(
            self.c()
                .div_down(mu)?
                .mul_down(mu.mul_down(z_min)?.pow(one_minus_t)?)?,
        )?;
        let y_max = y_max.pow(FixedPoint::ONE.div_up(one_minus_t)?)?;
        mu.mul_down(z_min)?.div_down(y_max)?.pow(t)
    }

    /// Share reserves left over once long exposure and the minimum reserves
    /// are covered: `z - e / c - z_min`.
    pub fn calculate_solvency(&self) -> Result<FixedPoint, MathError> {
        self.info
            .share_reserves
            .checked_sub(self.long_exposure().div_down(self.c())?)?
            .checked_sub(self.minimum_share_reserves())
    }

    /// Rounds a timestamp down to the checkpoint containing it.
    pub fn to_checkpoint(&self, time: u64) -> Result<u64, MathError> {
        let offset = time
            .checked_rem(self.config.checkpoint_duration)
            .ok_or(MathError::DivisionByZero)?;
        Ok(time - offset)
    }

    /// Fraction of the position duration left before `maturity_time`,
    /// measured from the checkpoint containing `current_time`.
    pub fn calculate_normalized_time_remaining(
        &self,
        maturity_time: u64,
        current_time: u64,
    ) -> Result<FixedPoint, MathError> {
        let checkpoint = self.to_checkpoint(current_time)?;
        if maturity_time > checkpoint {
            FixedPoint::from_int(maturity_time - checkpoint)
                .div_down(FixedPoint::from_int(self.config.position_duration))
        } else {
            Ok(FixedPoint::ZERO)
        }
    }

    /// Like [`State::calculate_normalized_time_remaining`] for a maturity
    /// kept as an 18 decimal fixed point, such as an average maturity time.
    pub fn calculate_scaled_normalized_time_remaining(
        &self,
        scaled_maturity_time: FixedPoint,
        current_time: u64,
    ) -> Result<FixedPoint, MathError> {
        let latest_checkpoint = FixedPoint::from_int(self.to_checkpoint(current_time)?);
        if scaled_maturity_time > latest_checkpoint {
            scaled_maturity_time
                .checked_sub(latest_checkpoint)?
                .div_down(FixedPoint::from_int(self.config.position_duration))
        } else {
            Ok(FixedPoint::ZERO)
        }
    }

    /// Positive part of a signed checkpoint exposure.
    pub(crate) fn positive_part(value: I256) -> FixedPoint {
        if value.is_positive() {
            FixedPoint::from_raw(value.into_raw())
        } else {
            FixedPoint::ZERO
        }
    }

    /// Magnitude of the negative part of a signed checkpoint exposure.
    pub(crate) fn negative_part(value: I256) -> FixedPoint {
        if value.is_negative() {
            FixedPoint::from_raw(value.unsigned_abs())
        } else {
            FixedPoint::ZERO
        }
    }
}

impl YieldSpace for State {
    fn z(&self) -> FixedPoint {
        self.info.share_reserves
    }

    fn zeta(&self) -> I256 {
        self.info.share_adjustment
    }

    fn y(&self) -> FixedPoint {
        self.info.bond_reserves
    }

    fn c(&self) -> FixedPoint {
        self.info.share_price
    }

    fn mu(&self) -> FixedPoint {
        self.config.initial_share_price
    }

    fn t(&self) -> FixedPoint {
        self.config.time_stretch
    }
}

/// Time stretch for a target APR: `1 / (5.24592 / (0.04665 * rate * 100))`.
pub fn calculate_time_stretch(rate: FixedPoint) -> Result<FixedPoint, MathError> {
    const NUMERATOR: FixedPoint = FixedPoint::from_scaled(5_245_920_000_000_000_000);
    const COEFFICIENT: FixedPoint = FixedPoint::from_scaled(46_650_000_000_000_000);

    let rate = rate.mul_down(FixedPoint::from_int(100))?;
    let inverse = NUMERATOR.div_down(COEFFICIENT.mul_down(rate)?)?;
    FixedPoint::ONE.div_down(inverse)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy_primitives::U256;
    use proptest::prelude::*;

    use crate::pool::config::Fees;

    pub(crate) fn fp(s: &str) -> FixedPoint {
        s.parse().unwrap()
    }

    /// z = 1,000,000, y = 2,000,000, c = µ = 1, t = 0.1, z_min = 0.1, no fees.
    pub(crate) fn test_state() -> State {
        State::new(
            PoolConfig {
                initial_share_price: FixedPoint::ONE,
                minimum_share_reserves: fp("0.1"),
                position_duration: 604_800,
                checkpoint_duration: 86_400,
                time_stretch: fp("0.1"),
                ..Default::default()
            },
            PoolInfo {
                share_reserves: fp("1000000"),
                bond_reserves: fp("2000000"),
                lp_total_supply: fp("3000000"),
                share_price: FixedPoint::ONE,
                lp_share_price: FixedPoint::ONE,
                ..Default::default()
            },
        )
    }

    /// Same reserves with curve 5%, flat 0.05% and governance 15%.
    pub(crate) fn fee_state() -> State {
        let mut state = test_state();
        state.config.fees = Fees {
            curve: fp("0.05"),
            flat: fp("0.0005"),
            governance: fp("0.15"),
        };
        state
    }

    /// c = 1.05 with 50,000 shares of positive share adjustment.
    pub(crate) fn share_adjusted_state() -> State {
        let mut state = test_state();
        state.info.share_price = fp("1.05");
        state.info.share_adjustment = I256::from_raw(fp("50000").raw());
        state
    }

    // ------------------------- spot tests -------------------------

    #[test]
    fn spot_price_and_rate() {
        let state = test_state();
        assert_eq!(state.calculate_spot_price().unwrap(), fp("0.933032991536807415"));
        assert_eq!(state.calculate_spot_rate().unwrap(), fp("3.742473403678143959"));
        assert_eq!(state.calculate_spot_price().unwrap().raw(), U256::from(933_032_991_536_807_415u64));
    }

    #[test]
    fn spot_price_with_share_adjustment() {
        let state = share_adjusted_state();
        assert_eq!(state.calculate_spot_price().unwrap(), fp("0.928259411045537832"));
    }

    #[test]
    fn spot_price_fails_when_adjustment_exceeds_reserves() {
        let mut state = test_state();
        state.info.share_adjustment = I256::from_raw(fp("1000001").raw());
        assert!(matches!(state.calculate_spot_price(), Err(MathError::Underflow)));
    }

    #[test]
    fn max_and_min_prices() {
        let state = test_state();
        assert_eq!(state.calculate_max_spot_price().unwrap(), FixedPoint::ONE);
        assert_eq!(state.calculate_min_price().unwrap(), fp("0.177496761004277102"));
    }

    #[test]
    fn max_spot_price_with_fees_and_exposure() {
        let mut state = fee_state();
        state.info.long_exposure = fp("990000");
        assert_eq!(state.calculate_max_spot_price().unwrap(), fp("0.995927727955971606"));
    }

    // ------------------------- reserves tests -------------------------

    #[test]
    fn reserves_at_current_rate_match_pool() {
        let state = test_state();
        let rate = state.calculate_spot_rate().unwrap();
        let (share_reserves, bond_reserves) = state.reserves_given_rate_ignoring_exposure(rate).unwrap();
        assert_eq!(share_reserves, fp("999999.999999999970901357"));
        assert_eq!(bond_reserves, fp("2000000.000000000022802713"));
    }

    #[test]
    fn reserves_for_lower_rate() {
        let state = test_state();
        let (share_reserves, bond_reserves) = state.reserves_given_rate_ignoring_exposure(fp("3")).unwrap();
        assert_eq!(share_reserves, fp("1088968.907613612208814485"));
        assert_eq!(bond_reserves, fp("1905284.709176658081122797"));
    }

    // ------------------------- solvency tests -------------------------

    #[test]
    fn solvency_subtracts_exposure_and_minimum() {
        let mut state = test_state();
        assert_eq!(state.calculate_solvency().unwrap(), fp("999999.9"));
        state.info.long_exposure = fp("990000");
        assert_eq!(state.calculate_solvency().unwrap(), fp("9999.9"));
        state.info.long_exposure = fp("1000000");
        assert!(matches!(state.calculate_solvency(), Err(MathError::Underflow)));
    }

    // ------------------------- time tests -------------------------

    #[test]
    fn checkpoints_round_down() {
        let state = test_state();
        assert_eq!(state.to_checkpoint(172_805).unwrap(), 172_800);
        assert_eq!(state.to_checkpoint(86_400).unwrap(), 86_400);
        assert_eq!(state.to_checkpoint(0).unwrap(), 0);
    }

    #[test]
    fn zero_checkpoint_duration_is_rejected() {
        let mut state = test_state();
        state.config.checkpoint_duration = 0;
        assert!(matches!(state.to_checkpoint(5), Err(MathError::DivisionByZero)));
    }

    #[test]
    fn normalized_time_remaining() {
        let state = test_state();
        assert_eq!(
            state.calculate_normalized_time_remaining(1_209_600, 604_800).unwrap(),
            FixedPoint::ONE
        );
        assert_eq!(
            state.calculate_normalized_time_remaining(100, 90).unwrap(),
            FixedPoint::from_scaled(165_343_915_343_915)
        );
        assert_eq!(
            state.calculate_normalized_time_remaining(259_200, 172_805).unwrap(),
            FixedPoint::from_scaled(142_857_142_857_142_857)
        );
        assert_eq!(
            state.calculate_normalized_time_remaining(86_400, 172_805).unwrap(),
            FixedPoint::ZERO
        );
    }

    #[test]
    fn scaled_time_remaining_from_latest_checkpoint() {
        let state = test_state();
        assert_eq!(
            state
                .calculate_scaled_normalized_time_remaining(FixedPoint::from_int(691_200), 172_805)
                .unwrap(),
            fp("0.857142857142857142")
        );
        assert_eq!(
            state
                .calculate_scaled_normalized_time_remaining(fp("172800.5"), 172_805)
                .unwrap(),
            fp("0.000000826719576719")
        );
        assert_eq!(
            state
                .calculate_scaled_normalized_time_remaining(FixedPoint::from_int(172_800), 172_805)
                .unwrap(),
            FixedPoint::ZERO
        );
    }

    #[test]
    fn annualized_duration() {
        assert_eq!(
            test_state().annualized_position_duration().unwrap(),
            FixedPoint::from_scaled(19_178_082_191_780_821)
        );
    }

    #[test]
    fn time_stretch_for_rates() {
        assert_eq!(calculate_time_stretch(fp("0.05")).unwrap(), fp("0.044463125629060298"));
        assert_eq!(calculate_time_stretch(fp("0.1")).unwrap(), fp("0.088926251258120596"));
        assert!(matches!(
            calculate_time_stretch(FixedPoint::ZERO),
            Err(MathError::DivisionByZero)
        ));
    }

    // ------------------------- exposure helpers -------------------------

    #[test]
    fn exposure_parts() {
        let five = I256::from_raw(fp("5").raw());
        assert_eq!(State::positive_part(five), fp("5"));
        assert_eq!(State::negative_part(five), FixedPoint::ZERO);
        assert_eq!(State::positive_part(-five), FixedPoint::ZERO);
        assert_eq!(State::negative_part(-five), fp("5"));
    }

    // ------------------------- properties -------------------------

    #[test]
    fn spot_price_is_scale_invariant() {
        let mut scaled = test_state();
        scaled.info.share_reserves = fp("10000000");
        scaled.info.bond_reserves = fp("20000000");
        assert_eq!(
            scaled.calculate_spot_price().unwrap(),
            test_state().calculate_spot_price().unwrap()
        );
    }

    proptest! {
        #[test]
        fn spot_price_scale_invariance_holds_for_powers_of_ten(exp in 0u32..12) {
            let factor = FixedPoint::from_int(10u64.pow(exp));
            let mut scaled = test_state();
            scaled.info.share_reserves = scaled.info.share_reserves.mul_down(factor).unwrap();
            scaled.info.bond_reserves = scaled.info.bond_reserves.mul_down(factor).unwrap();
            prop_assert_eq!(
                scaled.calculate_spot_price().unwrap(),
                test_state().calculate_spot_price().unwrap()
            );
        }
    }
}
