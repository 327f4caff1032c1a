//! Decimal-string entry points.
//!
//! Inputs are decimal literals such as `"1.0"` or `"10000"`; outputs are the
//! canonical form produced by [`FixedPoint`]'s `Display`. Checkpoint exposure
//! is taken as zero and no conservative price is used.

use alloy_primitives::I256;

use crate::error::Error;
use crate::fixed_point::FixedPoint;
use crate::math::yield_space::YieldSpace;
use crate::pool::config::RawState;
use crate::pool::state::State;

/// Builds a [`State`] from the scaled-integer wire form.
pub fn state_from_raw(raw: &RawState) -> Result<State, Error> {
    Ok(State::try_from_raw(raw)?)
}

pub fn get_spot_price(state: &State) -> Result<String, Error> {
    Ok(state.calculate_spot_price()?.to_string())
}

pub fn get_spot_rate(state: &State) -> Result<String, Error> {
    Ok(state.calculate_spot_rate()?.to_string())
}

/// Bonds received for `base_amount` of base.
pub fn get_open_long(state: &State, base_amount: &str) -> Result<String, Error> {
    let base_amount: FixedPoint = base_amount.parse()?;
    Ok(state.calculate_open_long(base_amount)?.to_string())
}

/// Deposit required to short `bond_amount` bonds at the current spot price.
pub fn get_open_short(state: &State, bond_amount: &str, open_share_price: &str) -> Result<String, Error> {
    let bond_amount: FixedPoint = bond_amount.parse()?;
    let open_share_price: FixedPoint = open_share_price.parse()?;
    let spot_price = state.calculate_spot_price()?;
    Ok(state
        .calculate_open_short(bond_amount, spot_price, open_share_price)?
        .to_string())
}

/// Largest long, in base, affordable with `budget`.
pub fn get_max_long(state: &State, budget: &str, max_iterations: usize) -> Result<String, Error> {
    let budget: FixedPoint = budget.parse()?;
    Ok(state
        .calculate_max_long(budget, I256::ZERO, max_iterations)?
        .to_string())
}

/// Largest short, in bonds, whose deposit fits `budget`.
pub fn get_max_short(
    state: &State,
    budget: &str,
    open_share_price: &str,
    max_iterations: usize,
) -> Result<String, Error> {
    let budget: FixedPoint = budget.parse()?;
    let open_share_price: FixedPoint = open_share_price.parse()?;
    Ok(state
        .calculate_max_short(budget, open_share_price, I256::ZERO, None, max_iterations)?
        .to_string())
}

/// Base a long must pay to bring the spot rate down to `target_rate`,
/// capped at `budget`.
pub fn get_targeted_long(
    state: &State,
    budget: &str,
    target_rate: &str,
    max_iterations: usize,
) -> Result<String, Error> {
    let budget: FixedPoint = budget.parse()?;
    let target_rate: FixedPoint = target_rate.parse()?;
    Ok(state
        .calculate_targeted_long_with_budget(budget, target_rate, I256::ZERO, max_iterations, None)?
        .to_string())
}

/// Present value of the LPs' capital, in shares, at `current_time`.
pub fn get_present_value(state: &State, current_time: u64) -> Result<String, Error> {
    Ok(state.calculate_present_value(current_time)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConversionError, SolvencyError};
    use crate::pool::config::{RawFees, RawPoolConfig, RawPoolInfo};
    use crate::DEFAULT_MAX_ITERATIONS;

    const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

    fn raw_state() -> RawState {
        let scaled = |s: &str| s.parse::<FixedPoint>().unwrap().raw().to_string();
        RawState {
            config: RawPoolConfig {
                base_token: ZERO_ADDRESS.to_owned(),
                initial_share_price: scaled("1"),
                minimum_share_reserves: scaled("0.1"),
                position_duration: "604800".to_owned(),
                checkpoint_duration: "86400".to_owned(),
                time_stretch: scaled("0.1"),
                governance: ZERO_ADDRESS.to_owned(),
                fee_collector: ZERO_ADDRESS.to_owned(),
                fees: RawFees {
                    curve: "0".to_owned(),
                    flat: "0".to_owned(),
                    governance: "0".to_owned(),
                },
                oracle_size: "5".to_owned(),
                update_gap: "3600".to_owned(),
            },
            info: RawPoolInfo {
                share_reserves: scaled("1000000"),
                bond_reserves: scaled("2000000"),
                lp_total_supply: scaled("3000000"),
                share_price: scaled("1"),
                longs_outstanding: "0".to_owned(),
                long_average_maturity_time: "0".to_owned(),
                shorts_outstanding: "0".to_owned(),
                short_average_maturity_time: "0".to_owned(),
                short_base_volume: "0".to_owned(),
                withdrawal_shares_ready_to_withdraw: "0".to_owned(),
                withdrawal_shares_proceeds: "0".to_owned(),
                lp_share_price: scaled("1"),
                long_exposure: "0".to_owned(),
                share_adjustment: String::new(),
            },
        }
    }

    fn state() -> State {
        state_from_raw(&raw_state()).unwrap()
    }

    // ------------------------- pricing tests -------------------------

    #[test]
    fn spot_price_and_rate_strings() {
        let state = state();
        assert_eq!(get_spot_price(&state).unwrap(), "0.933032991536807415");
        assert_eq!(get_spot_rate(&state).unwrap(), "3.742473403678143959");
    }

    #[test]
    fn open_trade_strings() {
        let state = state();
        assert_eq!(get_open_long(&state, "1000").unwrap(), "1071.691174809631531568");
        assert_eq!(get_open_short(&state, "1000", "1.0").unwrap(), "67.033866198441883822");
    }

    // ------------------------- max long tests -------------------------

    #[test]
    fn max_long_small_budget_is_fully_absorbed() {
        assert_eq!(get_max_long(&state(), "1.0", 20).unwrap(), "1.0");
    }

    #[test]
    fn max_long_large_budget_is_capped() {
        assert_eq!(
            get_max_long(&state(), "1000000000000", DEFAULT_MAX_ITERATIONS).unwrap(),
            "491481.901272699541500859"
        );
    }

    #[test]
    fn max_long_rejects_bad_literal() {
        let res = get_max_long(&state(), "asdf", 20);
        assert!(matches!(
            res,
            Err(Error::Conversion(ConversionError::InvalidCharacter('a')))
        ));
    }

    // ------------------------- max short tests -------------------------

    #[test]
    fn max_short_is_solver_bound() {
        let max = get_max_short(&state(), "10000", "1.0", 20).unwrap();
        assert_eq!(max, "131809.691608404138043329");

        let deposit = get_open_short(&state(), &max, "1.0").unwrap();
        let deposit: FixedPoint = deposit.parse().unwrap();
        assert!(deposit <= "10000".parse::<FixedPoint>().unwrap());
    }

    #[test]
    fn max_short_default_iterations() {
        assert_eq!(
            get_max_short(&state(), "10000", "1.0", DEFAULT_MAX_ITERATIONS).unwrap(),
            "131809.691608404138043329"
        );
    }

    #[test]
    fn max_short_single_iteration_returns_affordable_candidate() {
        let max = get_max_short(&state(), "10000", "1.0", 1).unwrap();
        assert_eq!(max, "130230.507405197196942199");
        let deposit: FixedPoint = get_open_short(&state(), &max, "1.0").unwrap().parse().unwrap();
        assert!(deposit <= "10000".parse::<FixedPoint>().unwrap());
    }

    #[test]
    fn max_short_small_budget_covers_more_bonds_than_budget() {
        // without fees a bond never costs more than c / c0 = 1 to short
        let max = get_max_short(&state(), "100", "1.0", 20).unwrap();
        assert_eq!(max, "1491.052934636360993975");
    }

    #[test]
    fn max_short_fails_when_no_bond_fits() {
        let res = get_max_short(&state(), "0.000000000000000001", "0.5", 20);
        assert!(matches!(
            res,
            Err(Error::Solvency(SolvencyError::MaxShortExceededBudget))
        ));
        assert_eq!(res.unwrap_err().to_string(), "Solvency error - max short exceeded budget");
    }

    #[test]
    fn max_short_rejects_bad_open_share_price() {
        let res = get_max_short(&state(), "10000", "1.0.0", 20);
        assert!(matches!(
            res,
            Err(Error::Conversion(ConversionError::MultipleDecimalPoints))
        ));
    }

    // ------------------------- targeted long tests -------------------------

    #[test]
    fn targeted_long_strings() {
        let state = state();
        assert_eq!(
            get_targeted_long(&state, "1000000", "3", DEFAULT_MAX_ITERATIONS).unwrap(),
            "88968.907613612208814485"
        );
        assert_eq!(get_targeted_long(&state, "1000", "3", DEFAULT_MAX_ITERATIONS).unwrap(), "1000.0");
    }

    #[test]
    fn targeted_long_above_spot_rate_fails() {
        let res = get_targeted_long(&state(), "1000", "4", DEFAULT_MAX_ITERATIONS);
        assert!(matches!(
            res,
            Err(Error::Solvency(SolvencyError::TargetRateAboveSpotRate))
        ));
    }

    // ------------------------- lp tests -------------------------

    #[test]
    fn present_value_strings() {
        let mut raw = raw_state();
        raw.info.longs_outstanding = "50000000000000000000000".to_owned();
        raw.info.long_average_maturity_time = "691200000000000000000000".to_owned();
        raw.info.shorts_outstanding = "20000000000000000000000".to_owned();
        raw.info.short_average_maturity_time = "604800000000000000000000".to_owned();
        let positioned = state_from_raw(&raw).unwrap();
        assert_eq!(get_present_value(&positioned, 172_805).unwrap(), "971967.922737149989784203");
        assert_eq!(get_present_value(&state(), 172_805).unwrap(), "999999.9");
    }

    #[test]
    fn bad_raw_field_surfaces_as_conversion_error() {
        let mut raw = raw_state();
        raw.info.share_price = "one".to_owned();
        let res = state_from_raw(&raw);
        assert!(matches!(
            res,
            Err(Error::Conversion(ConversionError::InvalidField { field: "share_price", .. }))
        ));
    }
}
