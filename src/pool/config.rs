use alloy_primitives::{Address, I256};
use serde::{Deserialize, Serialize};

use crate::error::ConversionError;
use crate::fixed_point::FixedPoint;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Fees {
    pub curve: FixedPoint,
    pub flat: FixedPoint,
    pub governance: FixedPoint,
}

/// Immutable pool parameters fixed at deployment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolConfig {
    pub base_token: Address,
    pub initial_share_price: FixedPoint,
    pub minimum_share_reserves: FixedPoint,
    /// Seconds from open to maturity.
    pub position_duration: u64,
    /// Seconds between checkpoints.
    pub checkpoint_duration: u64,
    pub time_stretch: FixedPoint,
    pub governance: Address,
    pub fee_collector: Address,
    pub fees: Fees,
    pub oracle_size: u64,
    pub update_gap: u64,
}

/// Point-in-time snapshot of the pool's mutable state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolInfo {
    pub share_reserves: FixedPoint,
    pub bond_reserves: FixedPoint,
    pub lp_total_supply: FixedPoint,
    pub share_price: FixedPoint,
    pub longs_outstanding: FixedPoint,
    pub long_average_maturity_time: FixedPoint,
    pub shorts_outstanding: FixedPoint,
    pub short_average_maturity_time: FixedPoint,
    pub short_base_volume: FixedPoint,
    pub withdrawal_shares_ready_to_withdraw: FixedPoint,
    pub withdrawal_shares_proceeds: FixedPoint,
    pub lp_share_price: FixedPoint,
    pub long_exposure: FixedPoint,
    /// Signed difference between the share reserves and the effective share
    /// reserves the curve prices against.
    pub share_adjustment: I256,
}

// ---- raw wire form ----
//
// Every field is a string as produced by contract bindings: fixed-point
// values are scaled base-10 integers, durations are plain integers and
// addresses are hex.

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFees {
    pub curve: String,
    pub flat: String,
    pub governance: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPoolConfig {
    pub base_token: String,
    pub initial_share_price: String,
    pub minimum_share_reserves: String,
    pub position_duration: String,
    pub checkpoint_duration: String,
    pub time_stretch: String,
    pub governance: String,
    pub fee_collector: String,
    pub fees: RawFees,
    pub oracle_size: String,
    pub update_gap: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPoolInfo {
    pub share_reserves: String,
    pub bond_reserves: String,
    pub lp_total_supply: String,
    pub share_price: String,
    pub longs_outstanding: String,
    pub long_average_maturity_time: String,
    pub shorts_outstanding: String,
    pub short_average_maturity_time: String,
    pub short_base_volume: String,
    pub withdrawal_shares_ready_to_withdraw: String,
    pub withdrawal_shares_proceeds: String,
    pub lp_share_price: String,
    pub long_exposure: String,
    /// Omitted by older pools; an empty value reads as zero.
    #[serde(default)]
    pub share_adjustment: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawState {
    pub config: RawPoolConfig,
    pub info: RawPoolInfo,
}

fn invalid(field: &'static str, value: &str) -> ConversionError {
    ConversionError::InvalidField {
        field,
        value: value.to_owned(),
    }
}

fn scaled(field: &'static str, value: &str) -> Result<FixedPoint, ConversionError> {
    FixedPoint::from_scaled_str(value).map_err(|_| invalid(field, value))
}

fn seconds(field: &'static str, value: &str) -> Result<u64, ConversionError> {
    value.parse::<u64>().map_err(|_| invalid(field, value))
}

fn address(field: &'static str, value: &str) -> Result<Address, ConversionError> {
    value.parse::<Address>().map_err(|_| invalid(field, value))
}

fn signed(field: &'static str, value: &str) -> Result<I256, ConversionError> {
    if value.is_empty() {
        return Ok(I256::ZERO);
    }
    I256::from_dec_str(value).map_err(|_| invalid(field, value))
}

impl TryFrom<&RawFees> for Fees {
    type Error = ConversionError;

    fn try_from(raw: &RawFees) -> Result<Self, Self::Error> {
        Ok(Self {
            curve: scaled("fees.curve", &raw.curve)?,
            flat: scaled("fees.flat", &raw.flat)?,
            governance: scaled("fees.governance", &raw.governance)?,
        })
    }
}

impl TryFrom<&RawPoolConfig> for PoolConfig {
    type Error = ConversionError;

    fn try_from(raw: &RawPoolConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            base_token: address("base_token", &raw.base_token)?,
            initial_share_price: scaled("initial_share_price", &raw.initial_share_price)?,
            minimum_share_reserves: scaled("minimum_share_reserves", &raw.minimum_share_reserves)?,
            position_duration: seconds("position_duration", &raw.position_duration)?,
            checkpoint_duration: seconds("checkpoint_duration", &raw.checkpoint_duration)?,
            time_stretch: scaled("time_stretch", &raw.time_stretch)?,
            governance: address("governance", &raw.governance)?,
            fee_collector: address("fee_collector", &raw.fee_collector)?,
            fees: Fees::try_from(&raw.fees)?,
            oracle_size: seconds("oracle_size", &raw.oracle_size)?,
            update_gap: seconds("update_gap", &raw.update_gap)?,
        })
    }
}

impl TryFrom<&RawPoolInfo> for PoolInfo {
    type Error = ConversionError;

    fn try_from(raw: &RawPoolInfo) -> Result<Self, Self::Error> {
        Ok(Self {
            share_reserves: scaled("share_reserves", &raw.share_reserves)?,
            bond_reserves: scaled("bond_reserves", &raw.bond_reserves)?,
            lp_total_supply: scaled("lp_total_supply", &raw.lp_total_supply)?,
            share_price: scaled("share_price", &raw.share_price)?,
            longs_outstanding: scaled("longs_outstanding", &raw.longs_outstanding)?,
            long_average_maturity_time: scaled(
                "long_average_maturity_time",
                &raw.long_average_maturity_time,
            )?,
            shorts_outstanding: scaled("shorts_outstanding", &raw.shorts_outstanding)?,
            short_average_maturity_time: scaled(
                "short_average_maturity_time",
                &raw.short_average_maturity_time,
            )?,
            short_base_volume: scaled("short_base_volume", &raw.short_base_volume)?,
            withdrawal_shares_ready_to_withdraw: scaled(
                "withdrawal_shares_ready_to_withdraw",
                &raw.withdrawal_shares_ready_to_withdraw,
            )?,
            withdrawal_shares_proceeds: scaled(
                "withdrawal_shares_proceeds",
                &raw.withdrawal_shares_proceeds,
            )?,
            lp_share_price: scaled("lp_share_price", &raw.lp_share_price)?,
            long_exposure: scaled("long_exposure", &raw.long_exposure)?,
            share_adjustment: signed("share_adjustment", &raw.share_adjustment)?,
        })
    }
}
