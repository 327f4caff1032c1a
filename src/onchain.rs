//! Reads a pool snapshot from a Hyperdrive contract over JSON-RPC.

use std::sync::Arc;

use alloy_primitives::{Address, BlockNumber, I256, U256};
use alloy_provider::Provider;
use futures::try_join;

use crate::error::OnchainError;
use crate::fixed_point::FixedPoint;
use crate::pool::config::{Fees, PoolConfig, PoolInfo};
use crate::pool::state::State;

mod abi {
    use alloy_sol_macro::sol;

    sol! {
        struct Fees {
            uint256 curve;
            uint256 flat;
            uint256 governance;
        }

        struct PoolConfig {
            address baseToken;
            uint256 initialSharePrice;
            uint256 minimumShareReserves;
            uint256 positionDuration;
            uint256 checkpointDuration;
            uint256 timeStretch;
            address governance;
            address feeCollector;
            Fees fees;
            uint256 oracleSize;
            uint256 updateGap;
        }

        struct PoolInfo {
            uint256 shareReserves;
            int256 shareAdjustment;
            uint256 bondReserves;
            uint256 lpTotalSupply;
            uint256 sharePrice;
            uint256 longsOutstanding;
            uint256 longAverageMaturityTime;
            uint256 shortsOutstanding;
            uint256 shortAverageMaturityTime;
            uint256 shortBaseVolume;
            uint256 withdrawalSharesReadyToWithdraw;
            uint256 withdrawalSharesProceeds;
            uint256 lpSharePrice;
            uint256 longExposure;
        }

        struct Checkpoint {
            uint128 sharePrice;
            int128 exposure;
        }

        #[sol(rpc)]
        interface IHyperdrive {
            function getPoolConfig() external view returns (PoolConfig memory);
            function getPoolInfo() external view returns (PoolInfo memory);
            function getCheckpoint(uint256 checkpointId) external view returns (Checkpoint memory);
        }
    }
}

pub type OnchainProvider<P> = Arc<P>;

fn seconds(field: &'static str, value: U256) -> Result<u64, OnchainError> {
    u64::try_from(value).map_err(|_| OnchainError::ValueOutOfRange(field))
}

impl TryFrom<abi::PoolConfig> for PoolConfig {
    type Error = OnchainError;

    fn try_from(config: abi::PoolConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            base_token: config.baseToken,
            initial_share_price: config.initialSharePrice.into(),
            minimum_share_reserves: config.minimumShareReserves.into(),
            position_duration: seconds("position_duration", config.positionDuration)?,
            checkpoint_duration: seconds("checkpoint_duration", config.checkpointDuration)?,
            time_stretch: config.timeStretch.into(),
            governance: config.governance,
            fee_collector: config.feeCollector,
            fees: Fees {
                curve: config.fees.curve.into(),
                flat: config.fees.flat.into(),
                governance: config.fees.governance.into(),
            },
            oracle_size: seconds("oracle_size", config.oracleSize)?,
            update_gap: seconds("update_gap", config.updateGap)?,
        })
    }
}

impl From<abi::PoolInfo> for PoolInfo {
    fn from(info: abi::PoolInfo) -> Self {
        Self {
            share_reserves: info.shareReserves.into(),
            bond_reserves: info.bondReserves.into(),
            lp_total_supply: info.lpTotalSupply.into(),
            share_price: info.sharePrice.into(),
            longs_outstanding: info.longsOutstanding.into(),
            long_average_maturity_time: info.longAverageMaturityTime.into(),
            shorts_outstanding: info.shortsOutstanding.into(),
            short_average_maturity_time: info.shortAverageMaturityTime.into(),
            short_base_volume: info.shortBaseVolume.into(),
            withdrawal_shares_ready_to_withdraw: info.withdrawalSharesReadyToWithdraw.into(),
            withdrawal_shares_proceeds: info.withdrawalSharesProceeds.into(),
            lp_share_price: info.lpSharePrice.into(),
            long_exposure: info.longExposure.into(),
            share_adjustment: info.shareAdjustment,
        }
    }
}

/// Read-only handle on a deployed Hyperdrive pool.
#[derive(Clone, Debug)]
pub struct HyperdriveReader<P> {
    pub address: Address,
    contract: abi::IHyperdrive::IHyperdriveInstance<OnchainProvider<P>>,
}

impl<P> HyperdriveReader<P>
where
    P: Provider + Send + Sync + 'static,
{
    pub fn new(address: Address, provider: OnchainProvider<P>) -> Self {
        Self {
            address,
            contract: abi::IHyperdrive::IHyperdriveInstance::new(address, provider),
        }
    }

    /// Reads the immutable pool configuration at the given optional block.
    pub async fn fetch_pool_config(
        &self,
        block_number: Option<BlockNumber>,
    ) -> Result<PoolConfig, OnchainError> {
        let mut call = self.contract.getPoolConfig();

        if let Some(bn) = block_number {
            call = call.block(bn.into());
        }

        let config = call
            .call()
            .await
            .map_err(|e| OnchainError::FailedToGetPoolConfig(e.to_string()))?;

        PoolConfig::try_from(config)
    }

    /// Reads the current reserves and outstanding positions.
    pub async fn fetch_pool_info(
        &self,
        block_number: Option<BlockNumber>,
    ) -> Result<PoolInfo, OnchainError> {
        let mut call = self.contract.getPoolInfo();

        if let Some(bn) = block_number {
            call = call.block(bn.into());
        }

        let info = call
            .call()
            .await
            .map_err(|e| OnchainError::FailedToGetPoolInfo(e.to_string()))?;

        Ok(info.into())
    }

    async fn fetch_checkpoint(
        &self,
        checkpoint_id: u64,
        block_number: Option<BlockNumber>,
    ) -> Result<abi::Checkpoint, OnchainError> {
        let mut call = self.contract.getCheckpoint(U256::from(checkpoint_id));

        if let Some(bn) = block_number {
            call = call.block(bn.into());
        }

        call.call()
            .await
            .map_err(|e| OnchainError::FailedToGetCheckpoint(e.to_string()))
    }

    /// Share price recorded when `checkpoint_id` was minted, or zero if it
    /// hasn't been. This is the open share price for shorts in that
    /// checkpoint.
    pub async fn fetch_checkpoint_share_price(
        &self,
        checkpoint_id: u64,
        block_number: Option<BlockNumber>,
    ) -> Result<FixedPoint, OnchainError> {
        let checkpoint = self.fetch_checkpoint(checkpoint_id, block_number).await?;
        Ok(FixedPoint::from_scaled(checkpoint.sharePrice))
    }

    /// Net exposure of the positions opened in `checkpoint_id`.
    pub async fn fetch_checkpoint_exposure(
        &self,
        checkpoint_id: u64,
        block_number: Option<BlockNumber>,
    ) -> Result<I256, OnchainError> {
        let checkpoint = self.fetch_checkpoint(checkpoint_id, block_number).await?;
        I256::try_from(checkpoint.exposure).map_err(|_| OnchainError::ValueOutOfRange("exposure"))
    }

    /// Reads config and info concurrently and combines them into a `State`.
    pub async fn fetch_state(&self, block_number: Option<BlockNumber>) -> Result<State, OnchainError> {
        let (config, info) = try_join!(
            self.fetch_pool_config(block_number),
            self.fetch_pool_info(block_number)
        )?;

        Ok(State::new(config, info))
    }
}
