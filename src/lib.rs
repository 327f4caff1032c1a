//! Hyperdrive pool math in pure Rust.
//!
//! This crate exposes:
//! - A checked 18-decimal [`FixedPoint`] type whose `pow`, `ln` and `exp`
//!   agree with the on-chain Solidity library to the last unit.
//! - YieldSpace curve primitives (`math::yield_space`).
//! - A pool [`State`] that prices opens and closes, and solves for the
//!   largest long or short a budget can buy.
//! - Targeted longs that move the spot rate to a given rate, and the present
//!   value of the LPs' capital.
//! - A decimal-string [`api`] for glue code that passes values as text.
//! - Optional `onchain` helpers to read a pool snapshot over JSON-RPC.
//!
//! # Examples
//!
//! ## Pricing a pool snapshot
//! ```no_run
//! use hyperdrive_math::{FixedPoint, PoolConfig, PoolInfo, State, YieldSpace, I256};
//!
//! let fp = |s: &str| s.parse::<FixedPoint>().unwrap();
//! let state = State::new(
//!     PoolConfig {
//!         initial_share_price: fp("1"),
//!         minimum_share_reserves: fp("0.1"),
//!         position_duration: 604_800,
//!         checkpoint_duration: 86_400,
//!         time_stretch: fp("0.1"),
//!         ..Default::default()
//!     },
//!     PoolInfo {
//!         share_reserves: fp("1000000"),
//!         bond_reserves: fp("2000000"),
//!         share_price: fp("1"),
//!         ..Default::default()
//!     },
//! );
//!
//! let spot_price = state.calculate_spot_price().unwrap();
//! let max_long = state
//!     .calculate_max_long(fp("10000"), I256::ZERO, hyperdrive_math::DEFAULT_MAX_ITERATIONS)
//!     .unwrap();
//! println!("spot price: {spot_price}, max long: {max_long}");
//! ```
//!
//! ## String API
//! ```no_run
//! use hyperdrive_math::{api, State};
//!
//! # let state = State::default();
//! let max_short = api::get_max_short(&state, "10000", "1.0", 20).unwrap();
//! println!("max short: {max_short}");
//! ```

pub use alloy_primitives::{Address, I256, U256};

pub mod api;
pub mod error;
pub mod fixed_point;
pub mod math;
#[cfg(feature = "onchain")]
pub mod onchain;
pub mod pool;

pub use error::Error;
pub use fixed_point::FixedPoint;
pub use math::yield_space::YieldSpace;
pub use pool::{calculate_time_stretch, Fees, PoolConfig, PoolInfo, RawState, State};

#[cfg(feature = "onchain")]
pub use onchain::HyperdriveReader;

/// Newton iterations the solvers run when the caller has no preference.
pub const DEFAULT_MAX_ITERATIONS: usize = 7;
