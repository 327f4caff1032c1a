mod close;
pub mod config;
mod long;
mod lp;
mod short;
pub mod state;
mod targeted;

pub use config::{Fees, PoolConfig, PoolInfo, RawFees, RawPoolConfig, RawPoolInfo, RawState};
pub use short::MAX_SHORT_TOLERANCE;
pub use state::{calculate_time_stretch, State};
pub use targeted::TARGETED_LONG_TOLERANCE;
