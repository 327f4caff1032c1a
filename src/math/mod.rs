pub mod bit_math;
pub mod log_exp;
pub mod math_helpers;
pub mod yield_space;
