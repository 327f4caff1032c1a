use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("Math error - overflow")]
    Overflow,
    #[error("Math error - underflow")]
    Underflow,
    #[error("Math error - division by zero")]
    DivisionByZero,
    #[error("Math error - exponent too large for exp")]
    InvalidExponent,
    #[error("Math error - logarithm of a non-positive value")]
    NonPositiveLogarithm,
    #[error("BitMath error - zero input value")]
    ZeroValue,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Conversion error - empty literal")]
    Empty,
    #[error("Conversion error - invalid character {0:?}")]
    InvalidCharacter(char),
    #[error("Conversion error - more than one decimal point")]
    MultipleDecimalPoints,
    #[error("Conversion error - value does not fit in 256 bits")]
    Overflow,
    #[error("Conversion error - invalid value {value:?} for field `{field}`")]
    InvalidField { field: &'static str, value: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolvencyError {
    #[error("Solvency error - trade would result in negative interest")]
    NegativeInterest,
    #[error("Solvency error - initial guess is insolvent")]
    InsolventGuess,
    #[error("Solvency error - reached the absolute max long")]
    AbsoluteMaxLongReached,
    #[error("Solvency error - max short exceeded budget")]
    MaxShortExceededBudget,
    #[error("Solvency error - absolute max short exceeded")]
    AbsoluteMaxShortExceeded,
    #[error("Solvency error - negative present value")]
    NegativePresentValue,
    #[error("Solvency error - target rate is above the spot rate")]
    TargetRateAboveSpotRate,
    #[error("Solvency error - targeted long overshot the target rate")]
    TargetRateOvershot,
    #[error("Solvency error - targeted long did not reach the target rate")]
    TargetRateNotReached,
}

#[cfg(feature = "onchain")]
#[derive(Debug, Error)]
pub enum OnchainError {
    #[error("Onchain error - failed to get pool config: {0}")]
    FailedToGetPoolConfig(String),
    #[error("Onchain error - failed to get pool info: {0}")]
    FailedToGetPoolInfo(String),
    #[error("Onchain error - failed to get checkpoint: {0}")]
    FailedToGetCheckpoint(String),
    #[error("Onchain error - value out of range for field `{0}`")]
    ValueOutOfRange(&'static str),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Math(#[from] crate::error::MathError),

    #[error(transparent)]
    Conversion(#[from] crate::error::ConversionError),

    #[error(transparent)]
    Solvency(#[from] crate::error::SolvencyError),

    #[cfg(feature = "onchain")]
    #[error(transparent)]
    Onchain(#[from] crate::error::OnchainError),
}
