pub mod bond;
pub mod context;
pub mod error;
pub mod time_value;
pub mod types;

pub use context::{ArithmeticContext, RoundingMode, SolverSettings};
pub use error::{BondValuationError, CalculationError, ValidationError, ValidationErrors, ViolationCode};
pub use types::*;

/// Standard result type for all bond valuation operations
pub type BondResult<T> = Result<T, BondValuationError>;
