//! Explicit arithmetic context threaded through every calculation.
//!
//! Nothing here is global: two valuations running on different threads can use
//! different scales or rounding modes without interfering.

use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::CalculationError;
use crate::types::Rate;

const MIN_SCALE: u32 = 10;
const MAX_SCALE: u32 = 28;

/// Rounding applied whenever a value is brought back to the context scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Banker's rounding
    #[default]
    HalfEven,
    HalfUp,
    /// Truncate toward zero
    Down,
}

impl RoundingMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::Down => RoundingStrategy::ToZero,
        }
    }
}

/// Newton–Raphson settings for the internal-yield solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub initial_guess: Rate,
    pub tolerance: Decimal,
    pub max_iterations: u32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            initial_guess: dec!(0.10),
            tolerance: dec!(0.00000001),
            max_iterations: 100,
        }
    }
}

/// Precision, rounding and solver configuration for one valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArithmeticContext {
    /// Decimal places kept on derived rates and per-period amounts
    pub scale: u32,
    pub rounding: RoundingMode,
    pub solver: SolverSettings,
}

impl Default for ArithmeticContext {
    fn default() -> Self {
        Self {
            scale: 16,
            rounding: RoundingMode::default(),
            solver: SolverSettings::default(),
        }
    }
}

impl ArithmeticContext {
    pub fn validate(&self) -> Result<(), CalculationError> {
        if !(MIN_SCALE..=MAX_SCALE).contains(&self.scale) {
            return Err(CalculationError::InvalidContext {
                field: "scale".into(),
                reason: format!("must be between {MIN_SCALE} and {MAX_SCALE}"),
            });
        }
        if self.solver.tolerance <= Decimal::ZERO {
            return Err(CalculationError::InvalidContext {
                field: "solver.tolerance".into(),
                reason: "must be positive".into(),
            });
        }
        if self.solver.max_iterations == 0 {
            return Err(CalculationError::InvalidContext {
                field: "solver.max_iterations".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.solver.initial_guess <= dec!(-1) {
            return Err(CalculationError::InvalidContext {
                field: "solver.initial_guess".into(),
                reason: "must be greater than -100%".into(),
            });
        }
        Ok(())
    }

    /// Round to the context scale.
    pub fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.scale, self.rounding.strategy())
    }

    /// `base^exponent` for a fractional exponent, rounded to scale.
    pub fn pow(
        &self,
        base: Decimal,
        exponent: Decimal,
        stage: &str,
        period: Option<u32>,
    ) -> Result<Decimal, CalculationError> {
        base.checked_powd(exponent)
            .map(|v| self.round(v))
            .ok_or_else(|| CalculationError::overflow(stage, period))
    }

    /// `base^exponent` for a whole exponent, rounded to scale.
    pub fn powi(
        &self,
        base: Decimal,
        exponent: u32,
        stage: &str,
        period: Option<u32>,
    ) -> Result<Decimal, CalculationError> {
        base.checked_powi(i64::from(exponent))
            .map(|v| self.round(v))
            .ok_or_else(|| CalculationError::overflow(stage, period))
    }

    /// Compound conversion of a rate over `exponent` periods: `(1+rate)^exponent - 1`.
    pub fn compound(
        &self,
        rate: Rate,
        exponent: Decimal,
        stage: &str,
        period: Option<u32>,
    ) -> Result<Rate, CalculationError> {
        Ok(self.pow(Decimal::ONE + rate, exponent, stage, period)? - Decimal::ONE)
    }

    pub fn add(
        &self,
        a: Decimal,
        b: Decimal,
        stage: &str,
        period: Option<u32>,
    ) -> Result<Decimal, CalculationError> {
        a.checked_add(b)
            .ok_or_else(|| CalculationError::overflow(stage, period))
    }

    pub fn sub(
        &self,
        a: Decimal,
        b: Decimal,
        stage: &str,
        period: Option<u32>,
    ) -> Result<Decimal, CalculationError> {
        a.checked_sub(b)
            .ok_or_else(|| CalculationError::overflow(stage, period))
    }

    /// Checked running total; `Iterator::sum` would panic on overflow.
    pub fn sum(
        &self,
        values: impl IntoIterator<Item = Decimal>,
        stage: &str,
    ) -> Result<Decimal, CalculationError> {
        values
            .into_iter()
            .try_fold(Decimal::ZERO, |acc, v| self.add(acc, v, stage, None))
    }

    pub fn mul(
        &self,
        a: Decimal,
        b: Decimal,
        stage: &str,
        period: Option<u32>,
    ) -> Result<Decimal, CalculationError> {
        a.checked_mul(b)
            .map(|v| self.round(v))
            .ok_or_else(|| CalculationError::overflow(stage, period))
    }

    pub fn div(
        &self,
        numerator: Decimal,
        denominator: Decimal,
        context: &str,
        period: Option<u32>,
    ) -> Result<Decimal, CalculationError> {
        if denominator.is_zero() {
            return Err(CalculationError::division_by_zero(context, period));
        }
        numerator
            .checked_div(denominator)
            .map(|v| self.round(v))
            .ok_or_else(|| CalculationError::overflow(context, period))
    }

    /// Short label for the output envelope.
    pub fn describe(&self) -> String {
        format!("rust_decimal_128bit/scale={}/{:?}", self.scale, self.rounding)
    }
}
