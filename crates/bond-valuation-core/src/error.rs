use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single input field was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationCode {
    NotPositive,
    OutOfRange,
    MissingValue,
    UnsupportedValue,
    LengthMismatch { expected: usize, received: usize },
    UnknownGraceType { index: usize, value: String },
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationCode::NotPositive => f.write_str("not_positive"),
            ViolationCode::OutOfRange => f.write_str("out_of_range"),
            ViolationCode::MissingValue => f.write_str("missing_value"),
            ViolationCode::UnsupportedValue => f.write_str("unsupported_value"),
            ViolationCode::LengthMismatch { .. } => f.write_str("length_mismatch"),
            ViolationCode::UnknownGraceType { .. } => f.write_str("unknown_grace_type"),
        }
    }
}

/// A field-addressable input violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub code: ViolationCode,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.field, self.code, self.message)
    }
}

/// Every violation found in one pass over the input, in check order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub(crate) fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// An invariant broke while deriving parameters or generating periods.
/// Always fatal for the invocation.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum CalculationError {
    #[error("Non-integral period count: {periods_per_year} periods/year over the term gives {total_periods} periods")]
    NonIntegralPeriods {
        periods_per_year: Decimal,
        total_periods: Decimal,
    },

    #[error("Arithmetic overflow computing {stage}{}", fmt_period(.period))]
    Overflow { stage: String, period: Option<u32> },

    #[error("Division by zero in {context}{}", fmt_period(.period))]
    DivisionByZero { context: String, period: Option<u32> },

    #[error("Outstanding capital became negative at period {period}: {value}")]
    NegativeCapital { period: u32, value: Decimal },

    #[error("No annual series entry for period {period} (year index {year_index})")]
    MissingYear { period: u32, year_index: usize },

    #[error("Schedule has no {0}")]
    EmptySchedule(String),

    #[error("Date for period {period} is out of the representable range")]
    DateOutOfRange { period: u32 },

    #[error("Invalid arithmetic context: {field}: {reason}")]
    InvalidContext { field: String, reason: String },
}

fn fmt_period(period: &Option<u32>) -> String {
    match period {
        Some(p) => format!(" at period {p}"),
        None => String::new(),
    }
}

impl CalculationError {
    pub(crate) fn overflow(stage: &str, period: Option<u32>) -> Self {
        CalculationError::Overflow {
            stage: stage.into(),
            period,
        }
    }

    pub(crate) fn division_by_zero(context: &str, period: Option<u32>) -> Self {
        CalculationError::DivisionByZero {
            context: context.into(),
            period,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BondValuationError {
    #[error("Invalid bond terms ({count} violation(s)): {0}", count = .0.len())]
    Validation(ValidationErrors),

    #[error("Calculation failed: {0}")]
    Calculation(#[from] CalculationError),
}

impl From<ValidationErrors> for BondValuationError {
    fn from(errors: ValidationErrors) -> Self {
        BondValuationError::Validation(errors)
    }
}

impl BondValuationError {
    pub fn is_validation(&self) -> bool {
        matches!(self, BondValuationError::Validation(_))
    }

    /// The violation list, when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            BondValuationError::Validation(errors) => Some(errors),
            BondValuationError::Calculation(_) => None,
        }
    }
}
