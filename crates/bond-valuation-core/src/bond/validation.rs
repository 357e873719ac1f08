//! Input normalizer: runs every structural and economic check over raw
//! [`BondTerms`] and reports all violations together.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::bond::terms::{BondTerms, DayCountBase, GracePeriod, RateType, ValidatedBondTerms};
use crate::error::{ValidationError, ValidationErrors, ViolationCode};
use crate::types::Rate;

/// Validate raw terms. Either every check passes and typed terms come back,
/// or the complete list of violations does.
pub fn validate_terms(terms: &BondTerms) -> Result<ValidatedBondTerms, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    check_positive(&mut errors, "nominal_value", terms.nominal_value);
    check_positive(&mut errors, "commercial_price", terms.commercial_price);
    if terms.term_years == 0 {
        errors.push(ValidationError::new(
            "term_years",
            ViolationCode::NotPositive,
            "Term must be at least one year",
        ));
    }

    let day_count_base = match DayCountBase::try_from(terms.day_count_base) {
        Ok(base) => Some(base),
        Err(reason) => {
            errors.push(ValidationError::new(
                "day_count_base",
                ViolationCode::UnsupportedValue,
                reason,
            ));
            None
        }
    };

    if terms.rate_type == RateType::Nominal && terms.capitalization.is_none() {
        errors.push(ValidationError::new(
            "capitalization",
            ViolationCode::MissingValue,
            "A capitalization cadence is required for a nominal rate",
        ));
    }

    check_unit_interval(&mut errors, "annual_rate", terms.annual_rate);
    check_unit_interval(&mut errors, "discount_rate", terms.discount_rate);
    check_unit_interval(&mut errors, "income_tax_rate", terms.income_tax_rate);
    check_unit_interval(&mut errors, "premium_pct", terms.premium_pct);
    let costs = &terms.issuance_costs;
    check_unit_interval(&mut errors, "issuance_costs.structuring", costs.structuring);
    check_unit_interval(&mut errors, "issuance_costs.placement", costs.placement);
    check_unit_interval(&mut errors, "issuance_costs.flotation", costs.flotation);
    check_unit_interval(&mut errors, "issuance_costs.settlement", costs.settlement);

    let expected = terms.term_years as usize;
    check_series_length(&mut errors, "inflation_series", expected, terms.inflation_series.len());
    for (i, rate) in terms.inflation_series.iter().enumerate() {
        if *rate <= dec!(-1) || *rate > Decimal::ONE {
            errors.push(ValidationError::new(
                format!("inflation_series[{i}]"),
                ViolationCode::OutOfRange,
                format!("Annual inflation must lie in (-1, 1], got {rate}"),
            ));
        }
    }

    check_series_length(&mut errors, "grace_series", expected, terms.grace_series.len());
    let mut grace_schedule = Vec::with_capacity(terms.grace_series.len());
    for (i, raw) in terms.grace_series.iter().enumerate() {
        match raw.parse::<GracePeriod>() {
            Ok(g) => grace_schedule.push(g),
            Err(_) => errors.push(ValidationError::new(
                format!("grace_series[{i}]"),
                ViolationCode::UnknownGraceType {
                    index: i,
                    value: raw.clone(),
                },
                format!("Grace period must be Normal, Partial or Total, got '{raw}'"),
            )),
        }
    }

    match day_count_base {
        Some(base) if errors.is_empty() => {
            Ok(ValidatedBondTerms::new(terms.clone(), base, grace_schedule))
        }
        _ => Err(errors),
    }
}

fn check_positive(errors: &mut ValidationErrors, field: &str, value: Decimal) {
    if value <= Decimal::ZERO {
        errors.push(ValidationError::new(
            field,
            ViolationCode::NotPositive,
            format!("Must be positive, got {value}"),
        ));
    }
}

fn check_unit_interval(errors: &mut ValidationErrors, field: &str, value: Rate) {
    if value < Decimal::ZERO || value > Decimal::ONE {
        errors.push(ValidationError::new(
            field,
            ViolationCode::OutOfRange,
            format!("Must lie in [0, 1], got {value}"),
        ));
    }
}

fn check_series_length(errors: &mut ValidationErrors, field: &str, expected: usize, received: usize) {
    if expected != received {
        errors.push(ValidationError::new(
            field,
            ViolationCode::LengthMismatch { expected, received },
            format!("Expected {expected} annual entries (one per year of term), received {received}"),
        ));
    }
}
