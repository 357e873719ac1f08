//! Period-level constants derived from validated terms.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bond::terms::{day_fraction, RateType, ValidatedBondTerms};
use crate::context::ArithmeticContext;
use crate::error::CalculationError;
use crate::time_value::{effective_annual_rate, periodic_rate};
use crate::types::{Money, Rate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedParameters {
    pub coupon_days: u32,
    /// Present only when the contract rate is nominal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capitalization_days: Option<u32>,
    pub day_count_base: u32,
    /// `coupon_days / day_count_base`
    pub coupon_year_fraction: Decimal,
    pub periods_per_year: Decimal,
    pub total_periods: u32,
    pub effective_annual_rate: Rate,
    pub periodic_coupon_rate: Rate,
    pub periodic_discount_rate: Rate,
    pub issuer_upfront_cost: Money,
    pub investor_upfront_cost: Money,
    /// Price plus the investor's share of issuance costs, paid at issue
    pub investor_outlay: Money,
}

/// Derive every period constant. Fails when the coupon cadence does not
/// divide the term into a whole number of periods.
pub fn derive_parameters(
    validated: &ValidatedBondTerms,
    ctx: &ArithmeticContext,
) -> Result<DerivedParameters, CalculationError> {
    let terms = validated.terms();
    let base = validated.day_count_base();
    let base_days = Decimal::from(base.days());
    let coupon_days = terms.coupon_frequency.days();

    let periods_per_year = base_days / Decimal::from(coupon_days);
    let total = periods_per_year * Decimal::from(terms.term_years);
    if !total.fract().is_zero() {
        return Err(CalculationError::NonIntegralPeriods {
            periods_per_year: ctx.round(periods_per_year),
            total_periods: ctx.round(total),
        });
    }
    let total_periods = total
        .to_u32()
        .ok_or_else(|| CalculationError::overflow("total periods", None))?;

    let capitalization_days = terms.capitalization.map(|c| c.days());
    let effective = match (terms.rate_type, capitalization_days) {
        (RateType::Effective, _) => terms.annual_rate,
        (RateType::Nominal, Some(cap_days)) => {
            let compounding_periods = base_days / Decimal::from(cap_days);
            effective_annual_rate(terms.annual_rate, compounding_periods, ctx)?
        }
        (RateType::Nominal, None) => {
            return Err(CalculationError::InvalidContext {
                field: "capitalization".into(),
                reason: "nominal rate without a capitalization cadence".into(),
            })
        }
    };

    let coupon_year_fraction = day_fraction(coupon_days, base);
    let periodic_coupon_rate = periodic_rate(effective, coupon_year_fraction, ctx)?;
    let periodic_discount_rate = periodic_rate(terms.discount_rate, coupon_year_fraction, ctx)?;

    let issuer_upfront_cost = ctx.mul(
        terms.commercial_price,
        terms.issuer_cost_pct(),
        "issuer upfront cost",
        None,
    )?;
    let investor_upfront_cost = ctx.mul(
        terms.commercial_price,
        terms.investor_cost_pct(),
        "investor upfront cost",
        None,
    )?;
    let investor_outlay = ctx.add(
        terms.commercial_price,
        investor_upfront_cost,
        "investor outlay",
        None,
    )?;

    Ok(DerivedParameters {
        coupon_days,
        capitalization_days,
        day_count_base: base.days(),
        coupon_year_fraction: ctx.round(coupon_year_fraction),
        periods_per_year: ctx.round(periods_per_year),
        total_periods,
        effective_annual_rate: effective,
        periodic_coupon_rate,
        periodic_discount_rate,
        issuer_upfront_cost,
        investor_upfront_cost,
        investor_outlay,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bond::terms::{
        BondTerms, CapitalizationFrequency, CouponFrequency, DayCountBase, GracePeriod,
        IssuanceCosts, ValidatedBondTerms,
    };
    use crate::bond::validation::validate_terms;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn terms(freq: CouponFrequency, base: u32, years: u32) -> BondTerms {
        BondTerms {
            nominal_value: dec!(1000),
            commercial_price: dec!(1050),
            term_years: years,
            coupon_frequency: freq,
            day_count_base: base,
            rate_type: RateType::Effective,
            capitalization: None,
            annual_rate: dec!(0.08),
            discount_rate: dec!(0.045),
            income_tax_rate: dec!(0.30),
            premium_pct: dec!(0.01),
            issuance_costs: IssuanceCosts {
                structuring: dec!(0.01),
                placement: dec!(0.0025),
                flotation: dec!(0.0045),
                settlement: dec!(0.005),
            },
            issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            inflation_series: vec![dec!(0.10); years as usize],
            grace_series: vec!["Normal".into(); years as usize],
        }
    }

    fn derive(t: &BondTerms) -> Result<DerivedParameters, CalculationError> {
        let validated = validate_terms(t).unwrap();
        derive_parameters(&validated, &ArithmeticContext::default())
    }

    #[test]
    fn test_semiannual_reference_parameters() {
        let p = derive(&terms(CouponFrequency::Semiannual, 360, 5)).unwrap();
        assert_eq!(p.coupon_days, 180);
        assert_eq!(p.periods_per_year, dec!(2));
        assert_eq!(p.total_periods, 10);
        assert_eq!(p.effective_annual_rate, dec!(0.08));
        assert!((p.periodic_coupon_rate - dec!(0.03923048)).abs() < dec!(0.00000001));
        assert!((p.periodic_discount_rate - dec!(0.02225242)).abs() < dec!(0.00000001));
        assert_eq!(p.issuer_upfront_cost, dec!(23.1));
        assert_eq!(p.investor_upfront_cost, dec!(9.975));
        assert_eq!(p.investor_outlay, dec!(1059.975));
    }

    #[test]
    fn test_monthly_period_count() {
        let p = derive(&terms(CouponFrequency::Monthly, 360, 3)).unwrap();
        assert_eq!(p.periods_per_year, dec!(12));
        assert_eq!(p.total_periods, 36);
    }

    #[test]
    fn test_365_base_is_non_integral() {
        let err = derive(&terms(CouponFrequency::Semiannual, 365, 5)).unwrap_err();
        assert!(
            matches!(err, CalculationError::NonIntegralPeriods { .. }),
            "Expected NonIntegralPeriods, got {err:?}"
        );
    }

    #[test]
    fn test_nominal_rate_converted_to_effective() {
        let mut t = terms(CouponFrequency::Semiannual, 360, 5);
        t.rate_type = RateType::Nominal;
        t.capitalization = Some(CapitalizationFrequency::Monthly);
        t.annual_rate = dec!(0.12);
        let p = derive(&t).unwrap();
        assert_eq!(p.capitalization_days, Some(30));
        // (1 + 0.12/12)^12 - 1
        assert!((p.effective_annual_rate - dec!(0.12682503)).abs() < dec!(0.00000001));
        // Semiannual equivalent: 1.01^6 - 1
        assert!((p.periodic_coupon_rate - dec!(0.06152015)).abs() < dec!(0.00000001));
    }

    #[test]
    fn test_annual_coupon_periodic_rate_equals_annual() {
        let p = derive(&terms(CouponFrequency::Annual, 360, 4)).unwrap();
        assert_eq!(p.total_periods, 4);
        assert!((p.periodic_coupon_rate - dec!(0.08)).abs() < dec!(0.0000000001));
        assert!((p.periodic_discount_rate - dec!(0.045)).abs() < dec!(0.0000000001));
    }

    #[test]
    fn test_period_count_beyond_u32_is_overflow() {
        let mut t = terms(CouponFrequency::Monthly, 360, 1);
        t.term_years = u32::MAX;
        let validated = ValidatedBondTerms::new(t, DayCountBase::Days360, vec![GracePeriod::Normal]);
        let err = derive_parameters(&validated, &ArithmeticContext::default()).unwrap_err();
        assert_eq!(
            err,
            CalculationError::Overflow {
                stage: "total periods".into(),
                period: None
            }
        );
    }
}
