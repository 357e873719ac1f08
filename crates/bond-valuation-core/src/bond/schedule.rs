//! Period-by-period cash-flow generator.
//!
//! Periods are produced by [`CashFlowPeriods`], an iterator that carries only
//! the previous period's indexed capital, coupon, amortization and grace state
//! forward. Period 0 is the disbursement; periods 1..=N follow the grace-period
//! state machine.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bond::parameters::DerivedParameters;
use crate::bond::terms::{GracePeriod, ValidatedBondTerms};
use crate::context::ArithmeticContext;
use crate::error::CalculationError;
use crate::types::{Money, Rate};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One row of the schedule. Money signs follow the issuer: negative is cash
/// paid out by the issuer. Indexation and debt-service fields are `None` for
/// period 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowPeriod {
    pub period: u32,
    pub date: NaiveDate,
    pub annual_inflation: Option<Rate>,
    pub period_inflation: Option<Rate>,
    pub grace: Option<GracePeriod>,
    /// Outstanding capital before indexation
    pub capital: Option<Money>,
    pub indexed_capital: Option<Money>,
    pub coupon: Option<Money>,
    pub amortization: Option<Money>,
    /// Debt service actually paid: coupon and/or amortization per grace state
    pub installment: Option<Money>,
    pub premium: Option<Money>,
    pub tax_shield: Option<Money>,
    pub issuer_flow: Money,
    pub issuer_net_flow: Money,
    pub investor_flow: Money,
    pub discounted_flow: Money,
    pub duration_factor: Decimal,
    pub convexity_factor: Decimal,
}

/// State handed from one period to the next.
#[derive(Debug, Clone, Copy)]
struct Carry {
    indexed_capital: Money,
    coupon: Money,
    amortization: Money,
    grace: GracePeriod,
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Streaming generator over periods `0..=total_periods`. Stops after the
/// first error.
pub struct CashFlowPeriods<'a> {
    terms: &'a ValidatedBondTerms,
    params: &'a DerivedParameters,
    ctx: &'a ArithmeticContext,
    next_period: u32,
    carry: Option<Carry>,
    failed: bool,
}

/// Start generating the schedule lazily.
pub fn cash_flow_periods<'a>(
    terms: &'a ValidatedBondTerms,
    params: &'a DerivedParameters,
    ctx: &'a ArithmeticContext,
) -> CashFlowPeriods<'a> {
    CashFlowPeriods {
        terms,
        params,
        ctx,
        next_period: 0,
        carry: None,
        failed: false,
    }
}

/// Generate the whole schedule, `total_periods + 1` rows.
pub fn generate_schedule(
    terms: &ValidatedBondTerms,
    params: &DerivedParameters,
    ctx: &ArithmeticContext,
) -> Result<Vec<CashFlowPeriod>, CalculationError> {
    cash_flow_periods(terms, params, ctx).collect()
}

impl Iterator for CashFlowPeriods<'_> {
    type Item = Result<CashFlowPeriod, CalculationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next_period > self.params.total_periods {
            return None;
        }
        let p = self.next_period;
        self.next_period += 1;

        let row = if p == 0 {
            self.disbursement()
        } else {
            self.step(p)
        };
        if row.is_err() {
            self.failed = true;
        }
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let remaining = self
            .params
            .total_periods
            .saturating_add(1)
            .saturating_sub(self.next_period) as usize;
        (0, Some(remaining))
    }
}

impl CashFlowPeriods<'_> {
    fn disbursement(&self) -> Result<CashFlowPeriod, CalculationError> {
        let terms = self.terms.terms();
        let issuer_flow = self.ctx.round(self.ctx.sub(
            terms.commercial_price,
            self.params.issuer_upfront_cost,
            "disbursement",
            Some(0),
        )?);
        let investor_flow = -issuer_flow;

        Ok(CashFlowPeriod {
            period: 0,
            date: terms.issue_date,
            annual_inflation: None,
            period_inflation: None,
            grace: None,
            capital: None,
            indexed_capital: None,
            coupon: None,
            amortization: None,
            installment: None,
            premium: None,
            tax_shield: None,
            issuer_flow,
            issuer_net_flow: issuer_flow,
            investor_flow,
            discounted_flow: investor_flow,
            duration_factor: Decimal::ZERO,
            convexity_factor: Decimal::ZERO,
        })
    }

    fn step(&mut self, p: u32) -> Result<CashFlowPeriod, CalculationError> {
        let ctx = self.ctx;
        let params = self.params;
        let validated = self.terms;
        let terms = validated.terms();
        let n = params.total_periods;
        let here = Some(p);

        let year_index = year_index(p, params);
        let (annual_inflation, grace) = match (
            validated.inflation_series().get(year_index),
            validated.grace_schedule().get(year_index),
        ) {
            (Some(i), Some(g)) => (*i, *g),
            _ => return Err(CalculationError::MissingYear { period: p, year_index }),
        };

        let capital = match self.carry {
            None => terms.nominal_value,
            Some(prev) if prev.grace == GracePeriod::Total => {
                ctx.sub(prev.indexed_capital, prev.coupon, "capitalized capital", here)?
            }
            Some(prev) => ctx.add(prev.indexed_capital, prev.amortization, "capital", here)?,
        };
        if capital < Decimal::ZERO {
            return Err(CalculationError::NegativeCapital {
                period: p,
                value: capital,
            });
        }

        let period_inflation = ctx.compound(
            annual_inflation,
            params.coupon_year_fraction,
            "period inflation",
            here,
        )?;
        let indexed_capital =
            ctx.mul(capital, Decimal::ONE + period_inflation, "indexed capital", here)?;
        let coupon = -ctx.mul(indexed_capital, params.periodic_coupon_rate, "coupon", here)?;

        let amortization = if grace == GracePeriod::Normal && p == n {
            -indexed_capital
        } else {
            Decimal::ZERO
        };
        let installment = match grace {
            GracePeriod::Total => Decimal::ZERO,
            GracePeriod::Partial => coupon,
            GracePeriod::Normal => ctx.add(coupon, amortization, "installment", here)?,
        };
        let premium = if p == n {
            -ctx.mul(terms.premium_pct, terms.nominal_value, "premium", here)?
        } else {
            Decimal::ZERO
        };
        let tax_shield = ctx.mul(-coupon, terms.income_tax_rate, "tax shield", here)?;

        let issuer_flow = ctx.add(installment, premium, "issuer flow", here)?;
        let issuer_net_flow = ctx.add(issuer_flow, tax_shield, "issuer net flow", here)?;
        let investor_flow = -issuer_flow;

        let growth = ctx.powi(
            Decimal::ONE + params.periodic_discount_rate,
            p,
            "discount factor",
            here,
        )?;
        let discounted_flow = ctx.div(investor_flow, growth, "discounted investor flow", here)?;
        let weight = ctx.mul(
            Decimal::from(p),
            params.coupon_year_fraction,
            "duration weight",
            here,
        )?;
        let duration_factor = ctx.mul(discounted_flow, weight, "duration factor", here)?;
        let convexity_factor = ctx.mul(
            discounted_flow,
            Decimal::from(u64::from(p) * u64::from(p + 1)),
            "convexity factor",
            here,
        )?;

        let date = period_date(terms.issue_date, params.coupon_days, p)?;

        self.carry = Some(Carry {
            indexed_capital,
            coupon,
            amortization,
            grace,
        });

        tracing::trace!(
            period = p,
            %grace,
            %indexed_capital,
            %coupon,
            %issuer_flow,
            "generated period"
        );

        Ok(CashFlowPeriod {
            period: p,
            date,
            annual_inflation: Some(annual_inflation),
            period_inflation: Some(period_inflation),
            grace: Some(grace),
            capital: Some(capital),
            indexed_capital: Some(indexed_capital),
            coupon: Some(coupon),
            amortization: Some(amortization),
            installment: Some(installment),
            premium: Some(premium),
            tax_shield: Some(tax_shield),
            issuer_flow,
            issuer_net_flow,
            investor_flow,
            discounted_flow,
            duration_factor,
            convexity_factor,
        })
    }
}

/// Annual-series index for period `p` (1-based): `floor((p-1) / periods_per_year)`,
/// computed in whole days to stay exact.
fn year_index(p: u32, params: &DerivedParameters) -> usize {
    let elapsed_days = u64::from(p - 1) * u64::from(params.coupon_days);
    (elapsed_days / u64::from(params.day_count_base)) as usize
}

/// Period `p` falls `p × coupon_days` calendar days after issue.
fn period_date(issue: NaiveDate, coupon_days: u32, p: u32) -> Result<NaiveDate, CalculationError> {
    issue
        .checked_add_days(Days::new(u64::from(coupon_days) * u64::from(p)))
        .ok_or(CalculationError::DateOutOfRange { period: p })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bond::parameters::derive_parameters;
    use crate::bond::terms::{BondTerms, CouponFrequency, IssuanceCosts, RateType};
    use crate::bond::validation::validate_terms;
    use rust_decimal_macros::dec;

    fn terms_with_grace(grace: &[&str]) -> BondTerms {
        let years = grace.len();
        BondTerms {
            nominal_value: dec!(1000),
            commercial_price: dec!(1050),
            term_years: years as u32,
            coupon_frequency: CouponFrequency::Semiannual,
            day_count_base: 360,
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
            inflation_series: vec![dec!(0.10); years],
            grace_series: grace.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn schedule(grace: &[&str]) -> Vec<CashFlowPeriod> {
        let ctx = ArithmeticContext::default();
        let validated = validate_terms(&terms_with_grace(grace)).unwrap();
        let params = derive_parameters(&validated, &ctx).unwrap();
        generate_schedule(&validated, &params, &ctx).unwrap()
    }

    // -----------------------------------------------------------------------
    // 1. Disbursement period
    // -----------------------------------------------------------------------
    #[test]
    fn test_period_zero_is_net_disbursement() {
        let rows = schedule(&["Normal", "Normal"]);
        let p0 = &rows[0];
        assert_eq!(p0.period, 0);
        assert_eq!(p0.issuer_flow, dec!(1026.9));
        assert_eq!(p0.investor_flow, dec!(-1026.9));
        assert_eq!(p0.discounted_flow, dec!(-1026.9));
        assert!(p0.coupon.is_none() && p0.indexed_capital.is_none());
        assert_eq!(p0.duration_factor, Decimal::ZERO);
    }

    // -----------------------------------------------------------------------
    // 2. Row count and dating
    // -----------------------------------------------------------------------
    #[test]
    fn test_contiguous_periods_and_dates() {
        let rows = schedule(&["Normal", "Normal", "Normal"]);
        assert_eq!(rows.len(), 7);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.period as usize, i);
        }
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2024, 6, 29).unwrap());
        assert_eq!((rows[6].date - rows[0].date).num_days(), 1080);
    }

    // -----------------------------------------------------------------------
    // 3. Bullet amortization on the terminal Normal period
    // -----------------------------------------------------------------------
    #[test]
    fn test_bullet_repayment_at_maturity() {
        let rows = schedule(&["Normal", "Normal"]);
        for row in &rows[1..4] {
            assert_eq!(row.amortization, Some(Decimal::ZERO));
        }
        let last = rows.last().unwrap();
        let indexed = last.indexed_capital.unwrap();
        assert_eq!(last.amortization, Some(-indexed));
        assert_eq!(last.premium, Some(dec!(-10)));
        assert_eq!(
            last.installment,
            Some(last.coupon.unwrap() + last.amortization.unwrap())
        );
    }

    // -----------------------------------------------------------------------
    // 4. Capital is indexed forward while no principal is repaid
    // -----------------------------------------------------------------------
    #[test]
    fn test_capital_indexes_without_repayment() {
        let rows = schedule(&["Normal", "Normal"]);
        assert_eq!(rows[1].capital, Some(dec!(1000)));
        assert_eq!(rows[2].capital, rows[1].indexed_capital);
        // 1.1^0.5 per semester
        let growth = rows[1].indexed_capital.unwrap() / dec!(1000);
        assert!((growth - dec!(1.0488088482)).abs() < dec!(0.00000001));
    }

    // -----------------------------------------------------------------------
    // 5. Total grace capitalizes the unpaid coupon
    // -----------------------------------------------------------------------
    #[test]
    fn test_total_grace_capitalizes_coupon() {
        let rows = schedule(&["Total", "Normal"]);
        // Periods 1-2 fall in year 0 (Total)
        assert_eq!(rows[1].installment, Some(Decimal::ZERO));
        assert_eq!(rows[1].issuer_flow, Decimal::ZERO);
        assert_eq!(
            rows[2].capital.unwrap(),
            rows[1].indexed_capital.unwrap() - rows[1].coupon.unwrap()
        );
        // Period 3 follows a Total period, so it also sees capitalization
        assert_eq!(
            rows[3].capital.unwrap(),
            rows[2].indexed_capital.unwrap() - rows[2].coupon.unwrap()
        );
        // Tax shield is recorded even though nothing is paid
        assert!(rows[1].tax_shield.unwrap() > Decimal::ZERO);
    }

    // -----------------------------------------------------------------------
    // 6. Partial grace pays interest only
    // -----------------------------------------------------------------------
    #[test]
    fn test_partial_grace_pays_coupon_only() {
        let rows = schedule(&["Partial", "Partial"]);
        for row in &rows[1..] {
            assert_eq!(row.installment, row.coupon);
            assert_eq!(row.amortization, Some(Decimal::ZERO));
        }
        // No bullet even at maturity
        let last = rows.last().unwrap();
        assert_eq!(last.issuer_flow, last.coupon.unwrap() + dec!(-10));
    }

    // -----------------------------------------------------------------------
    // 7. Mirror invariant
    // -----------------------------------------------------------------------
    #[test]
    fn test_investor_mirrors_issuer() {
        let rows = schedule(&["Total", "Partial", "Normal"]);
        for row in &rows {
            assert_eq!(row.investor_flow, -row.issuer_flow, "period {}", row.period);
        }
    }

    // -----------------------------------------------------------------------
    // 8. Year mapping
    // -----------------------------------------------------------------------
    #[test]
    fn test_year_mapping_uses_periods_per_year() {
        let rows = schedule(&["Partial", "Total", "Normal"]);
        let grace: Vec<GracePeriod> = rows[1..].iter().filter_map(|r| r.grace).collect();
        assert_eq!(
            grace,
            vec![
                GracePeriod::Partial,
                GracePeriod::Partial,
                GracePeriod::Total,
                GracePeriod::Total,
                GracePeriod::Normal,
                GracePeriod::Normal,
            ]
        );
    }

    // -----------------------------------------------------------------------
    // 9. Streaming stops at the first error
    // -----------------------------------------------------------------------
    #[test]
    fn test_missing_year_is_fatal_and_stops_iteration() {
        let ctx = ArithmeticContext::default();
        let good = validate_terms(&terms_with_grace(&["Normal", "Normal"])).unwrap();
        let params = derive_parameters(&good, &ctx).unwrap();
        let truncated = ValidatedBondTerms::new(
            good.terms().clone(),
            good.day_count_base(),
            vec![GracePeriod::Normal],
        );
        let mut iter = cash_flow_periods(&truncated, &params, &ctx);
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_ok());
        assert_eq!(
            iter.next().unwrap().unwrap_err(),
            CalculationError::MissingYear {
                period: 3,
                year_index: 1
            }
        );
        assert!(iter.next().is_none());
    }

    // -----------------------------------------------------------------------
    // 10. Capitalization past Decimal::MAX is a typed error
    // -----------------------------------------------------------------------
    #[test]
    fn test_capital_overflow_ends_stream() {
        let ctx = ArithmeticContext::default();
        let mut terms = terms_with_grace(&["Total", "Total", "Total"]);
        terms.nominal_value = Decimal::from_i128_with_scale(70_000_000_000_000_000_000_000_000_000, 0);
        terms.inflation_series = vec![Decimal::ZERO; 3];
        let validated = validate_terms(&terms).unwrap();
        let params = derive_parameters(&validated, &ctx).unwrap();

        let results: Vec<_> = cash_flow_periods(&validated, &params, &ctx).collect();
        let last = results.last().unwrap();
        match last {
            Err(CalculationError::Overflow { stage, period }) => {
                assert_eq!(stage, "capitalized capital");
                assert!(period.is_some());
            }
            other => panic!("Expected capital overflow, got {other:?}"),
        }
        assert!(results[..results.len() - 1].iter().all(|r| r.is_ok()));
        assert!(results.len() < params.total_periods as usize + 1);
    }
}
