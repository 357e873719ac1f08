use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bond::parameters::DerivedParameters;
use crate::bond::schedule::CashFlowPeriod;
use crate::context::ArithmeticContext;
use crate::error::CalculationError;
use crate::time_value::xirr;
use crate::types::{Money, Rate};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An annualized internal yield plus the solver diagnostics behind it.
/// `converged == false` means the last Newton iterate is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldEstimate {
    pub annual_rate: Rate,
    /// Equivalent rate per coupon period
    pub periodic_rate: Rate,
    pub iterations: u32,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationMetrics {
    /// Investor-side PV of periods 1..=N at the periodic discount rate
    pub present_value: Money,
    /// Period-0 investor flow plus present value
    pub issuer_profit_loss: Money,
    /// Years
    pub duration: Decimal,
    pub modified_duration: Decimal,
    pub convexity: Decimal,
    /// Decision-support aggregate only
    pub duration_plus_convexity: Decimal,
    pub issuer_gross_yield: YieldEstimate,
    /// After the coupon tax shield
    pub issuer_net_yield: YieldEstimate,
    pub investor_yield: YieldEstimate,
}

impl ValuationMetrics {
    /// Yields whose solver ran out of iterations or hit a flat NPV region.
    pub fn unconverged_yields(&self) -> Vec<&'static str> {
        [
            ("issuer_gross_yield", &self.issuer_gross_yield),
            ("issuer_net_yield", &self.issuer_net_yield),
            ("investor_yield", &self.investor_yield),
        ]
        .into_iter()
        .filter(|(_, y)| !y.converged)
        .map(|(name, _)| name)
        .collect()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Reduce a generated schedule into scalar valuation metrics.
pub fn compute_metrics(
    periods: &[CashFlowPeriod],
    params: &DerivedParameters,
    ctx: &ArithmeticContext,
) -> Result<ValuationMetrics, CalculationError> {
    let (opening, rest) = periods
        .split_first()
        .ok_or_else(|| CalculationError::EmptySchedule("disbursement period".into()))?;
    if rest.is_empty() {
        return Err(CalculationError::EmptySchedule("coupon periods".into()));
    }

    let present_value = ctx.sum(rest.iter().map(|r| r.discounted_flow), "present value")?;
    let issuer_profit_loss = ctx.add(
        opening.investor_flow,
        present_value,
        "issuer profit/loss",
        None,
    )?;

    // Period 0 carries a zero weight, so the numerator spans all periods.
    let weighted = ctx.sum(periods.iter().map(|r| r.duration_factor), "duration numerator")?;
    let duration = ctx.div(weighted, present_value, "duration", None)?;

    let one_plus_i = Decimal::ONE + params.periodic_discount_rate;
    let modified_duration = ctx.div(duration, one_plus_i, "modified duration", None)?;

    let convexity_sum = ctx.sum(rest.iter().map(|r| r.convexity_factor), "convexity numerator")?;
    let periods_per_year = ctx.div(
        Decimal::from(params.day_count_base),
        Decimal::from(params.coupon_days),
        "periods per year",
        None,
    )?;
    let denominator = ctx.mul(
        ctx.mul(one_plus_i * one_plus_i, present_value, "convexity denominator", None)?,
        periods_per_year * periods_per_year,
        "convexity denominator",
        None,
    )?;
    let convexity = ctx.div(convexity_sum, denominator, "convexity", None)?;

    let issuer_gross_yield = solve_yield(periods, |r| r.issuer_flow, params, ctx)?;
    let issuer_net_yield = solve_yield(periods, |r| r.issuer_net_flow, params, ctx)?;
    // The investor pays price plus its share of costs at issue, not the
    // issuer's net proceeds.
    let investor_yield = solve_yield(
        periods,
        |r| match r.period {
            0 => -params.investor_outlay,
            _ => r.investor_flow,
        },
        params,
        ctx,
    )?;

    let metrics = ValuationMetrics {
        present_value: ctx.round(present_value),
        issuer_profit_loss: ctx.round(issuer_profit_loss),
        duration,
        modified_duration,
        convexity,
        duration_plus_convexity: ctx.add(duration, convexity, "duration plus convexity", None)?,
        issuer_gross_yield,
        issuer_net_yield,
        investor_yield,
    };

    tracing::debug!(
        present_value = %metrics.present_value,
        duration = %metrics.duration,
        convexity = %metrics.convexity,
        issuer_gross_yield = %metrics.issuer_gross_yield.annual_rate,
        investor_yield = %metrics.investor_yield.annual_rate,
        "computed valuation metrics"
    );

    Ok(metrics)
}

/// Solve the internal yield of one flow series and annualize it.
///
/// The root is found on actual days / 365, expressed per coupon period on the
/// day-count base, then compounded back up to a year.
fn solve_yield(
    periods: &[CashFlowPeriod],
    flow: impl Fn(&CashFlowPeriod) -> Money,
    params: &DerivedParameters,
    ctx: &ArithmeticContext,
) -> Result<YieldEstimate, CalculationError> {
    let dated: Vec<(NaiveDate, Money)> = periods.iter().map(|r| (r.date, flow(r))).collect();
    let root = xirr(&dated, &ctx.solver)
        .ok_or_else(|| CalculationError::EmptySchedule("flows to solve a yield over".into()))?;

    if !root.converged {
        tracing::warn!(
            iterations = root.iterations,
            last_rate = %root.rate,
            "internal yield did not converge; reporting last iterate"
        );
    }

    let periodic_rate = ctx.compound(root.rate, params.coupon_year_fraction, "periodic yield", None)?;
    let periods_per_year = ctx.div(
        Decimal::from(params.day_count_base),
        Decimal::from(params.coupon_days),
        "periods per year",
        None,
    )?;
    let annual_rate = ctx.compound(periodic_rate, periods_per_year, "annualized yield", None)?;

    Ok(YieldEstimate {
        annual_rate,
        periodic_rate,
        iterations: root.iterations,
        converged: root.converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bond::parameters::derive_parameters;
    use crate::bond::schedule::generate_schedule;
    use crate::bond::terms::{BondTerms, CouponFrequency, IssuanceCosts, RateType};
    use crate::bond::validation::validate_terms;
    use rust_decimal_macros::dec;

    fn run(grace: &str, years: usize) -> (Vec<CashFlowPeriod>, DerivedParameters, ValuationMetrics) {
        let terms = BondTerms {
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
            grace_series: vec![grace.to_string(); years],
        };
        let ctx = ArithmeticContext::default();
        let validated = validate_terms(&terms).unwrap();
        let params = derive_parameters(&validated, &ctx).unwrap();
        let periods = generate_schedule(&validated, &params, &ctx).unwrap();
        let metrics = compute_metrics(&periods, &params, &ctx).unwrap();
        (periods, params, metrics)
    }

    #[test]
    fn test_present_value_excludes_disbursement() {
        let (periods, _, m) = run("Normal", 5);
        let expected: Decimal = periods[1..].iter().map(|r| r.discounted_flow).sum();
        assert_eq!(m.present_value, expected);
        assert_eq!(m.issuer_profit_loss, periods[0].investor_flow + expected);
    }

    #[test]
    fn test_modified_duration_relation() {
        let (_, params, m) = run("Normal", 5);
        let back = m.modified_duration * (Decimal::ONE + params.periodic_discount_rate);
        assert!((back - m.duration).abs() < dec!(0.000000001));
        assert_eq!(m.duration_plus_convexity, m.duration + m.convexity);
    }

    #[test]
    fn test_annualized_yield_round_trips_periodic() {
        let (_, _, m) = run("Normal", 5);
        let y = m.issuer_gross_yield;
        assert!(y.converged);
        let back = (Decimal::ONE + y.periodic_rate) * (Decimal::ONE + y.periodic_rate) - Decimal::ONE;
        assert!((back - y.annual_rate).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_tax_shield_lowers_issuer_cost() {
        let (_, _, m) = run("Normal", 5);
        assert!(m.issuer_net_yield.annual_rate < m.issuer_gross_yield.annual_rate);
    }

    #[test]
    fn test_investor_yield_uses_investor_outlay() {
        let (periods, params, m) = run("Normal", 5);
        assert!(m.investor_yield.converged);
        // A larger outlay for the same receipts means a lower return
        assert!(
            m.investor_yield.annual_rate < m.issuer_gross_yield.annual_rate,
            "Expected investor yield below {}, got {}",
            m.issuer_gross_yield.annual_rate,
            m.investor_yield.annual_rate
        );
        let dated: Vec<(NaiveDate, Money)> = periods
            .iter()
            .map(|r| match r.period {
                0 => (r.date, -params.investor_outlay),
                _ => (r.date, r.investor_flow),
            })
            .collect();
        let root = xirr(&dated, &ArithmeticContext::default().solver).unwrap();
        let periodic = ArithmeticContext::default()
            .compound(root.rate, params.coupon_year_fraction, "test", None)
            .unwrap();
        assert_eq!(m.investor_yield.periodic_rate, periodic);
    }

    #[test]
    fn test_unconverged_yields_listed() {
        let (_, _, mut m) = run("Normal", 2);
        assert!(m.unconverged_yields().is_empty());
        m.investor_yield.converged = false;
        assert_eq!(m.unconverged_yields(), vec!["investor_yield"]);
    }

    #[test]
    fn test_empty_schedule_rejected() {
        let (_, params, _) = run("Normal", 1);
        let err = compute_metrics(&[], &params, &ArithmeticContext::default()).unwrap_err();
        assert!(matches!(err, CalculationError::EmptySchedule(_)));
    }
}
