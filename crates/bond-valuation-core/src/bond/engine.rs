//! Single-bond entry point: validate, derive, generate, reduce.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::bond::metrics::{compute_metrics, ValuationMetrics};
use crate::bond::parameters::{derive_parameters, DerivedParameters};
use crate::bond::schedule::{generate_schedule, CashFlowPeriod};
use crate::bond::terms::BondTerms;
use crate::bond::validation::validate_terms;
use crate::context::ArithmeticContext;
use crate::error::CalculationError;
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::BondResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Aggregates over the generated schedule (periods 1..=N).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub total_coupons: Money,
    pub total_amortization: Money,
    pub total_premium: Money,
    pub total_tax_shield: Money,
    /// Sum of installments actually paid
    pub total_debt_service: Money,
    pub final_indexed_capital: Money,
    /// False when no period amortizes, e.g. a Partial or Total final year
    pub principal_repaid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondValuation {
    pub parameters: DerivedParameters,
    pub periods: Vec<CashFlowPeriod>,
    pub metrics: ValuationMetrics,
    pub summary: ScheduleSummary,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Value a bond with the default arithmetic context.
pub fn value_bond(terms: &BondTerms) -> BondResult<ComputationOutput<BondValuation>> {
    value_bond_with_context(terms, &ArithmeticContext::default())
}

/// Value a bond: derived parameters, full period schedule and metrics.
///
/// Validation failures come back as the complete violation list; anything that
/// breaks afterwards is a calculation error. Non-converged yields are not
/// errors and show up in `warnings`.
pub fn value_bond_with_context(
    terms: &BondTerms,
    ctx: &ArithmeticContext,
) -> BondResult<ComputationOutput<BondValuation>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    ctx.validate()?;
    let validated = validate_terms(terms)?;

    let parameters = derive_parameters(&validated, ctx)?;
    tracing::debug!(
        total_periods = parameters.total_periods,
        periodic_coupon_rate = %parameters.periodic_coupon_rate,
        periodic_discount_rate = %parameters.periodic_discount_rate,
        issuer_upfront_cost = %parameters.issuer_upfront_cost,
        "derived bond parameters"
    );

    let periods = generate_schedule(&validated, &parameters, ctx)?;
    let metrics = compute_metrics(&periods, &parameters, ctx)?;
    let summary = summarize(&periods, ctx)?;

    if !summary.principal_repaid {
        let last_grace = validated
            .grace_schedule()
            .last()
            .map(|g| g.to_string())
            .unwrap_or_default();
        tracing::warn!(
            final_indexed_capital = %summary.final_indexed_capital,
            "schedule never repays principal"
        );
        warnings.push(format!(
            "No principal is repaid over the term: the final year's grace type is {last_grace}, \
             leaving indexed capital of {} outstanding",
            summary.final_indexed_capital.round_dp(2)
        ));
    }
    for name in metrics.unconverged_yields() {
        warnings.push(format!(
            "{name}: Newton-Raphson did not converge within {} iterations; last iterate reported",
            ctx.solver.max_iterations
        ));
    }

    let assumptions = serde_json::json!({
        "coupon_frequency": terms.coupon_frequency,
        "coupon_days": parameters.coupon_days,
        "day_count_base": parameters.day_count_base,
        "rate_type": terms.rate_type,
        "period_dates": "issue date + n x coupon days (actual calendar days)",
        "yield_time_weighting": "actual days / 365",
        "present_value_periods": "1..N (period 0 excluded)",
        "investor_yield_outlay": parameters.investor_outlay,
        "solver": ctx.solver,
    });

    let output = BondValuation {
        parameters,
        periods,
        metrics,
        summary,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Indexed bullet bond schedule with grace periods; PV, duration, convexity and Newton-Raphson internal yields",
        &assumptions,
        warnings,
        elapsed,
        ctx.describe(),
        output,
    ))
}

fn summarize(
    periods: &[CashFlowPeriod],
    ctx: &ArithmeticContext,
) -> Result<ScheduleSummary, CalculationError> {
    let rows = periods.iter().skip(1);
    let sum = |f: fn(&CashFlowPeriod) -> Option<Money>, stage: &str| {
        ctx.sum(rows.clone().filter_map(f), stage)
    };

    let total_amortization = sum(|r| r.amortization, "total amortization")?;
    Ok(ScheduleSummary {
        total_coupons: sum(|r| r.coupon, "total coupons")?,
        total_amortization,
        total_premium: sum(|r| r.premium, "total premium")?,
        total_tax_shield: sum(|r| r.tax_shield, "total tax shield")?,
        total_debt_service: sum(|r| r.installment, "total debt service")?,
        final_indexed_capital: periods
            .last()
            .and_then(|r| r.indexed_capital)
            .unwrap_or(Decimal::ZERO),
        principal_repaid: !total_amortization.is_zero(),
    })
}
