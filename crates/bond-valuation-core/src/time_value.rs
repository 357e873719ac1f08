use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::context::{ArithmeticContext, SolverSettings};
use crate::error::CalculationError;
use crate::types::{Money, Rate};

/// Actual-day denominator used to time-weight dated flows.
const ACTUAL_DAYS_PER_YEAR: Decimal = dec!(365);
const RATE_FLOOR: Decimal = dec!(-0.99);
const RATE_CEILING: Decimal = dec!(100);

/// Result of a Newton–Raphson solve. A non-converged solve still carries the
/// last iterate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSolution {
    pub rate: Rate,
    pub iterations: u32,
    pub converged: bool,
}

/// Effective annual rate from a nominal rate compounded `compounding_periods`
/// times a year: `(1 + j/m)^m - 1`.
pub fn effective_annual_rate(
    nominal: Rate,
    compounding_periods: Decimal,
    ctx: &ArithmeticContext,
) -> Result<Rate, CalculationError> {
    let per_period = ctx.div(nominal, compounding_periods, "nominal rate per compounding period", None)?;
    ctx.compound(per_period, compounding_periods, "effective annual rate", None)
}

/// Equivalent rate over a fraction of a year: `(1 + annual)^fraction - 1`.
pub fn periodic_rate(
    annual: Rate,
    year_fraction: Decimal,
    ctx: &ArithmeticContext,
) -> Result<Rate, CalculationError> {
    ctx.compound(annual, year_fraction, "periodic rate", None)
}

/// Net present value of dated flows, time-weighted by actual days / 365 from
/// the first flow's date.
pub fn xnpv(rate: Rate, dated_flows: &[(NaiveDate, Money)]) -> Option<Money> {
    let (npv, _) = npv_and_derivative(rate, dated_flows)?;
    Some(npv)
}

/// Internal rate of return for dated flows via Newton–Raphson.
///
/// Time weights are actual days / 365 from the first flow. Returns `None` only
/// when fewer than two flows are supplied; failing to converge is reported in
/// the solution rather than as an error.
pub fn xirr(dated_flows: &[(NaiveDate, Money)], settings: &SolverSettings) -> Option<RootSolution> {
    if dated_flows.len() < 2 {
        return None;
    }

    let mut rate = settings.initial_guess;

    for i in 0..settings.max_iterations {
        let Some((npv_val, dnpv)) = npv_and_derivative(rate, dated_flows) else {
            // Discount factors left the representable range; keep the last finite iterate.
            return Some(RootSolution {
                rate,
                iterations: i,
                converged: false,
            });
        };

        if npv_val.abs() < settings.tolerance {
            return Some(RootSolution {
                rate,
                iterations: i,
                converged: true,
            });
        }

        if dnpv.is_zero() {
            return Some(RootSolution {
                rate,
                iterations: i,
                converged: false,
            });
        }

        let Some(step) = npv_val.checked_div(dnpv) else {
            return Some(RootSolution {
                rate,
                iterations: i,
                converged: false,
            });
        };
        rate = (rate - step).clamp(RATE_FLOOR, RATE_CEILING);

        if step.abs() < settings.tolerance {
            return Some(RootSolution {
                rate,
                iterations: i + 1,
                converged: true,
            });
        }
    }

    Some(RootSolution {
        rate,
        iterations: settings.max_iterations,
        converged: false,
    })
}

/// NPV and its derivative with respect to the rate, or `None` on overflow.
fn npv_and_derivative(rate: Rate, dated_flows: &[(NaiveDate, Money)]) -> Option<(Money, Decimal)> {
    let base_date = dated_flows.first()?.0;
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }

    let mut npv_val = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;

    for (date, amount) in dated_flows {
        let days = (*date - base_date).num_days();
        let years = Decimal::from(days) / ACTUAL_DAYS_PER_YEAR;

        let discount = one_plus_r.checked_powd(years)?;
        if discount.is_zero() {
            return None;
        }
        npv_val = npv_val.checked_add(amount.checked_div(discount)?)?;
        let slope = years.checked_mul(*amount)?.checked_div(one_plus_r.checked_mul(discount)?)?;
        dnpv = dnpv.checked_sub(slope)?;
    }

    Some((npv_val, dnpv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_effective_from_monthly_nominal() {
        let ctx = ArithmeticContext::default();
        let eff = effective_annual_rate(dec!(0.12), dec!(12), &ctx).unwrap();
        // (1.01)^12 - 1 = 0.126825...
        assert!(
            (eff - dec!(0.1268250301)).abs() < dec!(0.0000000001),
            "Expected ~12.6825%, got {eff}"
        );
    }

    #[test]
    fn test_periodic_rate_quarterly() {
        let ctx = ArithmeticContext::default();
        let q = periodic_rate(dec!(0.10), dec!(0.25), &ctx).unwrap();
        // 1.1^0.25 - 1 = 0.024113689...
        assert!((q - dec!(0.0241136891)).abs() < dec!(0.00000001));
    }

    #[test]
    fn test_xirr_one_year_simple() {
        // -1000 today, +1100 in exactly 365 days => 10%
        let flows = vec![(d(2024, 1, 1), dec!(-1000)), (d(2024, 12, 31), dec!(1100))];
        let sol = xirr(&flows, &SolverSettings::default()).unwrap();
        assert!(sol.converged);
        assert!(
            (sol.rate - dec!(0.10)).abs() < dec!(0.000001),
            "Expected 10%, got {}",
            sol.rate
        );
    }

    #[test]
    fn test_xirr_zeroes_xnpv() {
        let flows = vec![
            (d(2024, 1, 1), dec!(-950)),
            (d(2024, 6, 29), dec!(40)),
            (d(2024, 12, 26), dec!(40)),
            (d(2025, 6, 24), dec!(1040)),
        ];
        let sol = xirr(&flows, &SolverSettings::default()).unwrap();
        assert!(sol.converged);
        let residual = xnpv(sol.rate, &flows).unwrap();
        assert!(residual.abs() < dec!(0.0001), "Residual NPV {residual}");
    }

    #[test]
    fn test_xirr_needs_two_flows() {
        let flows = vec![(d(2024, 1, 1), dec!(-1000))];
        assert!(xirr(&flows, &SolverSettings::default()).is_none());
    }

    #[test]
    fn test_xirr_budget_exhausted_returns_last_iterate() {
        let flows = vec![(d(2024, 1, 1), dec!(-1000)), (d(2029, 1, 1), dec!(3000))];
        let settings = SolverSettings {
            max_iterations: 1,
            ..Default::default()
        };
        let sol = xirr(&flows, &settings).unwrap();
        assert!(!sol.converged);
        assert_eq!(sol.iterations, 1);
        assert_ne!(sol.rate, settings.initial_guess);
    }

    #[test]
    fn test_xirr_all_zero_flows_is_flat() {
        let flows = vec![(d(2024, 1, 1), dec!(0)), (d(2025, 1, 1), dec!(0))];
        let sol = xirr(&flows, &SolverSettings::default()).unwrap();
        // NPV is identically zero, so the initial guess already satisfies it.
        assert!(sol.converged);
        assert_eq!(sol.rate, dec!(0.10));
    }
}
