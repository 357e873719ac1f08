pub mod engine;
pub mod metrics;
pub mod parameters;
pub mod schedule;
pub mod terms;
pub mod validation;

pub use engine::{value_bond, value_bond_with_context, BondValuation, ScheduleSummary};
pub use metrics::{compute_metrics, ValuationMetrics, YieldEstimate};
pub use parameters::{derive_parameters, DerivedParameters};
pub use schedule::{cash_flow_periods, generate_schedule, CashFlowPeriod, CashFlowPeriods};
pub use terms::{
    BondTerms, CapitalizationFrequency, CouponFrequency, DayCountBase, GracePeriod,
    IssuanceCosts, RateType, ValidatedBondTerms,
};
pub use validation::validate_terms;
