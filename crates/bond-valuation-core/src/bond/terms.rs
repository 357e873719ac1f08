//! Contractual bond terms as supplied by the caller, and the enumerations
//! that describe coupon, capitalization and grace-period cadence.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Coupon payment cadence. Day counts follow a fixed 30-day-month convention
/// independent of the day-count base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponFrequency {
    Monthly,
    Bimonthly,
    Quarterly,
    FourMonthly,
    Semiannual,
    Annual,
}

impl CouponFrequency {
    pub fn days(self) -> u32 {
        match self {
            CouponFrequency::Monthly => 30,
            CouponFrequency::Bimonthly => 60,
            CouponFrequency::Quarterly => 90,
            CouponFrequency::FourMonthly => 120,
            CouponFrequency::Semiannual => 180,
            CouponFrequency::Annual => 360,
        }
    }
}

/// Compounding cadence used to turn a nominal rate into an effective one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapitalizationFrequency {
    Daily,
    Biweekly,
    Monthly,
    Bimonthly,
    Quarterly,
    FourMonthly,
    Semiannual,
    Annual,
}

impl CapitalizationFrequency {
    pub fn days(self) -> u32 {
        match self {
            CapitalizationFrequency::Daily => 1,
            CapitalizationFrequency::Biweekly => 15,
            CapitalizationFrequency::Monthly => 30,
            CapitalizationFrequency::Bimonthly => 60,
            CapitalizationFrequency::Quarterly => 90,
            CapitalizationFrequency::FourMonthly => 120,
            CapitalizationFrequency::Semiannual => 180,
            CapitalizationFrequency::Annual => 360,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    Nominal,
    Effective,
}

/// Days in the year used to convert annual rates into period rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum DayCountBase {
    Days360,
    Days365,
}

impl DayCountBase {
    pub fn days(self) -> u32 {
        match self {
            DayCountBase::Days360 => 360,
            DayCountBase::Days365 => 365,
        }
    }
}

impl TryFrom<u32> for DayCountBase {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            360 => Ok(DayCountBase::Days360),
            365 => Ok(DayCountBase::Days365),
            other => Err(format!("day-count base must be 360 or 365, got {other}")),
        }
    }
}

impl From<DayCountBase> for u32 {
    fn from(base: DayCountBase) -> Self {
        base.days()
    }
}

/// Per-year debt-service policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GracePeriod {
    /// Full debt service
    Normal,
    /// Interest only
    Partial,
    /// Nothing paid; the coupon capitalizes
    Total,
}

impl FromStr for GracePeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "n" => Ok(GracePeriod::Normal),
            "partial" | "p" => Ok(GracePeriod::Partial),
            "total" | "t" => Ok(GracePeriod::Total),
            _ => Err(format!("unknown grace period type '{s}'")),
        }
    }
}

impl fmt::Display for GracePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GracePeriod::Normal => "Normal",
            GracePeriod::Partial => "Partial",
            GracePeriod::Total => "Total",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Issuance cost percentages, each a fraction of the commercial price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssuanceCosts {
    /// Borne by the issuer only
    pub structuring: Rate,
    /// Borne by the issuer only
    pub placement: Rate,
    /// Float / underwriting; shared by issuer and investor
    pub flotation: Rate,
    /// Settlement agent; shared by issuer and investor
    pub settlement: Rate,
}

/// Raw contractual terms. Only [`crate::bond::validation::validate_terms`]
/// turns these into something the engine will accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondTerms {
    pub nominal_value: Money,
    /// Issue price paid by the investor
    pub commercial_price: Money,
    pub term_years: u32,
    pub coupon_frequency: CouponFrequency,
    /// 360 or 365
    pub day_count_base: u32,
    pub rate_type: RateType,
    /// Required when `rate_type` is nominal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capitalization: Option<CapitalizationFrequency>,
    /// Annual contract rate (nominal or effective per `rate_type`)
    pub annual_rate: Rate,
    /// Annual effective discount rate (investor's opportunity cost)
    pub discount_rate: Rate,
    pub income_tax_rate: Rate,
    /// Premium paid at maturity as a fraction of nominal value
    pub premium_pct: Rate,
    pub issuance_costs: IssuanceCosts,
    pub issue_date: NaiveDate,
    /// One annual inflation rate per year of the term
    pub inflation_series: Vec<Rate>,
    /// One grace-period type per year of the term ("Normal", "Partial", "Total" or N/P/T)
    pub grace_series: Vec<String>,
}

impl BondTerms {
    /// Total issuer-side cost percentage.
    pub fn issuer_cost_pct(&self) -> Rate {
        let c = &self.issuance_costs;
        c.structuring + c.placement + c.flotation + c.settlement
    }

    /// Investor-side cost percentage.
    pub fn investor_cost_pct(&self) -> Rate {
        self.issuance_costs.flotation + self.issuance_costs.settlement
    }
}

/// Terms that passed every check, with the grace series and day-count base
/// parsed into their typed forms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedBondTerms {
    terms: BondTerms,
    day_count_base: DayCountBase,
    grace_schedule: Vec<GracePeriod>,
}

impl ValidatedBondTerms {
    pub(crate) fn new(
        terms: BondTerms,
        day_count_base: DayCountBase,
        grace_schedule: Vec<GracePeriod>,
    ) -> Self {
        Self {
            terms,
            day_count_base,
            grace_schedule,
        }
    }

    pub fn terms(&self) -> &BondTerms {
        &self.terms
    }

    pub fn day_count_base(&self) -> DayCountBase {
        self.day_count_base
    }

    pub fn grace_schedule(&self) -> &[GracePeriod] {
        &self.grace_schedule
    }

    pub fn inflation_series(&self) -> &[Rate] {
        &self.terms.inflation_series
    }

    pub fn into_inner(self) -> BondTerms {
        self.terms
    }
}

/// Dimensionless helper: `days / base` as an exact decimal fraction.
pub(crate) fn day_fraction(days: u32, base: DayCountBase) -> Decimal {
    Decimal::from(days) / Decimal::from(base.days())
}
