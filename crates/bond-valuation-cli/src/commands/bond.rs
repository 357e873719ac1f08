use clap::Args;
use serde_json::{json, Value};

use bond_valuation_core::bond::{self, BondTerms};
use bond_valuation_core::BondValuationError;

use crate::input;

/// Where the bond terms and optional arithmetic context come from
#[derive(Args)]
pub struct TermsSource {
    /// Path to a JSON or YAML file with the bond terms (stdin if omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Path to a JSON or YAML arithmetic context (scale, rounding, solver)
    #[arg(long)]
    pub context: Option<String>,
}

/// Arguments for a full valuation
#[derive(Args)]
pub struct ValuateArgs {
    #[command(flatten)]
    pub source: TermsSource,
}

/// Arguments for the period schedule
#[derive(Args)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub source: TermsSource,
}

/// Arguments for validation only
#[derive(Args)]
pub struct ValidateArgs {
    /// Path to a JSON or YAML file with the bond terms (stdin if omitted)
    #[arg(long)]
    pub input: Option<String>,
}

fn load_terms(path: Option<&str>) -> Result<BondTerms, Box<dyn std::error::Error>> {
    tracing::debug!(source = path.unwrap_or("stdin"), "loading bond terms");
    input::load(path, "--input <file.json|file.yaml> or stdin required for bond terms")
}

pub fn run_valuate(args: ValuateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let terms = load_terms(args.source.input.as_deref())?;
    let ctx = input::load_context(args.source.context.as_deref())?;
    let result = bond::value_bond_with_context(&terms, &ctx)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let terms = load_terms(args.source.input.as_deref())?;
    let ctx = input::load_context(args.source.context.as_deref())?;
    let result = bond::value_bond_with_context(&terms, &ctx)?;
    Ok(serde_json::to_value(result.result.periods)?)
}

pub fn run_validate(args: ValidateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let terms = load_terms(args.input.as_deref())?;
    let validated = bond::validate_terms(&terms).map_err(BondValuationError::Validation)?;
    Ok(json!({
        "valid": true,
        "term_years": validated.terms().term_years,
        "day_count_base": validated.day_count_base(),
        "grace_schedule": validated.grace_schedule(),
    }))
}
