use napi::Result as NapiResult;
use napi_derive::napi;

use bond_valuation_core::bond::{
    cash_flow_periods, derive_parameters, validate_terms, value_bond_with_context, BondTerms,
};
use bond_valuation_core::{ArithmeticContext, BondValuationError};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Validation failures cross the boundary as the JSON violation list so
/// callers can address every field at once.
fn valuation_error(e: BondValuationError) -> napi::Error {
    match e {
        BondValuationError::Validation(errors) => match serde_json::to_string(&errors) {
            Ok(json) => napi::Error::from_reason(json),
            Err(ser) => to_napi_error(ser),
        },
        BondValuationError::Calculation(calc) => to_napi_error(calc),
    }
}

fn parse_inputs(
    terms_json: &str,
    context_json: Option<String>,
) -> NapiResult<(BondTerms, ArithmeticContext)> {
    let terms: BondTerms = serde_json::from_str(terms_json).map_err(to_napi_error)?;
    let ctx = match context_json {
        Some(json) => serde_json::from_str(&json).map_err(to_napi_error)?,
        None => ArithmeticContext::default(),
    };
    Ok((terms, ctx))
}

// ---------------------------------------------------------------------------
// Bond valuation
// ---------------------------------------------------------------------------

#[napi]
pub fn value_bond(terms_json: String, context_json: Option<String>) -> NapiResult<String> {
    let (terms, ctx) = parse_inputs(&terms_json, context_json)?;
    let output = value_bond_with_context(&terms, &ctx).map_err(valuation_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn bond_schedule(terms_json: String, context_json: Option<String>) -> NapiResult<String> {
    let (terms, ctx) = parse_inputs(&terms_json, context_json)?;
    ctx.validate().map_err(to_napi_error)?;
    let validated = validate_terms(&terms)
        .map_err(|errors| valuation_error(BondValuationError::Validation(errors)))?;
    let params = derive_parameters(&validated, &ctx).map_err(to_napi_error)?;
    let periods = cash_flow_periods(&validated, &params, &ctx)
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_napi_error)?;
    serde_json::to_string(&periods).map_err(to_napi_error)
}

/// Returns the (possibly empty) violation list rather than throwing.
#[napi]
pub fn validate_bond_terms(terms_json: String) -> NapiResult<String> {
    let terms: BondTerms = serde_json::from_str(&terms_json).map_err(to_napi_error)?;
    let violations = match validate_terms(&terms) {
        Ok(_) => Vec::new(),
        Err(errors) => errors.0,
    };
    serde_json::to_string(&violations).map_err(to_napi_error)
}
