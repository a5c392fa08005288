use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Serialize;

use deal_waterfall_core::time_value;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Underwriting
// ---------------------------------------------------------------------------

#[napi]
pub fn underwrite_deal(input_json: String) -> NapiResult<String> {
    let input: deal_waterfall_core::underwriting::deal::UnderwritingInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        deal_waterfall_core::underwriting::deal::underwrite_deal(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn build_pro_forma(input_json: String) -> NapiResult<String> {
    let input: deal_waterfall_core::underwriting::pro_forma::ProFormaInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = deal_waterfall_core::underwriting::pro_forma::build_pro_forma(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Waterfall
// ---------------------------------------------------------------------------

#[napi]
pub fn project_cash_flows(input_json: String) -> NapiResult<String> {
    let input: deal_waterfall_core::waterfall::projection::ProjectionInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = deal_waterfall_core::waterfall::projection::compute_cashflows(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn distribute_waterfall(input_json: String) -> NapiResult<String> {
    let input: deal_waterfall_core::waterfall::distribution::DistributionInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = deal_waterfall_core::waterfall::distribution::calculate_distribution(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn analyze_deal(input_json: String) -> NapiResult<String> {
    let input: deal_waterfall_core::waterfall::engine::DealInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        deal_waterfall_core::waterfall::engine::analyze_deal(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Returns
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct IrrResult {
    irr: Option<Decimal>,
    equity_multiple: Option<Decimal>,
}

/// Takes a JSON array of cash flows from t=0. `irr` is null when not computable.
#[napi]
pub fn compute_irr(cash_flows_json: String) -> NapiResult<String> {
    let cash_flows: Vec<Decimal> =
        serde_json::from_str(&cash_flows_json).map_err(to_napi_error)?;
    let result = IrrResult {
        irr: time_value::compute_irr(&cash_flows),
        equity_multiple: time_value::equity_multiple(&cash_flows),
    };
    serde_json::to_string(&result).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[napi]
pub fn waterfall_sensitivity(input_json: String) -> NapiResult<String> {
    let input: deal_waterfall_core::scenarios::sensitivity::SensitivityInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = deal_waterfall_core::scenarios::sensitivity::waterfall_sensitivity(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
