use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Instant;

use deal_waterfall_core::time_value::{compute_irr, equity_multiple};
use deal_waterfall_core::waterfall::assumptions::{DealAssumptions, DebtTerms};
use deal_waterfall_core::waterfall::distribution::{self, DistributionInput};
use deal_waterfall_core::waterfall::engine::{self, DealInput};
use deal_waterfall_core::waterfall::projection::{self, ProjectionInput};
use deal_waterfall_core::with_metadata;

use crate::input;

/// Arguments for the annual cash-flow projection
#[derive(Args)]
pub struct CashFlowsArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Total project cost
    #[arg(long)]
    pub total_project_cost: Option<Decimal>,

    /// Stabilized annual NOI
    #[arg(long)]
    pub stabilized_noi: Option<Decimal>,

    /// Hold period in years
    #[arg(long, default_value = "5")]
    pub hold_period: u32,

    /// First year earning stabilized NOI
    #[arg(long, default_value = "1")]
    pub stabilized_year: u32,

    /// Sale price in the final year
    #[arg(long)]
    pub exit_value: Option<Decimal>,

    /// Loan amount
    #[arg(long, default_value = "0")]
    pub debt: Decimal,

    /// Annual interest rate (interest-only)
    #[arg(long, default_value = "0")]
    pub interest_rate: Decimal,
}

pub fn run_cash_flows(args: CashFlowsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let proj_input: ProjectionInput = match input::load(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => ProjectionInput {
            assumptions: DealAssumptions {
                total_project_cost: args
                    .total_project_cost
                    .ok_or("--total-project-cost is required (or provide --input)")?,
                stabilized_noi: args
                    .stabilized_noi
                    .ok_or("--stabilized-noi is required (or provide --input)")?,
                hold_period_years: args.hold_period,
                stabilized_year: args.stabilized_year,
                exit_value: args
                    .exit_value
                    .ok_or("--exit-value is required (or provide --input)")?,
            },
            debt: args.debt,
            debt_terms: DebtTerms::new_interest_only(args.interest_rate),
        },
    };

    let result = projection::compute_cashflows(&proj_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for a standalone exit waterfall
#[derive(Args)]
pub struct WaterfallArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// LP capital contributed
    #[arg(long)]
    pub lp_equity: Option<Decimal>,

    /// GP capital contributed
    #[arg(long, default_value = "0")]
    pub gp_equity: Decimal,

    /// Cash to equity at exit
    #[arg(long, allow_hyphen_values = true)]
    pub cash_to_equity: Option<Decimal>,

    /// Preferred return, simple annual rate
    #[arg(long, default_value = "0.08")]
    pub pref_rate: Decimal,

    /// GP promote as a decimal
    #[arg(long, default_value = "0.20")]
    pub promote_pct: Decimal,

    /// Hold period in years
    #[arg(long, default_value = "5")]
    pub hold_period: u32,

    /// Enable the GP catch-up tier
    #[arg(long)]
    pub catchup: bool,
}

pub fn run_waterfall(args: WaterfallArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let wf_input: DistributionInput = match input::load(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => DistributionInput {
            lp_equity: args
                .lp_equity
                .ok_or("--lp-equity is required (or provide --input)")?,
            pref_rate: args.pref_rate,
            hold_period_years: args.hold_period,
            cash_to_equity: args
                .cash_to_equity
                .ok_or("--cash-to-equity is required (or provide --input)")?,
            promote_pct: args.promote_pct,
            gp_equity: args.gp_equity,
            enable_catchup: args.catchup,
        },
    };

    let result = distribution::calculate_distribution(&wf_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for the end-to-end deal analysis
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Path to JSON/YAML deal file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_analyze(args: AnalyzeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let deal: DealInput = input::load(args.input.as_deref())?
        .ok_or("--input <deal.json|deal.yaml> or stdin required for deal analysis")?;
    let result = engine::analyze_deal(&deal)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for a bare IRR calculation
#[derive(Args)]
pub struct IrrArgs {
    /// Cash flows from t=0 (comma-separated, e.g. "-100,10,10,110")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub cash_flows: Vec<Decimal>,
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let irr = compute_irr(&args.cash_flows);
    if irr.is_none() {
        warnings.push("IRR not computable: cash flows have no sign change or no real root".into());
    }
    let result = json!({
        "irr": irr,
        "equity_multiple": equity_multiple(&args.cash_flows),
        "periods": args.cash_flows.len(),
    });

    let elapsed = start.elapsed().as_micros() as u64;
    let output = with_metadata(
        "Internal Rate of Return (Newton-Raphson with bisection fallback)",
        &json!({ "cash_flows": args.cash_flows }),
        warnings,
        elapsed,
        result,
    );
    Ok(serde_json::to_value(output)?)
}
