use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use deal_waterfall_core::underwriting::deal::{self, UnderwritingInput};
use deal_waterfall_core::underwriting::pro_forma::{self, ProFormaInput};
use deal_waterfall_core::waterfall::assumptions::DebtTerms;

use crate::input;

/// Arguments for value-add underwriting
#[derive(Args)]
pub struct UnderwriteArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Acquisition price
    #[arg(long)]
    pub purchase_price: Option<Decimal>,

    /// Number of units
    #[arg(long)]
    pub units: Option<u32>,

    /// In-place monthly rent per unit
    #[arg(long)]
    pub current_rent: Option<Decimal>,

    /// Post-renovation monthly rent per unit
    #[arg(long)]
    pub renovated_rent: Option<Decimal>,

    /// Renovation budget per unit
    #[arg(long, default_value = "0")]
    pub renovation_cost_per_unit: Decimal,

    /// In-place occupancy as a decimal (e.g. 0.90)
    #[arg(long, default_value = "0.90")]
    pub occupancy_current: Decimal,

    /// Stabilized occupancy as a decimal
    #[arg(long, default_value = "0.95")]
    pub occupancy_stabilized: Decimal,

    /// Operating expenses as a fraction of gross income
    #[arg(long, default_value = "0.40")]
    pub expense_ratio: Decimal,

    /// Exit cap rate as a decimal (e.g. 0.055)
    #[arg(long)]
    pub exit_cap_rate: Option<Decimal>,
}

pub fn run_underwrite(args: UnderwriteArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let uw_input: UnderwritingInput = match input::load(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => UnderwritingInput {
            purchase_price: args
                .purchase_price
                .ok_or("--purchase-price is required (or provide --input)")?,
            units: args.units.ok_or("--units is required (or provide --input)")?,
            current_rent: args
                .current_rent
                .ok_or("--current-rent is required (or provide --input)")?,
            renovated_rent: args
                .renovated_rent
                .ok_or("--renovated-rent is required (or provide --input)")?,
            renovation_cost_per_unit: args.renovation_cost_per_unit,
            occupancy_current: args.occupancy_current,
            occupancy_stabilized: args.occupancy_stabilized,
            expense_ratio: args.expense_ratio,
            exit_cap_rate: args
                .exit_cap_rate
                .ok_or("--exit-cap-rate is required (or provide --input)")?,
        },
    };

    let result = deal::underwrite_deal(&uw_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for the annual pro forma
#[derive(Args)]
pub struct ProFormaArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Number of units
    #[arg(long)]
    pub units: Option<u32>,

    /// Monthly rent per unit
    #[arg(long)]
    pub rent: Option<Decimal>,

    /// Occupancy as a decimal
    #[arg(long, default_value = "0.95")]
    pub occupancy: Decimal,

    /// Operating expenses as a fraction of gross income
    #[arg(long, default_value = "0.40")]
    pub expense_ratio: Decimal,

    /// Hold period in years
    #[arg(long, default_value = "5")]
    pub hold_period: u32,

    /// Loan amount
    #[arg(long, default_value = "0")]
    pub debt: Decimal,

    /// Annual interest rate (interest-only)
    #[arg(long, default_value = "0")]
    pub interest_rate: Decimal,

    /// Sale price in the final year
    #[arg(long)]
    pub exit_value: Option<Decimal>,

    /// Equity invested at close, for the equity multiple
    #[arg(long)]
    pub equity: Option<Decimal>,
}

pub fn run_pro_forma(args: ProFormaArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let pf_input: ProFormaInput = match input::load(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => ProFormaInput {
            units: args.units.ok_or("--units is required (or provide --input)")?,
            rent: args.rent.ok_or("--rent is required (or provide --input)")?,
            occupancy: args.occupancy,
            expense_ratio: args.expense_ratio,
            hold_period_years: args.hold_period,
            debt: args.debt,
            debt_terms: DebtTerms::new_interest_only(args.interest_rate),
            exit_value: args
                .exit_value
                .ok_or("--exit-value is required (or provide --input)")?,
            equity_invested: args.equity,
        },
    };

    let result = pro_forma::build_pro_forma(&pf_input)?;
    Ok(serde_json::to_value(result)?)
}
