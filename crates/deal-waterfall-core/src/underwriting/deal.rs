use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::WaterfallError;
use crate::types::*;
use crate::EngineResult;

use crate::waterfall::assumptions::DealAssumptions;

const MONTHS_PER_YEAR: Decimal = dec!(12);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Unit-level inputs for a value-add multifamily acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderwritingInput {
    /// Acquisition cost
    pub purchase_price: Money,
    /// Number of rentable units
    pub units: u32,
    /// In-place monthly rent per unit
    pub current_rent: Money,
    /// Post-renovation monthly rent per unit
    pub renovated_rent: Money,
    /// Renovation budget per unit
    pub renovation_cost_per_unit: Money,
    /// In-place occupancy (0.90 = 90%)
    pub occupancy_current: Rate,
    /// Occupancy once stabilized
    pub occupancy_stabilized: Rate,
    /// Operating expenses as a fraction of gross income
    pub expense_ratio: Rate,
    /// Cap rate used to value stabilized NOI at exit
    pub exit_cap_rate: Rate,
}

/// Income, valuation and cost build-up for the deal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderwritingOutput {
    pub gross_income_current: Money,
    pub gross_income_stabilized: Money,
    pub operating_expenses_current: Money,
    pub operating_expenses_stabilized: Money,
    pub noi_current: Money,
    pub noi_stabilized: Money,
    /// Stabilized NOI / exit cap rate
    pub exit_value: Money,
    pub total_renovation_cost: Money,
    /// Purchase price + renovation
    pub total_project_cost: Money,
    /// Exit value - total project cost
    pub value_created: Money,
    pub creates_value: bool,
    /// Exit value / total project cost
    pub value_to_cost: Multiple,
}

impl UnderwritingOutput {
    /// Hand the underwritten figures to the waterfall engine.
    pub fn to_deal_assumptions(
        &self,
        hold_period_years: u32,
        stabilized_year: u32,
    ) -> DealAssumptions {
        DealAssumptions {
            total_project_cost: self.total_project_cost,
            stabilized_noi: self.noi_stabilized,
            hold_period_years,
            stabilized_year,
            exit_value: self.exit_value,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Underwrite a value-add deal: NOI before and after renovation, exit value
/// by direct capitalisation, project cost and value created.
pub fn underwrite_deal(
    input: &UnderwritingInput,
) -> EngineResult<ComputationOutput<UnderwritingOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input, &mut warnings)?;

    let units = Decimal::from(input.units);
    let gross_income_current =
        units * input.current_rent * MONTHS_PER_YEAR * input.occupancy_current;
    let gross_income_stabilized =
        units * input.renovated_rent * MONTHS_PER_YEAR * input.occupancy_stabilized;

    let operating_expenses_current = gross_income_current * input.expense_ratio;
    let operating_expenses_stabilized = gross_income_stabilized * input.expense_ratio;

    let noi_current = gross_income_current - operating_expenses_current;
    let noi_stabilized = gross_income_stabilized - operating_expenses_stabilized;

    let exit_value = noi_stabilized / input.exit_cap_rate;

    let total_renovation_cost = input.renovation_cost_per_unit * units;
    let total_project_cost = input.purchase_price + total_renovation_cost;
    let value_created = exit_value - total_project_cost;
    let creates_value = value_created > Decimal::ZERO;
    let value_to_cost = exit_value / total_project_cost;

    if !creates_value {
        warnings.push(format!(
            "Deal loses value: exit value {exit_value:.0} does not exceed project cost {total_project_cost:.0}"
        ));
    }
    if noi_stabilized <= noi_current {
        warnings.push("Renovation does not increase NOI".into());
    }

    let output = UnderwritingOutput {
        gross_income_current,
        gross_income_stabilized,
        operating_expenses_current,
        operating_expenses_stabilized,
        noi_current,
        noi_stabilized,
        exit_value,
        total_renovation_cost,
        total_project_cost,
        value_created,
        creates_value,
        value_to_cost,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Value-Add Underwriting (Direct Capitalisation at Exit)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn check_fraction(field: &str, value: Rate) -> EngineResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(WaterfallError::invalid(
            field,
            "Must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_input(input: &UnderwritingInput, warnings: &mut Vec<String>) -> EngineResult<()> {
    if input.units < 1 {
        return Err(WaterfallError::invalid("units", "Number of units must be at least 1"));
    }
    if input.current_rent <= Decimal::ZERO {
        return Err(WaterfallError::invalid("current_rent", "Rents must be greater than zero"));
    }
    if input.renovated_rent <= Decimal::ZERO {
        return Err(WaterfallError::invalid(
            "renovated_rent",
            "Rents must be greater than zero",
        ));
    }
    if input.purchase_price <= Decimal::ZERO {
        return Err(WaterfallError::invalid(
            "purchase_price",
            "Acquisition cost must be greater than zero",
        ));
    }
    if input.renovation_cost_per_unit < Decimal::ZERO {
        return Err(WaterfallError::invalid(
            "renovation_cost_per_unit",
            "Renovation cost cannot be negative",
        ));
    }
    check_fraction("occupancy_current", input.occupancy_current)?;
    check_fraction("occupancy_stabilized", input.occupancy_stabilized)?;
    check_fraction("expense_ratio", input.expense_ratio)?;

    if input.exit_cap_rate <= Decimal::ZERO {
        return Err(WaterfallError::invalid(
            "exit_cap_rate",
            "Exit cap rate must be greater than zero to value the property",
        ));
    }

    if input.occupancy_current.is_zero() || input.occupancy_stabilized.is_zero() {
        warnings.push("A 0% occupancy rate produces zero income".into());
    }
    if input.exit_cap_rate < dec!(0.03) {
        warnings.push(format!(
            "Exit cap rate {} is below 3% — unusually low, verify market data",
            input.exit_cap_rate
        ));
    }
    if input.exit_cap_rate > dec!(0.12) {
        warnings.push(format!(
            "Exit cap rate {} exceeds 12% — unusually high, may indicate elevated risk",
            input.exit_cap_rate
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
