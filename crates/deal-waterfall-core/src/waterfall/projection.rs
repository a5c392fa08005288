use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use super::assumptions::{DealAssumptions, DebtTerms};
use crate::error::WaterfallError;
use crate::time_value::{level_payment, remaining_balance};
use crate::types::*;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One year's project-level cash result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualCashFlow {
    /// 1-based year index
    pub year: u32,
    /// Net operating income earned in the year
    pub noi: Money,
    /// Scheduled interest (and principal, if amortizing) paid in the year
    pub debt_service: Money,
    /// Sale price, final year only
    pub sale_proceeds: Money,
    /// Outstanding loan repaid at sale, final year only
    pub debt_repayment: Money,
    /// NOI - debt service (+ sale proceeds - debt repayment in the final year)
    pub cash_to_equity: Money,
}

/// Input for a standalone cash-flow projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionInput {
    pub assumptions: DealAssumptions,
    /// Loan amount drawn at acquisition
    pub debt: Money,
    pub debt_terms: DebtTerms,
}

/// Annual schedule plus summary figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionOutput {
    pub years: Vec<AnnualCashFlow>,
    pub total_noi: Money,
    pub total_debt_service: Money,
    pub total_cash_to_equity: Money,
    /// Cash to equity in the sale year
    pub terminal_cash_to_equity: Money,
    /// Lowest NOI / debt service over the stabilized years
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_dscr: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Build the ordered annual schedule for the hold period.
///
/// NOI is zero before `stabilized_year` and flat afterwards. Interest-only
/// debt pays `debt * rate` each year and the full principal at sale; amortizing
/// debt pays a level annual amount and repays the remaining balance at sale.
pub fn project_cash_flows(
    assumptions: &DealAssumptions,
    debt: Money,
    terms: &DebtTerms,
) -> EngineResult<Vec<AnnualCashFlow>> {
    assumptions.validate()?;
    terms.validate()?;
    if debt < Decimal::ZERO {
        return Err(WaterfallError::invalid("debt", "Debt amount cannot be negative"));
    }

    let hold = assumptions.hold_period_years;
    let schedule = DebtSchedule::new(debt, terms)?;
    let mut years = Vec::with_capacity(hold as usize);

    for year in 1..=hold {
        let noi = if year >= assumptions.stabilized_year {
            assumptions.stabilized_noi
        } else {
            Decimal::ZERO
        };
        let debt_service = schedule.payment_in_year(year);

        let (sale_proceeds, debt_repayment) = if year == hold {
            (assumptions.exit_value, schedule.balance_after_year(year))
        } else {
            (Decimal::ZERO, Decimal::ZERO)
        };

        years.push(AnnualCashFlow {
            year,
            noi,
            debt_service,
            sale_proceeds,
            debt_repayment,
            cash_to_equity: noi - debt_service + sale_proceeds - debt_repayment,
        });
    }

    debug!(
        hold_period = hold,
        debt = %debt,
        interest_only = terms.interest_only,
        "projected annual cash flows"
    );

    Ok(years)
}

/// Annual debt service and balances for either repayment profile.
pub(crate) struct DebtSchedule {
    principal: Money,
    rate: Rate,
    /// Level payment and term for amortizing loans; `None` for interest-only
    amortizing: Option<(Money, u32)>,
}

impl DebtSchedule {
    pub(crate) fn new(principal: Money, terms: &DebtTerms) -> EngineResult<Self> {
        let amortizing = if terms.interest_only {
            None
        } else {
            let years = terms.amortization_years.unwrap_or(1);
            Some((level_payment(principal, terms.interest_rate, years)?, years))
        };
        Ok(DebtSchedule {
            principal,
            rate: terms.interest_rate,
            amortizing,
        })
    }

    pub(crate) fn balance_after_year(&self, year: u32) -> Money {
        match self.amortizing {
            None => self.principal,
            Some((_, term)) if year >= term => Decimal::ZERO,
            Some((payment, _)) => remaining_balance(self.principal, self.rate, payment, year),
        }
    }

    pub(crate) fn payment_in_year(&self, year: u32) -> Money {
        match self.amortizing {
            None => self.principal * self.rate,
            Some((_, term)) if year > term => Decimal::ZERO,
            Some((payment, _)) => payment,
        }
    }
}

/// Project annual cash flows and wrap them in the standard output envelope.
pub fn compute_cashflows(
    input: &ProjectionInput,
) -> EngineResult<ComputationOutput<ProjectionOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let years = project_cash_flows(&input.assumptions, input.debt, &input.debt_terms)?;
    let output = summarise(years, &mut warnings);
    // The full analysis reports this through the waterfall instead
    if output.terminal_cash_to_equity <= Decimal::ZERO {
        warnings.push(
            "Sale-year cash to equity is not positive — waterfall will distribute nothing".into(),
        );
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Annual Project Cash-Flow Projection (flat stabilized NOI)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

pub(crate) fn summarise(
    years: Vec<AnnualCashFlow>,
    warnings: &mut Vec<String>,
) -> ProjectionOutput {
    let total_noi: Money = years.iter().map(|y| y.noi).sum();
    let total_debt_service: Money = years.iter().map(|y| y.debt_service).sum();
    let total_cash_to_equity: Money = years.iter().map(|y| y.cash_to_equity).sum();
    let terminal_cash_to_equity = years.last().map(|y| y.cash_to_equity).unwrap_or_default();

    let min_dscr = years
        .iter()
        .filter(|y| y.noi > Decimal::ZERO && y.debt_service > Decimal::ZERO)
        .map(|y| y.noi / y.debt_service)
        .min();

    if let Some(dscr) = min_dscr {
        if dscr < dec!(1.2) {
            warnings.push(format!(
                "Minimum DSCR of {dscr:.2} is below 1.20x — lender covenant risk"
            ));
        }
    }

    let last_year = years.len() as u32;
    for y in years.iter().filter(|y| y.year < last_year) {
        if y.cash_to_equity < Decimal::ZERO {
            warnings.push(format!(
                "Year {} cash to equity is negative ({:.0}) — implies an equity capital call",
                y.year, y.cash_to_equity
            ));
        }
    }

    ProjectionOutput {
        years,
        total_noi,
        total_debt_service,
        total_cash_to_equity,
        terminal_cash_to_equity,
        min_dscr,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
