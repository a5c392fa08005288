use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::WaterfallError;
use crate::time_value::equity_multiple;
use crate::types::*;
use crate::waterfall::assumptions::DebtTerms;
use crate::waterfall::projection::DebtSchedule;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Operating and capital assumptions for a flat annual pro forma.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProFormaInput {
    pub units: u32,
    /// Monthly rent per unit
    pub rent: Money,
    /// Economic occupancy (0.95 = 95%)
    pub occupancy: Rate,
    /// Operating expenses as a fraction of gross income
    pub expense_ratio: Rate,
    pub hold_period_years: u32,
    /// Loan amount drawn at acquisition
    pub debt: Money,
    pub debt_terms: DebtTerms,
    /// Gross sale price in the final year
    pub exit_value: Money,
    /// Equity invested at close; enables the equity multiple when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity_invested: Option<Money>,
}

/// One row of the annual operating statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProFormaRow {
    pub year: u32,
    pub gross_income: Money,
    pub operating_expenses: Money,
    pub noi: Money,
    pub debt_service: Money,
    pub sale_proceeds: Money,
    pub debt_repayment: Money,
    pub cash_flow_to_equity: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProFormaOutput {
    pub rows: Vec<ProFormaRow>,
    pub total_noi: Money,
    pub total_debt_service: Money,
    pub total_cash_flow_to_equity: Money,
    /// Year-one NOI / year-one debt service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dscr: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equity_multiple: Option<Multiple>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build a flat (no rent growth) annual pro forma over the hold period,
/// with sale proceeds and loan payoff landing in the final year.
pub fn build_pro_forma(input: &ProFormaInput) -> EngineResult<ComputationOutput<ProFormaOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;

    let gross_income =
        Decimal::from(input.units) * input.rent * dec!(12) * input.occupancy;
    let operating_expenses = gross_income * input.expense_ratio;
    let noi = gross_income - operating_expenses;

    let schedule = DebtSchedule::new(input.debt, &input.debt_terms)?;
    let hold = input.hold_period_years;

    let rows: Vec<ProFormaRow> = (1..=hold)
        .map(|year| {
            let debt_service = schedule.payment_in_year(year);
            let (sale_proceeds, debt_repayment) = if year == hold {
                (input.exit_value, schedule.balance_after_year(year))
            } else {
                (Decimal::ZERO, Decimal::ZERO)
            };
            ProFormaRow {
                year,
                gross_income,
                operating_expenses,
                noi,
                debt_service,
                sale_proceeds,
                debt_repayment,
                cash_flow_to_equity: noi - debt_service + sale_proceeds - debt_repayment,
            }
        })
        .collect();

    let total_noi: Money = rows.iter().map(|r| r.noi).sum();
    let total_debt_service: Money = rows.iter().map(|r| r.debt_service).sum();
    let total_cash_flow_to_equity: Money = rows.iter().map(|r| r.cash_flow_to_equity).sum();

    let dscr = rows
        .first()
        .filter(|r| r.debt_service > Decimal::ZERO)
        .map(|r| r.noi / r.debt_service);
    if let Some(d) = dscr {
        if d < Decimal::ONE {
            warnings.push(format!(
                "DSCR of {d:.2} is below 1.00x: NOI does not cover debt service"
            ));
        }
    }

    let equity_multiple = input.equity_invested.and_then(|equity| {
        let mut flows = Vec::with_capacity(rows.len() + 1);
        flows.push(-equity);
        flows.extend(rows.iter().map(|r| r.cash_flow_to_equity));
        equity_multiple(&flows)
    });

    let output = ProFormaOutput {
        rows,
        total_noi,
        total_debt_service,
        total_cash_flow_to_equity,
        dscr,
        equity_multiple,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Flat Annual Pro Forma (no growth, sale in final year)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

fn validate_input(input: &ProFormaInput) -> EngineResult<()> {
    if input.hold_period_years < 1 {
        return Err(WaterfallError::invalid(
            "hold_period_years",
            "Hold period must be at least 1 year",
        ));
    }
    if input.rent < Decimal::ZERO {
        return Err(WaterfallError::invalid("rent", "Rent cannot be negative"));
    }
    if input.occupancy < Decimal::ZERO || input.occupancy > Decimal::ONE {
        return Err(WaterfallError::invalid("occupancy", "Must be between 0 and 1"));
    }
    if input.expense_ratio < Decimal::ZERO || input.expense_ratio > Decimal::ONE {
        return Err(WaterfallError::invalid("expense_ratio", "Must be between 0 and 1"));
    }
    if input.debt < Decimal::ZERO {
        return Err(WaterfallError::invalid("debt", "Debt amount cannot be negative"));
    }
    if input.exit_value < Decimal::ZERO {
        return Err(WaterfallError::invalid("exit_value", "Exit value cannot be negative"));
    }
    input.debt_terms.validate()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_input() -> ProFormaInput {
        ProFormaInput {
            units: 10,
            rent: dec!(1200),
            occupancy: dec!(0.95),
            expense_ratio: dec!(0.40),
            hold_period_years: 5,
            debt: dec!(660000),
            debt_terms: DebtTerms::new_interest_only(dec!(0.05)),
            exit_value: dec!(1641600),
            equity_invested: None,
        }
    }

    #[test]
    fn test_rows_are_flat_until_sale() {
        let out = build_pro_forma(&sample_input()).unwrap();
        let rows = &out.result.rows;
        assert_eq!(rows.len(), 5);

        for row in &rows[..4] {
            assert_eq!(row.gross_income, dec!(136800));
            assert_eq!(row.noi, dec!(82080));
            assert_eq!(row.debt_service, dec!(33000));
            assert_eq!(row.sale_proceeds, Decimal::ZERO);
            assert_eq!(row.cash_flow_to_equity, dec!(49080));
        }

        let last = &rows[4];
        assert_eq!(last.sale_proceeds, dec!(1641600));
        assert_eq!(last.debt_repayment, dec!(660000));
        // 82,080 - 33,000 + 1,641,600 - 660,000
        assert_eq!(last.cash_flow_to_equity, dec!(1030680));
    }

    #[test]
    fn test_totals_and_dscr() {
        let out = build_pro_forma(&sample_input()).unwrap();
        let r = &out.result;
        assert_eq!(r.total_noi, dec!(410400));
        assert_eq!(r.total_debt_service, dec!(165000));
        assert_eq!(r.total_cash_flow_to_equity, dec!(1227000));
        // 82,080 / 33,000
        assert!((r.dscr.unwrap() - dec!(2.4873)).abs() < dec!(0.0001));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_equity_multiple_when_equity_given() {
        let mut input = sample_input();
        input.equity_invested = Some(dec!(440000));
        let out = build_pro_forma(&input).unwrap();
        let m = out.result.equity_multiple.unwrap();
        // 1,227,000 / 440,000
        assert!((m - dec!(2.7886)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_unlevered_has_no_dscr() {
        let mut input = sample_input();
        input.debt = Decimal::ZERO;
        let out = build_pro_forma(&input).unwrap();
        assert_eq!(out.result.dscr, None);
        assert_eq!(out.result.rows[4].cash_flow_to_equity, dec!(1723680));
    }

    #[test]
    fn test_amortizing_loan_repaid_at_balance() {
        let mut input = sample_input();
        input.debt_terms = DebtTerms {
            interest_rate: dec!(0.05),
            interest_only: false,
            amortization_years: Some(30),
        };
        let out = build_pro_forma(&input).unwrap();
        let last = &out.result.rows[4];
        assert!(last.debt_repayment < dec!(660000));
        assert!(last.debt_service > dec!(33000));
    }

    #[test]
    fn test_zero_hold_rejected() {
        let mut input = sample_input();
        input.hold_period_years = 0;
        match build_pro_forma(&input) {
            Err(WaterfallError::InvalidAssumption { field, .. }) => {
                assert_eq!(field, "hold_period_years")
            }
            other => panic!("Expected InvalidAssumption, got: {other:?}"),
        }
    }
}
