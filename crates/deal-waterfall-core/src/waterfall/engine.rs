use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use super::assumptions::{CapitalStack, DealAssumptions, DebtTerms, ExitCashBasis, WaterfallParams};
use super::distribution::{distribute, distribution_warnings, DistributionInput, WaterfallResult};
use super::party_flows::{build_party_cash_flows, sale_year_split, PartyCashFlows};
use super::projection::{project_cash_flows, summarise, AnnualCashFlow, ProjectionOutput};
use super::returns::{extract_returns, ReturnMetrics};
use crate::error::WaterfallError;
use crate::types::*;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything needed for one end-to-end deal run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealInput {
    pub assumptions: DealAssumptions,
    /// Loan-to-cost ratio (0.60 = 60% debt)
    pub debt_ratio: Rate,
    /// GP share of the equity check
    pub gp_equity_pct: Rate,
    pub debt_terms: DebtTerms,
    pub waterfall: WaterfallParams,
}

/// How far the headline waterfall and the promote-only sale-year split
/// (used for the IRR vectors) disagree.
///
/// The GP capital add-back sits outside the tiers and has no counterpart in
/// the sale-year vector, so `gp_difference` is measured net of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleYearDivergence {
    /// Headline waterfall total to LP
    pub waterfall_lp: Money,
    /// Headline waterfall total to GP, including the GP capital add-back
    pub waterfall_gp: Money,
    /// GP capital returned alongside the tiers
    pub gp_capital_add_back: Money,
    /// LP sale-year amount in the IRR vector
    pub vector_lp: Money,
    /// GP sale-year amount in the IRR vector
    pub vector_gp: Money,
    pub lp_difference: Money,
    /// `waterfall_gp - gp_capital_add_back - vector_gp`
    pub gp_difference: Money,
}

impl SaleYearDivergence {
    pub fn is_material(&self) -> bool {
        !self.lp_difference.is_zero() || !self.gp_difference.is_zero()
    }
}

/// Full result of an end-to-end deal run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealAnalysis {
    pub capital_stack: CapitalStack,
    pub cash_flows: ProjectionOutput,
    /// Cash fed into the waterfall, per the selected exit-cash basis
    pub exit_cash_to_equity: Money,
    pub waterfall: WaterfallResult,
    pub party_cash_flows: PartyCashFlows,
    pub returns: ReturnMetrics,
    pub sale_year_divergence: SaleYearDivergence,
}

// ---------------------------------------------------------------------------
// Pipeline steps
// ---------------------------------------------------------------------------

/// Cash fed into the waterfall at exit.
pub fn exit_cash_to_equity(
    basis: ExitCashBasis,
    assumptions: &DealAssumptions,
    years: &[AnnualCashFlow],
) -> EngineResult<Money> {
    let last = years.last().ok_or_else(|| {
        WaterfallError::InsufficientData("Projection produced no years".into())
    })?;
    Ok(match basis {
        ExitCashBasis::TerminalYear => last.cash_to_equity,
        ExitCashBasis::SaleNetOfDebt => {
            assumptions.stabilized_noi + assumptions.exit_value - last.debt_repayment
        }
    })
}

fn distribution_input(
    stack: &CapitalStack,
    assumptions: &DealAssumptions,
    params: &WaterfallParams,
    cash_to_equity: Money,
) -> DistributionInput {
    DistributionInput {
        lp_equity: stack.lp_equity,
        pref_rate: params.pref_rate,
        hold_period_years: assumptions.hold_period_years,
        cash_to_equity,
        promote_pct: params.promote_pct,
        gp_equity: stack.gp_equity,
        enable_catchup: params.enable_catchup,
    }
}

/// Project the deal and run its exit waterfall for an explicit capital stack.
pub fn compute_waterfall(
    capital_stack: &CapitalStack,
    assumptions: &DealAssumptions,
    params: &WaterfallParams,
    debt_terms: &DebtTerms,
) -> EngineResult<WaterfallResult> {
    assumptions.validate()?;
    capital_stack.validate(assumptions.total_project_cost)?;
    params.validate()?;

    let years = project_cash_flows(assumptions, capital_stack.debt, debt_terms)?;
    let cash = exit_cash_to_equity(params.exit_cash_basis, assumptions, &years)?;
    distribute(&distribution_input(capital_stack, assumptions, params, cash))
}

/// Run the full pipeline without the output envelope.
pub fn run_analysis(input: &DealInput, warnings: &mut Vec<String>) -> EngineResult<DealAnalysis> {
    let assumptions = &input.assumptions;
    assumptions.validate()?;
    input.debt_terms.validate()?;
    input.waterfall.validate()?;

    let stack = CapitalStack::from_ratios(
        assumptions.total_project_cost,
        input.debt_ratio,
        input.gp_equity_pct,
    )?;
    debug!(
        equity = %stack.total_equity,
        debt = %stack.debt,
        "built capital stack"
    );

    if assumptions.stabilized_noi <= Decimal::ZERO {
        warnings.push("Stabilized NOI is not positive".into());
    }

    let years = project_cash_flows(assumptions, stack.debt, &input.debt_terms)?;
    let exit_cash = exit_cash_to_equity(input.waterfall.exit_cash_basis, assumptions, &years)?;

    let dist_input = distribution_input(&stack, assumptions, &input.waterfall, exit_cash);
    let waterfall = distribute(&dist_input)?;
    warnings.extend(distribution_warnings(&dist_input, &waterfall));

    let party_cash_flows = build_party_cash_flows(&stack, &years, input.waterfall.promote_pct)?;
    let returns = extract_returns(&party_cash_flows, warnings);

    let terminal = years.last().map(|y| y.cash_to_equity).unwrap_or_default();
    let (vector_lp, vector_gp) = sale_year_split(terminal, input.waterfall.promote_pct);
    let sale_year_divergence = SaleYearDivergence {
        waterfall_lp: waterfall.total_lp,
        waterfall_gp: waterfall.total_gp,
        gp_capital_add_back: waterfall.gp_capital_returned,
        vector_lp,
        vector_gp,
        lp_difference: waterfall.total_lp - vector_lp,
        gp_difference: waterfall.total_gp - waterfall.gp_capital_returned - vector_gp,
    };
    if sale_year_divergence.is_material() {
        warnings.push(format!(
            "Headline waterfall and IRR vectors split the sale year differently \
             (LP difference {:.2}, GP difference {:.2})",
            sale_year_divergence.lp_difference, sale_year_divergence.gp_difference
        ));
    }

    let cash_flows = summarise(years, warnings);

    Ok(DealAnalysis {
        capital_stack: stack,
        cash_flows,
        exit_cash_to_equity: exit_cash,
        waterfall,
        party_cash_flows,
        returns,
        sale_year_divergence,
    })
}

/// End-to-end deal analysis: capital stack, annual projection, exit
/// waterfall, per-party cash flows and IRRs.
pub fn analyze_deal(input: &DealInput) -> EngineResult<ComputationOutput<DealAnalysis>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let analysis = run_analysis(input, &mut warnings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Real Estate Equity Waterfall with Annual Projection and IRR",
        input,
        warnings,
        elapsed,
        analysis,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn deal_input() -> DealInput {
        DealInput {
            assumptions: DealAssumptions {
                total_project_cost: dec!(1000000),
                stabilized_noi: dec!(80000),
                hold_period_years: 5,
                stabilized_year: 2,
                exit_value: dec!(1600000),
            },
            debt_ratio: dec!(0.6),
            gp_equity_pct: dec!(0.1),
            debt_terms: DebtTerms::new_interest_only(dec!(0.05)),
            waterfall: WaterfallParams {
                pref_rate: dec!(0.08),
                promote_pct: dec!(0.2),
                enable_catchup: false,
                exit_cash_basis: ExitCashBasis::TerminalYear,
            },
        }
    }

    #[test]
    fn test_exit_cash_terminal_year() {
        let out = analyze_deal(&deal_input()).unwrap();
        let res = &out.result;

        // Debt 600,000, service 30,000
        // Year 5: 80,000 + 1,600,000 - 30,000 - 600,000
        assert_eq!(res.exit_cash_to_equity, dec!(1050000));
        assert_eq!(res.cash_flows.terminal_cash_to_equity, dec!(1050000));
        assert_eq!(res.waterfall.cash_distributed, dec!(1050000));
    }

    #[test]
    fn test_exit_cash_sale_net_of_debt() {
        let mut input = deal_input();
        input.waterfall.exit_cash_basis = ExitCashBasis::SaleNetOfDebt;
        let out = analyze_deal(&input).unwrap();
        // 80,000 + 1,600,000 - 600,000
        assert_eq!(out.result.exit_cash_to_equity, dec!(1080000));
    }

    #[test]
    fn test_pipeline_waterfall_values() {
        let out = analyze_deal(&deal_input()).unwrap();
        let wf = &out.result.waterfall;

        // Equity 400,000: LP 360,000, GP 40,000
        assert_eq!(wf.lp_return_of_capital, dec!(360000));
        // 360,000 * 8% * 5
        assert_eq!(wf.lp_preferred_return, dec!(144000));
        // Residual 1,050,000 - 504,000 = 546,000
        assert_eq!(wf.lp_residual, dec!(436800));
        assert_eq!(wf.gp_residual, dec!(109200));
        assert_eq!(wf.total_gp, dec!(149200));
    }

    #[test]
    fn test_returns_are_computed() {
        let out = analyze_deal(&deal_input()).unwrap();
        let r = &out.result.returns;
        assert!(r.lp_irr.is_some());
        assert!(r.gp_irr.is_some());
        let total = r.total_equity_irr.unwrap();
        assert!(total > dec!(0.15) && total < dec!(0.30), "got {total}");
    }

    #[test]
    fn test_divergence_is_reported_not_unified() {
        let out = analyze_deal(&deal_input()).unwrap();
        let div = &out.result.sale_year_divergence;

        // Vector split: 1,050,000 * 0.8 / 0.2
        assert_eq!(div.vector_lp, dec!(840000));
        assert_eq!(div.vector_gp, dec!(210000));
        assert_eq!(div.waterfall_lp, dec!(940800));
        assert_eq!(div.gp_capital_add_back, dec!(40000));
        // 149,200 - 40,000 - 210,000
        assert_eq!(div.gp_difference, dec!(-100800));
        assert!(div.is_material());
        assert!(out
            .warnings
            .iter()
            .any(|w| w.contains("split the sale year differently")));
        // The IRR vector keeps the promote-only split
        assert_eq!(out.result.party_cash_flows.lp[5], dec!(840000));
    }

    #[test]
    fn test_all_gp_equity_splits_agree() {
        // No LP capital means no ROC or pref; only the residual split remains
        let mut input = deal_input();
        input.gp_equity_pct = dec!(1);
        let out = analyze_deal(&input).unwrap();
        let div = &out.result.sale_year_divergence;

        assert_eq!(div.gp_capital_add_back, dec!(400000));
        assert_eq!(div.lp_difference, Decimal::ZERO);
        assert_eq!(div.gp_difference, Decimal::ZERO);
        assert!(!div.is_material());
        assert!(!out
            .warnings
            .iter()
            .any(|w| w.contains("split the sale year differently")));
    }

    #[test]
    fn test_compute_waterfall_with_explicit_stack() {
        let input = deal_input();
        let stack = CapitalStack::from_ratios(dec!(1000000), dec!(0.6), dec!(0.1)).unwrap();
        let wf = compute_waterfall(&stack, &input.assumptions, &input.waterfall, &input.debt_terms)
            .unwrap();
        assert_eq!(wf.total_lp, dec!(940800));
    }

    #[test]
    fn test_compute_waterfall_rejects_mismatched_stack() {
        let input = deal_input();
        let stack = CapitalStack::from_ratios(dec!(2000000), dec!(0.6), dec!(0.1)).unwrap();
        let result =
            compute_waterfall(&stack, &input.assumptions, &input.waterfall, &input.debt_terms);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_stabilized_year_fails_before_projection() {
        let mut input = deal_input();
        input.assumptions.stabilized_year = 9;
        match analyze_deal(&input) {
            Err(WaterfallError::InvalidAssumption { field, .. }) => {
                assert_eq!(field, "stabilized_year")
            }
            other => panic!("Expected InvalidAssumption, got: {other:?}"),
        }
    }

    #[test]
    fn test_underwater_exit_collapses_waterfall() {
        let mut input = deal_input();
        input.assumptions.exit_value = dec!(400000);
        let out = analyze_deal(&input).unwrap();
        // 80,000 + 400,000 - 30,000 - 600,000 < 0
        assert!(out.result.exit_cash_to_equity < Decimal::ZERO);
        assert_eq!(out.result.waterfall.tier_total(), Decimal::ZERO);
        assert_eq!(out.result.returns.gp_irr, None);
    }

    #[test]
    fn test_underwater_exit_warns_once() {
        let mut input = deal_input();
        input.assumptions.exit_value = dec!(400000);
        let out = analyze_deal(&input).unwrap();
        let exit_warnings: Vec<&String> = out
            .warnings
            .iter()
            .filter(|w| w.contains("distribute"))
            .collect();
        assert_eq!(exit_warnings.len(), 1, "{:?}", out.warnings);
        assert!(exit_warnings[0].starts_with("Exit cash to equity is"));
    }
}
