use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::debug;

use crate::error::WaterfallError;
use crate::types::*;
use crate::waterfall::engine::{run_analysis, DealAnalysis, DealInput};
use crate::EngineResult;

/// Figure read from each deal run in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityMetric {
    LpIrr,
    GpIrr,
    TotalEquityIrr,
    TotalLp,
    TotalGp,
}

impl SensitivityMetric {
    fn read(self, analysis: &DealAnalysis) -> Option<Decimal> {
        match self {
            SensitivityMetric::LpIrr => analysis.returns.lp_irr,
            SensitivityMetric::GpIrr => analysis.returns.gp_irr,
            SensitivityMetric::TotalEquityIrr => analysis.returns.total_equity_irr,
            SensitivityMetric::TotalLp => Some(analysis.waterfall.total_lp),
            SensitivityMetric::TotalGp => Some(analysis.waterfall.total_gp),
        }
    }
}

impl fmt::Display for SensitivityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SensitivityMetric::LpIrr => "lp_irr",
            SensitivityMetric::GpIrr => "gp_irr",
            SensitivityMetric::TotalEquityIrr => "total_equity_irr",
            SensitivityMetric::TotalLp => "total_lp",
            SensitivityMetric::TotalGp => "total_gp",
        };
        f.write_str(s)
    }
}

/// Input for a one- or two-way sweep over deal inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    /// Base case deal
    pub base: DealInput,
    /// Row variable
    pub variable_1: SensitivityVariable,
    /// Column variable; a single column of base values when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_2: Option<SensitivityVariable>,
    pub output_metric: SensitivityMetric,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub variable_1_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_2_name: Option<String>,
    pub variable_1_values: Vec<Decimal>,
    /// Empty for a one-way sweep
    pub variable_2_values: Vec<Decimal>,
    pub output_metric: SensitivityMetric,
    /// Matrix[i][j] = metric when variable_1 = values_1[i] and variable_2 = values_2[j].
    /// `None` where the run failed or the metric is not computable.
    pub matrix: Vec<Vec<Option<Decimal>>>,
    /// Metric for the unmodified base deal
    pub base_case_value: Option<Decimal>,
}

/// Generate the sweep values for a sensitivity variable from min to max with step.
fn generate_sweep_values(var: &SensitivityVariable) -> EngineResult<Vec<Decimal>> {
    if var.step <= Decimal::ZERO {
        return Err(WaterfallError::invalid(
            format!("variable:{}", var.name),
            "Step must be positive",
        ));
    }
    if var.min > var.max {
        return Err(WaterfallError::invalid(
            format!("variable:{}", var.name),
            "Min must be <= max",
        ));
    }

    let mut values = Vec::new();
    let mut current = var.min;
    while current <= var.max {
        values.push(current);
        current += var.step;
    }
    // Include max if the step does not land on it
    if let Some(&last) = values.last() {
        if last < var.max {
            values.push(var.max);
        }
    }

    Ok(values)
}

/// Overwrite the named deal input.
fn apply_variable(input: &mut DealInput, name: &str, value: Decimal) -> EngineResult<()> {
    match name {
        "promote_pct" => input.waterfall.promote_pct = value,
        "pref_rate" => input.waterfall.pref_rate = value,
        "debt_ratio" => input.debt_ratio = value,
        "interest_rate" => input.debt_terms.interest_rate = value,
        "gp_equity_pct" => input.gp_equity_pct = value,
        "exit_value" => input.assumptions.exit_value = value,
        "stabilized_noi" => input.assumptions.stabilized_noi = value,
        other => {
            return Err(WaterfallError::invalid(
                format!("variable:{other}"),
                "Unknown sensitivity variable; expected one of promote_pct, pref_rate, \
                 debt_ratio, interest_rate, gp_equity_pct, exit_value, stabilized_noi",
            ))
        }
    }
    Ok(())
}

fn evaluate(input: &DealInput, metric: SensitivityMetric) -> EngineResult<Option<Decimal>> {
    let mut scratch = Vec::new();
    let analysis = run_analysis(input, &mut scratch)?;
    Ok(metric.read(&analysis))
}

/// Re-run the deal for every point of the sweep and tabulate one metric.
pub fn waterfall_sensitivity(
    input: &SensitivityInput,
) -> EngineResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let v1_values = generate_sweep_values(&input.variable_1)?;
    let v2_values = match &input.variable_2 {
        Some(var) => generate_sweep_values(var)?,
        None => Vec::new(),
    };

    // Reject unknown names up front rather than per cell
    let mut trial = input.base.clone();
    apply_variable(&mut trial, &input.variable_1.name, v1_values[0])?;
    if let (Some(var), Some(&v)) = (&input.variable_2, v2_values.first()) {
        apply_variable(&mut trial, &var.name, v)?;
    }

    let base_case_value = match evaluate(&input.base, input.output_metric) {
        Ok(v) => v,
        Err(e) => {
            warnings.push(format!("Base case evaluation failed: {e}"));
            None
        }
    };

    let mut matrix = Vec::with_capacity(v1_values.len());
    for &v1 in &v1_values {
        let mut deal = input.base.clone();
        apply_variable(&mut deal, &input.variable_1.name, v1)?;

        let row = match &input.variable_2 {
            None => vec![cell(&deal, input.output_metric, &[v1], &mut warnings)],
            Some(var) => {
                let mut row = Vec::with_capacity(v2_values.len());
                for &v2 in &v2_values {
                    let mut deal = deal.clone();
                    apply_variable(&mut deal, &var.name, v2)?;
                    row.push(cell(&deal, input.output_metric, &[v1, v2], &mut warnings));
                }
                row
            }
        };
        matrix.push(row);
    }

    debug!(
        rows = matrix.len(),
        cols = matrix.first().map(Vec::len).unwrap_or(0),
        metric = %input.output_metric,
        "evaluated sensitivity grid"
    );

    let output = SensitivityOutput {
        variable_1_name: input.variable_1.name.clone(),
        variable_2_name: input.variable_2.as_ref().map(|v| v.name.clone()),
        variable_1_values: v1_values,
        variable_2_values: v2_values,
        output_metric: input.output_metric,
        matrix,
        base_case_value,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Deal Waterfall Sensitivity Analysis",
        &serde_json::json!({
            "variable_1": input.variable_1.name,
            "variable_2": input.variable_2.as_ref().map(|v| &v.name),
            "output_metric": input.output_metric,
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn cell(
    deal: &DealInput,
    metric: SensitivityMetric,
    point: &[Decimal],
    warnings: &mut Vec<String>,
) -> Option<Decimal> {
    let at = point
        .iter()
        .map(Decimal::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    match evaluate(deal, metric) {
        Ok(Some(v)) => Some(v),
        Ok(None) => {
            warnings.push(format!("{metric} not computable at ({at})"));
            None
        }
        Err(e) => {
            warnings.push(format!("Evaluation failed at ({at}): {e}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waterfall::assumptions::{DealAssumptions, DebtTerms, ExitCashBasis, WaterfallParams};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn base_deal() -> DealInput {
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

    fn var(name: &str, min: Decimal, max: Decimal, step: Decimal) -> SensitivityVariable {
        SensitivityVariable {
            name: name.into(),
            min,
            max,
            step,
        }
    }

    #[test]
    fn test_one_way_promote_sweep() {
        let input = SensitivityInput {
            base: base_deal(),
            variable_1: var("promote_pct", dec!(0.1), dec!(0.3), dec!(0.1)),
            variable_2: None,
            output_metric: SensitivityMetric::TotalGp,
        };
        let out = waterfall_sensitivity(&input).unwrap();
        let r = &out.result;

        assert_eq!(r.variable_1_values, vec![dec!(0.1), dec!(0.2), dec!(0.3)]);
        assert!(r.variable_2_values.is_empty());
        // GP capital 40,000 + promote * residual 546,000
        assert_eq!(
            r.matrix,
            vec![
                vec![Some(dec!(94600))],
                vec![Some(dec!(149200))],
                vec![Some(dec!(203800))],
            ]
        );
        assert_eq!(r.base_case_value, Some(dec!(149200)));
    }

    #[test]
    fn test_two_way_grid_dimensions() {
        let input = SensitivityInput {
            base: base_deal(),
            variable_1: var("pref_rate", dec!(0.06), dec!(0.10), dec!(0.02)),
            variable_2: Some(var("promote_pct", dec!(0.1), dec!(0.3), dec!(0.1))),
            output_metric: SensitivityMetric::TotalLp,
        };
        let out = waterfall_sensitivity(&input).unwrap();
        let r = &out.result;

        assert_eq!(r.matrix.len(), 3);
        assert!(r.matrix.iter().all(|row| row.len() == 3));
        // pref 6%: 360,000 + 108,000 + 582,000 * 0.9
        assert_eq!(r.matrix[0][0], Some(dec!(991800)));
        // Higher promote always leaves less for the LP
        for row in &r.matrix {
            assert!(row[0] > row[1] && row[1] > row[2]);
        }
    }

    #[test]
    fn test_sweep_includes_max() {
        let v = var("exit_value", dec!(1), dec!(10), dec!(4));
        let vals = generate_sweep_values(&v).unwrap();
        assert_eq!(vals, vec![dec!(1), dec!(5), dec!(9), dec!(10)]);
    }

    #[test]
    fn test_non_positive_step_rejected() {
        let input = SensitivityInput {
            base: base_deal(),
            variable_1: var("promote_pct", dec!(0.1), dec!(0.3), Decimal::ZERO),
            variable_2: None,
            output_metric: SensitivityMetric::LpIrr,
        };
        assert!(matches!(
            waterfall_sensitivity(&input),
            Err(WaterfallError::InvalidAssumption { .. })
        ));
    }

    #[test]
    fn test_min_above_max_rejected() {
        let v = var("pref_rate", dec!(0.10), dec!(0.05), dec!(0.01));
        assert!(generate_sweep_values(&v).is_err());
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let input = SensitivityInput {
            base: base_deal(),
            variable_1: var("vacancy", dec!(0.1), dec!(0.2), dec!(0.1)),
            variable_2: None,
            output_metric: SensitivityMetric::LpIrr,
        };
        match waterfall_sensitivity(&input) {
            Err(WaterfallError::InvalidAssumption { field, .. }) => {
                assert_eq!(field, "variable:vacancy")
            }
            other => panic!("Expected InvalidAssumption, got: {other:?}"),
        }
    }

    #[test]
    fn test_failed_cells_are_none_with_warning() {
        // debt_ratio above 1 fails capital stack validation
        let input = SensitivityInput {
            base: base_deal(),
            variable_1: var("debt_ratio", dec!(0.6), dec!(1.2), dec!(0.6)),
            variable_2: None,
            output_metric: SensitivityMetric::TotalLp,
        };
        let out = waterfall_sensitivity(&input).unwrap();
        assert!(out.result.matrix[0][0].is_some());
        assert_eq!(out.result.matrix[1][0], None);
        assert!(out.warnings.iter().any(|w| w.starts_with("Evaluation failed")));
    }

    #[test]
    fn test_metric_serializes_snake_case() {
        let json = serde_json::to_string(&SensitivityMetric::TotalEquityIrr).unwrap();
        assert_eq!(json, "\"total_equity_irr\"");
    }
}
