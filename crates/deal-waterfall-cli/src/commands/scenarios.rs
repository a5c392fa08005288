use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use deal_waterfall_core::scenarios::sensitivity::{
    self, SensitivityInput, SensitivityMetric,
};
use deal_waterfall_core::waterfall::engine::DealInput;
use deal_waterfall_core::SensitivityVariable;

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MetricArg {
    LpIrr,
    GpIrr,
    TotalEquityIrr,
    TotalLp,
    TotalGp,
}

impl From<MetricArg> for SensitivityMetric {
    fn from(m: MetricArg) -> Self {
        match m {
            MetricArg::LpIrr => SensitivityMetric::LpIrr,
            MetricArg::GpIrr => SensitivityMetric::GpIrr,
            MetricArg::TotalEquityIrr => SensitivityMetric::TotalEquityIrr,
            MetricArg::TotalLp => SensitivityMetric::TotalLp,
            MetricArg::TotalGp => SensitivityMetric::TotalGp,
        }
    }
}

/// Arguments for deal sensitivity analysis
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to a full sensitivity input file (base deal, variables, metric)
    #[arg(long, conflicts_with = "base")]
    pub input: Option<String>,

    /// Path to the base deal file, used with --var1/--var2/--metric
    #[arg(long)]
    pub base: Option<String>,

    /// First variable in format name:min:max:step
    /// (e.g. "promote_pct:0.10:0.30:0.05")
    #[arg(long)]
    pub var1: Option<String>,

    /// Second variable (optional, creates a 2D grid)
    #[arg(long)]
    pub var2: Option<String>,

    /// Metric read from each run
    #[arg(long, value_enum, default_value = "lp-irr")]
    pub metric: MetricArg,
}

fn parse_sens_var(spec: &str) -> Result<SensitivityVariable, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() != 4 {
        return Err(format!(
            "Sensitivity variable must be name:min:max:step, got '{}'",
            spec
        )
        .into());
    }
    Ok(SensitivityVariable {
        name: parts[0].to_string(),
        min: parts[1].parse::<Decimal>()?,
        max: parts[2].parse::<Decimal>()?,
        step: parts[3].parse::<Decimal>()?,
    })
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let sens_input: SensitivityInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else {
        let base: DealInput = input::load(args.base.as_deref())?
            .ok_or("--base <deal.json|deal.yaml> or stdin required (or provide --input)")?;
        let var1 = args
            .var1
            .as_deref()
            .ok_or("--var1 is required (or provide --input)")?;
        SensitivityInput {
            base,
            variable_1: parse_sens_var(var1)?,
            variable_2: args.var2.as_deref().map(parse_sens_var).transpose()?,
            output_metric: args.metric.into(),
        }
    };

    let result = sensitivity::waterfall_sensitivity(&sens_input)?;
    Ok(serde_json::to_value(result)?)
}
