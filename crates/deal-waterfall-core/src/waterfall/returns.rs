use serde::{Deserialize, Serialize};
use tracing::warn;

use super::party_flows::PartyCashFlows;
use crate::time_value::{compute_irr, equity_multiple};
use crate::types::*;

/// Annualised returns for each counterparty and for total equity.
///
/// An IRR of `None` means the rate could not be computed for that vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnMetrics {
    pub lp_irr: Option<Rate>,
    pub gp_irr: Option<Rate>,
    pub total_equity_irr: Option<Rate>,
    pub lp_equity_multiple: Option<Multiple>,
    pub gp_equity_multiple: Option<Multiple>,
    pub total_equity_multiple: Option<Multiple>,
}

/// Extract IRR and equity multiple from each vector, recording a warning for
/// every IRR that is not computable.
pub fn extract_returns(flows: &PartyCashFlows, warnings: &mut Vec<String>) -> ReturnMetrics {
    let lp_irr = irr_or_warn("LP", &flows.lp, warnings);
    let gp_irr = irr_or_warn("GP", &flows.gp, warnings);
    let total_equity_irr = irr_or_warn("Total equity", &flows.total_equity, warnings);

    ReturnMetrics {
        lp_irr,
        gp_irr,
        total_equity_irr,
        lp_equity_multiple: equity_multiple(&flows.lp),
        gp_equity_multiple: equity_multiple(&flows.gp),
        total_equity_multiple: equity_multiple(&flows.total_equity),
    }
}

fn irr_or_warn(label: &str, cash_flows: &[Money], warnings: &mut Vec<String>) -> Option<Rate> {
    let irr = compute_irr(cash_flows);
    if irr.is_none() {
        warn!(party = label, "IRR not computable");
        warnings.push(format!(
            "{label} IRR not computable: cash flows have no sign change or no real root"
        ));
    }
    irr
}
