use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::assumptions::CapitalStack;
use super::projection::AnnualCashFlow;
use crate::error::WaterfallError;
use crate::types::*;
use crate::EngineResult;

/// Per-party cash-flow vectors used for rate-of-return extraction.
///
/// Index 0 holds the (negative) equity contribution; index `t` holds the
/// amount received in year `t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyCashFlows {
    pub lp: Vec<Money>,
    pub gp: Vec<Money>,
    /// `[-total_equity]` followed by each year's project cash to equity
    pub total_equity: Vec<Money>,
}

/// Split of the sale-year cash to equity by promote only.
pub fn sale_year_split(cash_to_equity: Money, promote_pct: Rate) -> (Money, Money) {
    let gp = cash_to_equity * promote_pct;
    (cash_to_equity - gp, gp)
}

/// Build LP, GP and total-equity vectors from the annual projection.
///
/// Interim years go entirely to the LP. The sale year is split
/// `(1 - promote)` / `promote` on the raw cash to equity; the tiered
/// waterfall is not consulted here.
pub fn build_party_cash_flows(
    stack: &CapitalStack,
    years: &[AnnualCashFlow],
    promote_pct: Rate,
) -> EngineResult<PartyCashFlows> {
    if years.is_empty() {
        return Err(WaterfallError::InsufficientData(
            "At least one projected year is required to build party cash flows".into(),
        ));
    }
    if promote_pct < Decimal::ZERO || promote_pct > Decimal::ONE {
        return Err(WaterfallError::invalid(
            "promote_pct",
            "Promote percentage must be between 0 and 1",
        ));
    }

    let n = years.len();
    let mut lp = Vec::with_capacity(n + 1);
    let mut gp = Vec::with_capacity(n + 1);
    let mut total_equity = Vec::with_capacity(n + 1);

    lp.push(-stack.lp_equity);
    gp.push(-stack.gp_equity);
    total_equity.push(-stack.total_equity);

    for (i, year) in years.iter().enumerate() {
        let (lp_share, gp_share) = if i == n - 1 {
            sale_year_split(year.cash_to_equity, promote_pct)
        } else {
            (year.cash_to_equity, Decimal::ZERO)
        };
        lp.push(lp_share);
        gp.push(gp_share);
        total_equity.push(year.cash_to_equity);
    }

    Ok(PartyCashFlows {
        lp,
        gp,
        total_equity,
    })
}
