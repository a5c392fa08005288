use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::WaterfallError;
use crate::types::*;
use crate::EngineResult;

pub const TIER_RETURN_OF_CAPITAL: &str = "Return of Capital (LP)";
pub const TIER_PREFERRED_RETURN: &str = "Preferred Return (LP)";
pub const TIER_CATCH_UP: &str = "GP Catch-Up";
pub const TIER_RESIDUAL: &str = "Residual Split";

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Input for the four-tier exit waterfall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionInput {
    /// LP capital contributed at acquisition
    pub lp_equity: Money,
    /// Simple annual preferred return owed to the LP
    pub pref_rate: Rate,
    /// Years the pref accrues over
    pub hold_period_years: u32,
    /// Cash available to equity at exit
    pub cash_to_equity: Money,
    /// GP share of the residual (and catch-up target ratio)
    pub promote_pct: Rate,
    /// GP capital contributed at acquisition
    pub gp_equity: Money,
    /// Run the GP catch-up tier
    #[serde(default)]
    pub enable_catchup: bool,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Result for a single waterfall tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierAllocation {
    pub tier_name: String,
    /// Total cash consumed by this tier
    pub amount: Money,
    pub to_lp: Money,
    pub to_gp: Money,
    /// Cash remaining after this tier
    pub remaining: Money,
}

/// Final tiered distribution outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallResult {
    /// Ordered tier table
    pub tiers: Vec<TierAllocation>,
    /// Tier 1
    pub lp_return_of_capital: Money,
    /// Tier 2
    pub lp_preferred_return: Money,
    /// Tier 3 (zero unless catch-up is enabled)
    pub gp_catch_up: Money,
    /// Tier 4, LP side
    pub lp_residual: Money,
    /// Tier 4, GP side
    pub gp_residual: Money,
    /// GP contributed capital, added back as a lump sum outside the tiers
    pub gp_capital_returned: Money,
    /// Exit cash actually run through the tiers (negative input clamps to zero)
    pub cash_distributed: Money,
    /// tier1 + tier2 + tier4 LP
    pub total_lp: Money,
    /// GP capital + tier3 + tier4 GP
    pub total_gp: Money,
}

impl WaterfallResult {
    /// Sum of all four tiers, excluding the GP capital add-back.
    pub fn tier_total(&self) -> Money {
        self.lp_return_of_capital
            + self.lp_preferred_return
            + self.gp_catch_up
            + self.lp_residual
            + self.gp_residual
    }
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

fn validate(input: &DistributionInput) -> EngineResult<()> {
    if input.lp_equity < Decimal::ZERO {
        return Err(WaterfallError::invalid("lp_equity", "LP equity cannot be negative"));
    }
    if input.gp_equity < Decimal::ZERO {
        return Err(WaterfallError::invalid("gp_equity", "GP equity cannot be negative"));
    }
    if input.pref_rate < Decimal::ZERO {
        return Err(WaterfallError::invalid(
            "pref_rate",
            "Preferred return cannot be negative",
        ));
    }
    if input.promote_pct < Decimal::ZERO || input.promote_pct > Decimal::ONE {
        return Err(WaterfallError::invalid(
            "promote_pct",
            "Promote percentage must be between 0 and 1",
        ));
    }
    if input.hold_period_years < 1 {
        return Err(WaterfallError::invalid(
            "hold_period_years",
            "Hold period must be at least 1 year",
        ));
    }
    Ok(())
}

/// Run exit cash through Return of Capital, Preferred Return, optional GP
/// Catch-Up and the Residual Split, each tier capped at the cash remaining.
///
/// The GP's own capital is not tiered: it is added to the GP total as a lump
/// sum. Exit cash at or below zero distributes nothing.
pub fn distribute(input: &DistributionInput) -> EngineResult<WaterfallResult> {
    validate(input)?;

    let promote = input.promote_pct;
    let mut remaining = input.cash_to_equity.max(Decimal::ZERO);
    let cash_distributed = remaining;
    let mut tiers = Vec::with_capacity(4);

    // Tier 1: Return of Capital
    let tier1 = input.lp_equity.min(remaining);
    remaining -= tier1;
    tiers.push(TierAllocation {
        tier_name: TIER_RETURN_OF_CAPITAL.into(),
        amount: tier1,
        to_lp: tier1,
        to_gp: Decimal::ZERO,
        remaining,
    });

    // Tier 2: Preferred Return (simple interest over the hold)
    let pref_owed = input.lp_equity * input.pref_rate * Decimal::from(input.hold_period_years);
    let tier2 = pref_owed.min(remaining);
    remaining -= tier2;
    tiers.push(TierAllocation {
        tier_name: TIER_PREFERRED_RETURN.into(),
        amount: tier2,
        to_lp: tier2,
        to_gp: Decimal::ZERO,
        remaining,
    });

    // Tier 3: GP Catch-Up
    let tier3 = if input.enable_catchup {
        // At or near 100% promote the GP takes everything left
        let target = if promote < Decimal::ONE {
            promote
                .checked_div(Decimal::ONE - promote)
                .and_then(|ratio| ratio.checked_mul(tier1 + tier2))
                .unwrap_or(remaining)
        } else {
            remaining
        };
        target.min(remaining).max(Decimal::ZERO)
    } else {
        Decimal::ZERO
    };
    remaining -= tier3;
    tiers.push(TierAllocation {
        tier_name: TIER_CATCH_UP.into(),
        amount: tier3,
        to_lp: Decimal::ZERO,
        to_gp: tier3,
        remaining,
    });

    // Tier 4: Residual Split
    let tier4_gp = remaining * promote;
    let tier4_lp = remaining - tier4_gp;
    tiers.push(TierAllocation {
        tier_name: TIER_RESIDUAL.into(),
        amount: remaining,
        to_lp: tier4_lp,
        to_gp: tier4_gp,
        remaining: Decimal::ZERO,
    });

    let total_lp = tier1 + tier2 + tier4_lp;
    let total_gp = input.gp_equity + tier3 + tier4_gp;

    debug!(
        cash_to_equity = %input.cash_to_equity,
        catch_up = input.enable_catchup,
        total_lp = %total_lp,
        total_gp = %total_gp,
        "distributed exit waterfall"
    );

    Ok(WaterfallResult {
        tiers,
        lp_return_of_capital: tier1,
        lp_preferred_return: tier2,
        gp_catch_up: tier3,
        lp_residual: tier4_lp,
        gp_residual: tier4_gp,
        gp_capital_returned: input.gp_equity,
        cash_distributed,
        total_lp,
        total_gp,
    })
}

/// Distribute exit cash and wrap the result in the standard envelope.
pub fn calculate_distribution(
    input: &DistributionInput,
) -> EngineResult<ComputationOutput<WaterfallResult>> {
    let start = Instant::now();
    let result = distribute(input)?;
    let warnings = distribution_warnings(input, &result);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Real Estate Equity Waterfall (ROC / Pref / Catch-Up / Residual)",
        input,
        warnings,
        elapsed,
        result,
    ))
}

pub(crate) fn distribution_warnings(
    input: &DistributionInput,
    result: &WaterfallResult,
) -> Vec<String> {
    let mut warnings = Vec::new();

    if input.cash_to_equity <= Decimal::ZERO {
        warnings.push(format!(
            "Exit cash to equity is {} — all tiers distribute zero",
            input.cash_to_equity
        ));
    }
    if result.gp_capital_returned > Decimal::ZERO
        && result.cash_distributed < result.total_lp + result.total_gp
    {
        warnings.push(
            "GP capital is added back outside the tiers; total distributions exceed exit cash"
                .into(),
        );
    }
    if result.lp_return_of_capital < input.lp_equity {
        warnings.push("LP capital not fully returned".into());
    } else if result.lp_preferred_return
        < input.lp_equity * input.pref_rate * Decimal::from(input.hold_period_years)
    {
        warnings.push("LP preferred return not fully paid".into());
    }
    if input.enable_catchup && input.promote_pct == Decimal::ONE {
        warnings.push("Promote is 100% — catch-up takes all remaining cash".into());
    }

    warnings
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
