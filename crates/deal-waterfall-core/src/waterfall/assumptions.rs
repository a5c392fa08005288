use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::WaterfallError;
use crate::types::*;
use crate::EngineResult;

/// Tolerance for the capital-stack money identities (cents).
const STACK_TOLERANCE: Decimal = dec!(0.01);
const SHARE_TOLERANCE: Decimal = dec!(0.0000001);

// ---------------------------------------------------------------------------
// Deal-level assumptions
// ---------------------------------------------------------------------------

/// Static inputs describing the investment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealAssumptions {
    /// Acquisition plus renovation cost
    pub total_project_cost: Money,
    /// Net operating income once the property is stabilized
    pub stabilized_noi: Money,
    /// Years from acquisition to sale
    pub hold_period_years: u32,
    /// First year (1-based) in which stabilized NOI is earned
    pub stabilized_year: u32,
    /// Gross sale price at the end of the hold
    pub exit_value: Money,
}

impl DealAssumptions {
    pub fn validate(&self) -> EngineResult<()> {
        if self.hold_period_years < 1 {
            return Err(WaterfallError::invalid(
                "hold_period_years",
                "Hold period must be at least 1 year",
            ));
        }
        if self.stabilized_year < 1 || self.stabilized_year > self.hold_period_years {
            return Err(WaterfallError::invalid(
                "stabilized_year",
                format!(
                    "Stabilized year must be between 1 and the hold period ({})",
                    self.hold_period_years
                ),
            ));
        }
        if self.total_project_cost <= Decimal::ZERO {
            return Err(WaterfallError::invalid(
                "total_project_cost",
                "Total project cost must be positive",
            ));
        }
        if self.exit_value < Decimal::ZERO {
            return Err(WaterfallError::invalid(
                "exit_value",
                "Exit value cannot be negative",
            ));
        }
        Ok(())
    }

    pub fn hold_period(&self) -> Decimal {
        Decimal::from(self.hold_period_years)
    }
}

// ---------------------------------------------------------------------------
// Capital stack
// ---------------------------------------------------------------------------

/// Split of financing sources between debt and GP/LP equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalStack {
    pub total_equity: Money,
    pub debt: Money,
    /// GP share of equity (0.10 = 10%)
    pub gp_equity_pct: Rate,
    /// LP share of equity
    pub lp_equity_pct: Rate,
    pub gp_equity: Money,
    pub lp_equity: Money,
}

impl CapitalStack {
    /// Build the stack from a project cost, loan-to-cost ratio and GP share.
    pub fn from_ratios(
        total_project_cost: Money,
        debt_ratio: Rate,
        gp_equity_pct: Rate,
    ) -> EngineResult<Self> {
        if total_project_cost <= Decimal::ZERO {
            return Err(WaterfallError::invalid(
                "total_project_cost",
                "Total project cost must be positive",
            ));
        }
        if debt_ratio < Decimal::ZERO || debt_ratio > Decimal::ONE {
            return Err(WaterfallError::invalid(
                "debt_ratio",
                "Debt ratio must be between 0 and 1",
            ));
        }
        if gp_equity_pct < Decimal::ZERO || gp_equity_pct > Decimal::ONE {
            return Err(WaterfallError::invalid(
                "gp_equity_pct",
                "GP equity percentage must be between 0 and 1",
            ));
        }

        let debt = total_project_cost * debt_ratio;
        let total_equity = total_project_cost - debt;
        let lp_equity_pct = Decimal::ONE - gp_equity_pct;

        Ok(CapitalStack {
            total_equity,
            debt,
            gp_equity_pct,
            lp_equity_pct,
            gp_equity: total_equity * gp_equity_pct,
            lp_equity: total_equity * lp_equity_pct,
        })
    }

    /// Check the stack identities against the deal it finances.
    pub fn validate(&self, total_project_cost: Money) -> EngineResult<()> {
        if self.debt < Decimal::ZERO
            || self.gp_equity < Decimal::ZERO
            || self.lp_equity < Decimal::ZERO
        {
            return Err(WaterfallError::invalid(
                "capital_stack",
                "Debt and equity amounts cannot be negative",
            ));
        }
        if (self.gp_equity_pct + self.lp_equity_pct - Decimal::ONE).abs() > SHARE_TOLERANCE {
            return Err(WaterfallError::invalid(
                "capital_stack",
                "GP and LP equity shares must sum to 1",
            ));
        }
        if (self.gp_equity + self.lp_equity - self.total_equity).abs() > STACK_TOLERANCE {
            return Err(WaterfallError::invalid(
                "capital_stack",
                "GP and LP equity must sum to total equity",
            ));
        }
        if (self.total_equity + self.debt - total_project_cost).abs() > STACK_TOLERANCE {
            return Err(WaterfallError::invalid(
                "capital_stack",
                format!(
                    "Equity ({}) plus debt ({}) must equal total project cost ({})",
                    self.total_equity, self.debt, total_project_cost
                ),
            ));
        }
        Ok(())
    }

    /// Debt as a fraction of total capitalisation.
    pub fn loan_to_cost(&self) -> Rate {
        let total = self.total_equity + self.debt;
        if total.is_zero() {
            Decimal::ZERO
        } else {
            self.debt / total
        }
    }
}

// ---------------------------------------------------------------------------
// Debt and waterfall parameters
// ---------------------------------------------------------------------------

fn default_interest_only() -> bool {
    true
}

/// Loan terms for the project debt. The amount comes from the capital stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtTerms {
    /// Annual interest rate
    pub interest_rate: Rate,
    /// Interest-only with a balloon at sale (default) or level amortization
    #[serde(default = "default_interest_only")]
    pub interest_only: bool,
    /// Amortization period in years; required when not interest-only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amortization_years: Option<u32>,
}

impl DebtTerms {
    pub fn new_interest_only(interest_rate: Rate) -> Self {
        DebtTerms {
            interest_rate,
            interest_only: true,
            amortization_years: None,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.interest_rate < Decimal::ZERO {
            return Err(WaterfallError::invalid(
                "interest_rate",
                "Interest rate cannot be negative",
            ));
        }
        if !self.interest_only {
            match self.amortization_years {
                Some(years) if years >= 1 => {}
                _ => {
                    return Err(WaterfallError::invalid(
                        "amortization_years",
                        "Amortizing debt requires an amortization period of at least 1 year",
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Which figure feeds the waterfall as exit cash to equity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCashBasis {
    /// Final projection year's cash to equity (NOI + sale - debt service - payoff)
    #[default]
    TerminalYear,
    /// Stabilized NOI + sale - debt payoff, without the final year's debt service
    SaleNetOfDebt,
}

/// Promote structure and tier toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallParams {
    /// LP preferred return, simple annual rate
    pub pref_rate: Rate,
    /// GP share of profits above the pref (0.20 = 20%)
    pub promote_pct: Rate,
    /// Run the GP catch-up tier before the residual split
    #[serde(default)]
    pub enable_catchup: bool,
    #[serde(default)]
    pub exit_cash_basis: ExitCashBasis,
}

impl WaterfallParams {
    pub fn validate(&self) -> EngineResult<()> {
        if self.pref_rate < Decimal::ZERO {
            return Err(WaterfallError::invalid(
                "pref_rate",
                "Preferred return cannot be negative",
            ));
        }
        if self.promote_pct < Decimal::ZERO || self.promote_pct > Decimal::ONE {
            return Err(WaterfallError::invalid(
                "promote_pct",
                "Promote percentage must be between 0 and 1",
            ));
        }
        Ok(())
    }
}
