use deal_waterfall_core::time_value::{compute_irr, equity_multiple, npv};
use deal_waterfall_core::waterfall::assumptions::{
    CapitalStack, DealAssumptions, DebtTerms, ExitCashBasis, WaterfallParams,
};
use deal_waterfall_core::waterfall::distribution::{distribute, DistributionInput};
use deal_waterfall_core::waterfall::engine::{analyze_deal, compute_waterfall, DealInput};
use deal_waterfall_core::waterfall::projection::{
    compute_cashflows, project_cash_flows, ProjectionInput,
};
use deal_waterfall_core::WaterfallError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Distribution tests
// ===========================================================================

fn reference_distribution() -> DistributionInput {
    DistributionInput {
        lp_equity: dec!(400_000),
        pref_rate: dec!(0.08),
        hold_period_years: 5,
        cash_to_equity: dec!(600_000),
        promote_pct: dec!(0.20),
        gp_equity: dec!(100_000),
        enable_catchup: false,
    }
}

#[test]
fn test_reference_waterfall() {
    let out = distribute(&reference_distribution()).unwrap();

    assert_eq!(out.lp_return_of_capital, dec!(400_000));
    assert_eq!(out.lp_preferred_return, dec!(160_000));
    assert_eq!(out.gp_catch_up, Decimal::ZERO);
    assert_eq!(out.lp_residual, dec!(32_000));
    assert_eq!(out.gp_residual, dec!(8_000));
    assert_eq!(out.total_lp, dec!(592_000));
    assert_eq!(out.total_gp, dec!(108_000));
}

#[test]
fn test_tier_table_order() {
    let out = distribute(&reference_distribution()).unwrap();
    let names: Vec<&str> = out.tiers.iter().map(|t| t.tier_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Return of Capital (LP)",
            "Preferred Return (LP)",
            "GP Catch-Up",
            "Residual Split",
        ]
    );
}

#[test]
fn test_tiers_never_exceed_cash_plus_gp_equity() {
    let mut input = reference_distribution();
    for catchup in [false, true] {
        for promote in [dec!(0), dec!(0.2), dec!(0.5), dec!(1)] {
            for cash in [dec!(-50_000), dec!(0), dec!(420_000), dec!(2_500_000)] {
                input.enable_catchup = catchup;
                input.promote_pct = promote;
                input.cash_to_equity = cash;
                let out = distribute(&input).unwrap();
                assert!(out.tier_total() <= cash.max(Decimal::ZERO) + input.gp_equity);
                assert!(out.total_lp + out.total_gp <= cash.max(Decimal::ZERO) + input.gp_equity);
            }
        }
    }
}

#[test]
fn test_zero_cash_distributes_nothing() {
    let mut input = reference_distribution();
    input.cash_to_equity = Decimal::ZERO;
    let out = distribute(&input).unwrap();
    assert!(out.tiers.iter().all(|t| t.amount.is_zero()));
}

// ===========================================================================
// Projection tests
// ===========================================================================

fn reference_assumptions() -> DealAssumptions {
    DealAssumptions {
        total_project_cost: dec!(1_000_000),
        stabilized_noi: dec!(50_000),
        hold_period_years: 5,
        stabilized_year: 2,
        exit_value: dec!(1_200_000),
    }
}

#[test]
fn test_noi_ramps_at_stabilization() {
    let years = project_cash_flows(
        &reference_assumptions(),
        dec!(500_000),
        &DebtTerms::new_interest_only(dec!(0.05)),
    )
    .unwrap();

    assert_eq!(years.len(), 5);
    assert_eq!(years[0].noi, Decimal::ZERO);
    for y in &years[1..] {
        assert_eq!(y.noi, dec!(50_000));
    }
    // Year 1 is a capital call: 0 - 25,000
    assert_eq!(years[0].cash_to_equity, dec!(-25_000));
}

#[test]
fn test_projection_envelope_flags_capital_call() {
    let input = ProjectionInput {
        assumptions: reference_assumptions(),
        debt: dec!(500_000),
        debt_terms: DebtTerms::new_interest_only(dec!(0.05)),
    };
    let out = compute_cashflows(&input).unwrap();
    assert_eq!(out.result.total_noi, dec!(200_000));
    // 50,000 - 25,000 + 1,200,000 - 500,000
    assert_eq!(out.result.terminal_cash_to_equity, dec!(725_000));
    assert!(out.warnings.iter().any(|w| w.starts_with("Year 1 cash to equity")));
}

#[test]
fn test_amortizing_debt_retires_principal() {
    let terms = DebtTerms {
        interest_rate: dec!(0.06),
        interest_only: false,
        amortization_years: Some(25),
    };
    let years = project_cash_flows(&reference_assumptions(), dec!(500_000), &terms).unwrap();
    let last = years.last().unwrap();
    assert!(last.debt_repayment > Decimal::ZERO);
    assert!(last.debt_repayment < dec!(500_000));
    assert!(years.iter().all(|y| y.debt_service > dec!(30_000)));
}

#[test]
fn test_invalid_hold_period() {
    let mut assumptions = reference_assumptions();
    assumptions.hold_period_years = 0;
    let result = project_cash_flows(
        &assumptions,
        dec!(500_000),
        &DebtTerms::new_interest_only(dec!(0.05)),
    );
    match result {
        Err(WaterfallError::InvalidAssumption { field, .. }) => {
            assert_eq!(field, "hold_period_years")
        }
        other => panic!("Expected InvalidAssumption, got: {other:?}"),
    }
}

// ===========================================================================
// Rate of return tests
// ===========================================================================

#[test]
fn test_irr_simple() {
    let irr = compute_irr(&[dec!(-100), dec!(110)]).unwrap();
    assert!((irr - dec!(0.10)).abs() < dec!(0.000001));
}

#[test]
fn test_irr_undefined_without_sign_change() {
    assert_eq!(compute_irr(&[dec!(0), dec!(10), dec!(20)]), None);
    assert_eq!(compute_irr(&[dec!(-10), dec!(-20)]), None);
    assert_eq!(compute_irr(&[dec!(-10)]), None);
}

#[test]
fn test_irr_zeroes_npv() {
    let flows = [dec!(-500_000), dec!(20_000), dec!(30_000), dec!(30_000), dec!(700_000)];
    let irr = compute_irr(&flows).unwrap();
    assert!(npv(irr, &flows).unwrap().abs() < dec!(0.01));
    assert_eq!(equity_multiple(&flows), Some(dec!(1.56)));
}

#[test]
fn test_irr_no_real_root_or_many_roots() {
    assert_eq!(compute_irr(&[dec!(-100), dec!(300), dec!(-250)]), None);

    let irr = compute_irr(&[dec!(-100), dec!(230), dec!(-132)]).unwrap();
    assert!(
        (irr - dec!(0.10)).abs() < dec!(0.000001) || (irr - dec!(0.20)).abs() < dec!(0.000001),
        "expected 10% or 20%, got {irr}"
    );
}

#[test]
fn test_irr_long_mixed_sign_series_stay_in_band() {
    // Deterministic LCG so the sweep is reproducible without a rand dependency
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    let mut next = move || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (state >> 33) as i64
    };

    for len in 11..=31 {
        for _ in 0..40 {
            let mut flows = vec![Decimal::from(-(next() % 1000 + 1) * 1000)];
            for _ in 1..len {
                flows.push(Decimal::from((next() % 2001 - 1000) * 1000));
            }
            if let Some(irr) = compute_irr(&flows) {
                assert!((dec!(-0.99)..=dec!(10)).contains(&irr), "{irr} for {flows:?}");
            }
        }
    }
}

// ===========================================================================
// End-to-end tests
// ===========================================================================

fn deal() -> DealInput {
    DealInput {
        assumptions: DealAssumptions {
            total_project_cost: dec!(1_000_000),
            stabilized_noi: dec!(80_000),
            hold_period_years: 5,
            stabilized_year: 2,
            exit_value: dec!(1_600_000),
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
fn test_analysis_matches_explicit_stack() {
    let input = deal();
    let out = analyze_deal(&input).unwrap();
    let stack = CapitalStack::from_ratios(dec!(1_000_000), dec!(0.6), dec!(0.1)).unwrap();
    let wf = compute_waterfall(&stack, &input.assumptions, &input.waterfall, &input.debt_terms)
        .unwrap();

    assert_eq!(out.result.capital_stack, stack);
    assert_eq!(out.result.waterfall, wf);
}

#[test]
fn test_party_vectors_are_hold_plus_one() {
    let out = analyze_deal(&deal()).unwrap();
    let flows = &out.result.party_cash_flows;
    assert_eq!(flows.lp.len(), 6);
    assert_eq!(flows.gp.len(), 6);
    assert_eq!(flows.lp[0], dec!(-360_000));
    assert_eq!(flows.gp[0], dec!(-40_000));
    // GP receives nothing before the sale year
    assert!(flows.gp[1..5].iter().all(|v| v.is_zero()));
}

#[test]
fn test_divergence_non_zero_with_pref() {
    let out = analyze_deal(&deal()).unwrap();
    assert!(out.result.sale_year_divergence.is_material());
}

#[test]
fn test_catchup_raises_gp_total() {
    let base = analyze_deal(&deal()).unwrap();
    let mut input = deal();
    input.waterfall.enable_catchup = true;
    let with_catchup = analyze_deal(&input).unwrap();

    assert!(with_catchup.result.waterfall.gp_catch_up > Decimal::ZERO);
    assert!(with_catchup.result.waterfall.total_gp > base.result.waterfall.total_gp);
    // The IRR vectors do not see the catch-up
    assert_eq!(
        with_catchup.result.party_cash_flows,
        base.result.party_cash_flows
    );
}

#[test]
fn test_envelope_metadata() {
    let out = analyze_deal(&deal()).unwrap();
    assert_eq!(out.metadata.precision, "rust_decimal_128bit");
    assert!(!out.methodology.is_empty());
    assert_eq!(out.assumptions["debt_ratio"], serde_json::json!("0.6"));
}
