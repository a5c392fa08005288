use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::WaterfallError;
use crate::types::{Money, Multiple, Rate};
use crate::EngineResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const BISECTION_WIDTH: Decimal = dec!(0.000000000001);
const MAX_IRR_ITERATIONS: u32 = 100;
const MAX_BISECTION_ITERATIONS: u32 = 200;
const MIN_RATE: Decimal = dec!(-0.99);
const MAX_RATE: Decimal = dec!(10);
const DEFAULT_GUESS: Decimal = dec!(0.10);

/// Net Present Value of a series of annual cash flows (index 0 undiscounted).
pub fn npv(rate: Rate, cash_flows: &[Money]) -> EngineResult<Money> {
    if rate <= dec!(-1) {
        return Err(WaterfallError::invalid(
            "rate",
            "Discount rate must be greater than -100%",
        ));
    }

    npv_and_derivative(rate, cash_flows)
        .map(|(value, _)| value)
        .ok_or_else(|| WaterfallError::DivisionByZero {
            context: format!("NPV discount factor at rate {rate}"),
        })
}

/// NPV and dNPV/dr at `rate`.
///
/// Discount factors are built by repeated multiplication. Once a factor
/// overflows the remaining terms are below Decimal resolution and are
/// dropped; a factor that underflows to zero, or a running sum that
/// overflows, makes the point unevaluable.
fn npv_and_derivative(rate: Rate, cash_flows: &[Money]) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    let mut value = Decimal::ZERO;
    let mut derivative = Decimal::ZERO;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = match discount.checked_mul(one_plus_r) {
                Some(d) => d,
                None => break,
            };
        }
        if discount.is_zero() {
            return None;
        }
        value = value.checked_add(cf.checked_div(discount)?)?;
        if t > 0 {
            let next = discount.checked_mul(one_plus_r).unwrap_or(Decimal::MAX);
            let t_dec = Decimal::from(t as i64);
            let term = t_dec.checked_mul(*cf)?.checked_div(next)?;
            derivative = derivative.checked_sub(term)?;
        }
    }

    Some((value, derivative))
}

/// True when the series holds at least one strictly negative and one
/// strictly positive flow.
pub fn has_sign_change(cash_flows: &[Money]) -> bool {
    let has_negative = cash_flows.iter().any(|cf| cf.is_sign_negative() && !cf.is_zero());
    let has_positive = cash_flows.iter().any(|cf| cf.is_sign_positive() && !cf.is_zero());
    has_negative && has_positive
}

/// Internal Rate of Return using Newton-Raphson, with a bisection fallback
/// when Newton stalls or leaves the [-99%, 1000%] band.
pub fn irr(cash_flows: &[Money], guess: Rate) -> EngineResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(WaterfallError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }
    if !has_sign_change(cash_flows) {
        return Err(WaterfallError::InsufficientData(
            "IRR requires at least one negative and one positive cash flow".into(),
        ));
    }

    let mut rate = guess.clamp(MIN_RATE, MAX_RATE);
    let mut last_delta = Decimal::MAX;

    for _ in 0..MAX_IRR_ITERATIONS {
        let Some((npv_val, dnpv)) = npv_and_derivative(rate, cash_flows) else {
            break;
        };
        last_delta = npv_val;

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Ok(rate);
        }
        if dnpv.is_zero() {
            break;
        }

        let Some(next) = npv_val.checked_div(dnpv).and_then(|step| rate.checked_sub(step))
        else {
            break;
        };
        rate = next.clamp(MIN_RATE, MAX_RATE);
    }

    bisect_irr(cash_flows).ok_or(WaterfallError::ConvergenceFailure {
        function: "IRR".into(),
        iterations: MAX_IRR_ITERATIONS,
        last_delta,
    })
}

/// Bracket a root on a fixed ladder of rates, then bisect inside it.
fn bisect_irr(cash_flows: &[Money]) -> Option<Rate> {
    let ladder = [
        MIN_RATE,
        dec!(-0.9),
        dec!(-0.5),
        dec!(-0.2),
        Decimal::ZERO,
        dec!(0.1),
        dec!(0.25),
        dec!(0.5),
        dec!(1),
        dec!(2),
        dec!(5),
        MAX_RATE,
    ];

    let points: Vec<(Rate, Decimal)> = ladder
        .iter()
        .filter_map(|&r| npv_and_derivative(r, cash_flows).map(|(v, _)| (r, v)))
        .collect();

    let (mut low, mut npv_low, mut high) = points.windows(2).find_map(|w| {
        let (r0, v0) = w[0];
        let (r1, v1) = w[1];
        if v0.is_zero() {
            Some((r0, v0, r0))
        } else if v0.is_sign_negative() != v1.is_sign_negative() {
            Some((r0, v0, r1))
        } else {
            None
        }
    })?;

    if npv_low.is_zero() {
        return Some(low);
    }

    for _ in 0..MAX_BISECTION_ITERATIONS {
        let mid = (low + high) / dec!(2);
        let (npv_mid, _) = npv_and_derivative(mid, cash_flows)?;

        if npv_mid.abs() < CONVERGENCE_THRESHOLD || (high - low) < BISECTION_WIDTH {
            return Some(mid);
        }

        if npv_mid.is_sign_negative() == npv_low.is_sign_negative() {
            low = mid;
            npv_low = npv_mid;
        } else {
            high = mid;
        }
    }

    None
}

/// IRR as an optional value: `None` when the series has no sign change or no
/// root can be found. Never substitutes zero for an undefined rate.
pub fn compute_irr(cash_flows: &[Money]) -> Option<Rate> {
    if cash_flows.len() < 2 || !has_sign_change(cash_flows) {
        return None;
    }
    irr(cash_flows, DEFAULT_GUESS).ok()
}

/// Total inflows divided by total outflows. `None` when nothing was invested.
pub fn equity_multiple(cash_flows: &[Money]) -> Option<Multiple> {
    let invested: Money = cash_flows
        .iter()
        .filter(|cf| cf.is_sign_negative())
        .map(|cf| cf.abs())
        .sum();
    let returned: Money = cash_flows
        .iter()
        .filter(|cf| cf.is_sign_positive())
        .sum();

    if invested.is_zero() {
        None
    } else {
        Some(returned / invested)
    }
}

/// Level annual payment that retires `principal` over `periods` at `rate`:
/// P * r(1+r)^n / ((1+r)^n - 1)
pub fn level_payment(principal: Money, rate: Rate, periods: u32) -> EngineResult<Money> {
    if periods == 0 {
        return Err(WaterfallError::invalid(
            "amortization_years",
            "Number of periods must be > 0",
        ));
    }

    if rate.is_zero() {
        return Ok(principal / Decimal::from(periods));
    }

    let mut compound = Decimal::ONE;
    for _ in 0..periods {
        compound *= Decimal::ONE + rate;
    }

    let denominator = compound - Decimal::ONE;
    if denominator.is_zero() {
        return Err(WaterfallError::DivisionByZero {
            context: "level payment denominator".into(),
        });
    }

    Ok(principal * rate * compound / denominator)
}

/// Outstanding balance after `periods` level payments.
pub fn remaining_balance(principal: Money, rate: Rate, payment: Money, periods: u32) -> Money {
    let mut balance = principal;
    for _ in 0..periods {
        let interest = balance * rate;
        balance -= payment - interest;
        if balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
    }
    balance
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        assert_eq!(npv(dec!(0.0), &cfs).unwrap(), dec!(50));
    }

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result - dec!(-21.04)).abs() < dec!(0.01));
    }

    #[test]
    fn test_npv_rejects_rate_below_minus_one() {
        assert!(npv(dec!(-1), &[dec!(-100), dec!(110)]).is_err());
    }

    #[test]
    fn test_irr_one_year_ten_percent() {
        let result = compute_irr(&[dec!(-100), dec!(110)]).unwrap();
        assert!((result - dec!(0.10)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_irr_even_cashflows() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let result = irr(&cfs, dec!(0.10)).unwrap();
        // ~9.70%
        assert!((result - dec!(0.0970)).abs() < dec!(0.001));
    }

    #[test]
    fn test_irr_negative_rate() {
        // Lose 40% over one year
        let result = compute_irr(&[dec!(-100), dec!(60)]).unwrap();
        assert!((result - dec!(-0.40)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_irr_no_sign_change_is_undefined() {
        assert_eq!(compute_irr(&[dec!(100), dec!(10), dec!(20)]), None);
        assert_eq!(compute_irr(&[dec!(0), dec!(0)]), None);
        assert!(irr(&[dec!(100), dec!(10)], dec!(0.1)).is_err());
    }

    #[test]
    fn test_irr_all_negative_is_undefined() {
        assert_eq!(compute_irr(&[dec!(-100), dec!(-10)]), None);
    }

    #[test]
    fn test_irr_requires_two_flows() {
        assert_eq!(compute_irr(&[dec!(-100)]), None);
        match irr(&[dec!(-100)], dec!(0.1)) {
            Err(WaterfallError::InsufficientData(_)) => {}
            other => panic!("Expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn test_irr_high_return_via_fallback() {
        // 10x in one year is far from the 10% guess
        let result = compute_irr(&[dec!(-100), dec!(1000)]).unwrap();
        assert!((result - dec!(9)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_irr_long_series_does_not_overflow() {
        let mut cfs = vec![dec!(-1000000)];
        cfs.extend(std::iter::repeat(dec!(90000)).take(29));
        cfs.push(dec!(1090000));
        let result = compute_irr(&cfs).unwrap();
        assert!((result - dec!(0.09)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_irr_no_real_root_is_undefined() {
        // -100 + 300x - 250x^2 has a negative discriminant
        assert_eq!(compute_irr(&[dec!(-100), dec!(300), dec!(-250)]), None);
    }

    #[test]
    fn test_irr_multiple_roots_returns_one_of_them() {
        // Roots at 10% and 20%
        let result = compute_irr(&[dec!(-100), dec!(230), dec!(-132)]).unwrap();
        let near_ten = (result - dec!(0.10)).abs() < dec!(0.000001);
        let near_twenty = (result - dec!(0.20)).abs() < dec!(0.000001);
        assert!(near_ten || near_twenty, "unexpected root {result}");
    }

    #[test]
    fn test_irr_ten_year_mixed_signs_does_not_overflow() {
        let cfs = vec![
            dec!(-512000),
            dec!(423000),
            dec!(807000),
            dec!(-660000),
            dec!(466000),
            dec!(-742000),
            dec!(-767000),
            dec!(412000),
            dec!(-284000),
            dec!(-660000),
            dec!(-789000),
        ];
        if let Some(rate) = compute_irr(&cfs) {
            assert!((MIN_RATE..=MAX_RATE).contains(&rate));
        }
    }

    #[test]
    fn test_has_sign_change() {
        assert!(has_sign_change(&[dec!(-1), dec!(1)]));
        assert!(!has_sign_change(&[dec!(0), dec!(1)]));
    }

    #[test]
    fn test_equity_multiple() {
        let m = equity_multiple(&[dec!(-100), dec!(20), dec!(160)]).unwrap();
        assert_eq!(m, dec!(1.8));
        assert_eq!(equity_multiple(&[dec!(10), dec!(20)]), None);
    }

    #[test]
    fn test_level_payment_zero_rate() {
        assert_eq!(level_payment(dec!(1000), dec!(0), 4).unwrap(), dec!(250));
    }

    #[test]
    fn test_level_payment_retires_balance() {
        let pmt = level_payment(dec!(1000), dec!(0.05), 10).unwrap();
        // 1000 * 0.05 * 1.05^10 / (1.05^10 - 1) ≈ 129.50
        assert!((pmt - dec!(129.50)).abs() < dec!(0.01));
        let bal = remaining_balance(dec!(1000), dec!(0.05), pmt, 10);
        assert!(bal < dec!(0.01));
    }

    #[test]
    fn test_remaining_balance_partial() {
        let pmt = level_payment(dec!(1000), dec!(0.05), 10).unwrap();
        let bal = remaining_balance(dec!(1000), dec!(0.05), pmt, 5);
        assert!(bal > dec!(500) && bal < dec!(600));
    }

    #[test]
    fn test_level_payment_zero_periods() {
        assert!(level_payment(dec!(1000), dec!(0.05), 0).is_err());
    }
}
