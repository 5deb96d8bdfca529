//! Calculator formulas behind the dashboard tools.
//!
//! Rates are fractions (`0.07` for 7%). Every function returns `None` unless
//! all of its inputs are strictly positive and finite.

const MONTHS_PER_YEAR: f64 = 12.0;
/// Years of expenses covered by a 4% withdrawal rate.
const SAFE_WITHDRAWAL_MULTIPLE: f64 = 25.0;

fn positive(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite() && *v > 0.0)
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// `principal * (1 + rate)^years`
pub fn compound_growth(principal: f64, rate: f64, years: f64) -> Option<f64> {
    if !positive(&[principal, rate, years]) {
        return None;
    }
    finite(principal * (1.0 + rate).powf(years))
}

/// Payment per period for a fully amortizing loan:
/// `P * r * (1 + r)^n / ((1 + r)^n - 1)`.
pub fn amortized_payment(principal: f64, rate_per_period: f64, periods: f64) -> Option<f64> {
    if !positive(&[principal, rate_per_period, periods]) {
        return None;
    }
    // (1 + r)^n - 1 via ln_1p/exp_m1; the naive form cancels to zero for tiny r.
    let accrued = (periods * rate_per_period.ln_1p()).exp_m1();
    let growth = accrued + 1.0;
    finite(principal * rate_per_period * growth / accrued)
}

pub fn mortgage_monthly_payment(principal: f64, annual_rate: f64, years: f64) -> Option<f64> {
    amortized_payment(principal, annual_rate / MONTHS_PER_YEAR, years * MONTHS_PER_YEAR)
}

/// `(final / initial)^(1 / years) - 1`
pub fn cagr(initial: f64, final_value: f64, years: f64) -> Option<f64> {
    if !positive(&[initial, final_value, years]) {
        return None;
    }
    finite((final_value / initial).powf(1.0 / years) - 1.0)
}

/// `(final - initial) / initial`
pub fn roi(initial: f64, final_value: f64) -> Option<f64> {
    if !positive(&[initial, final_value]) {
        return None;
    }
    finite((final_value - initial) / initial)
}

/// Savings needed to cover `monthly_expense` forever at a 4% withdrawal rate.
pub fn retirement_target(monthly_expense: f64) -> Option<f64> {
    if !positive(&[monthly_expense]) {
        return None;
    }
    finite(monthly_expense * MONTHS_PER_YEAR * SAFE_WITHDRAWAL_MULTIPLE)
}
