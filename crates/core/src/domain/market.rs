use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub name: String,
    /// Display price: `31.50` for currency pairs, `$65,000` for crypto.
    pub price: String,
    /// Percent change.
    pub change: f64,
}

impl MarketQuote {
    pub fn new(name: impl Into<String>, price: impl Into<String>, change: f64) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
            change,
        }
    }
}

/// Formats a USD amount as `$` plus comma-grouped digits, keeping up to two decimals.
pub fn format_usd(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    match frac {
        0 => format!("{sign}${grouped}"),
        f if f % 10 == 0 => format!("{sign}${grouped}.{}", f / 10),
        f => format!("{sign}${grouped}.{f:02}"),
    }
}

/// Rounds to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
