use crate::config::Settings;
use crate::domain::market::MarketQuote;
use crate::sources::{http_client, QuoteSource};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const LATEST_USD_PATH: &str = "/v6/latest/USD";

struct PairDefault {
    name: &'static str,
    currency: &'static str,
    price: &'static str,
    change: f64,
    /// Quote as `1 / rate` (USD per unit of the currency) instead of `rate`.
    inverted: bool,
}

// The rates feed carries no day-over-day change, so the nominal change figures are kept.
const PAIRS: &[PairDefault] = &[
    PairDefault { name: "USD/TWD", currency: "TWD", price: "31.50", change: 0.2, inverted: false },
    PairDefault { name: "USD/HKD", currency: "HKD", price: "7.80", change: 0.1, inverted: false },
    PairDefault { name: "USD/JPY", currency: "JPY", price: "150.20", change: -0.3, inverted: false },
    PairDefault { name: "USD/EUR", currency: "EUR", price: "1.0870", change: 0.5, inverted: true },
];

/// Keyless USD-based exchange rates (open.er-api.com shape).
#[derive(Debug, Clone)]
pub struct FxRatesClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    #[serde(default)]
    rates: Option<HashMap<String, f64>>,
}

impl FxRatesClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(&settings.fx_rates_base_url, settings.upstream_timeout)
    }

    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl QuoteSource for FxRatesClient {
    fn provider_name(&self) -> &'static str {
        "er-api"
    }

    async fn fetch_quotes(&self) -> Result<Vec<MarketQuote>> {
        let res = self
            .http
            .get(format!("{}{}", self.base_url, LATEST_USD_PATH))
            .send()
            .await
            .context("FX rates request failed")?;
        let status = res.status();
        anyhow::ensure!(status.is_success(), "FX rates HTTP {status}");

        let body = res
            .json::<LatestRatesResponse>()
            .await
            .context("failed to parse FX rates response")?;
        let rates = body.rates.context("FX rates response has no rates")?;
        Ok(quotes_from_rates(&rates))
    }

    fn fallback_quotes(&self) -> Vec<MarketQuote> {
        default_fx_quotes()
    }
}

pub fn default_fx_quotes() -> Vec<MarketQuote> {
    PAIRS
        .iter()
        .map(|p| MarketQuote::new(p.name, p.price, p.change))
        .collect()
}

/// A pair missing from `rates` keeps its default price.
fn quotes_from_rates(rates: &HashMap<String, f64>) -> Vec<MarketQuote> {
    PAIRS
        .iter()
        .map(|p| {
            let price = rates
                .get(p.currency)
                .copied()
                .filter(|r| r.is_finite() && *r > 0.0)
                .map(|rate| {
                    if p.inverted {
                        format!("{:.4}", 1.0 / rate)
                    } else {
                        format!("{rate:.2}")
                    }
                })
                .unwrap_or_else(|| p.price.to_string());
            MarketQuote::new(p.name, price, p.change)
        })
        .collect()
}
