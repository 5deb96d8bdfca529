use crate::config::Settings;
use crate::domain::market::{format_usd, round2, MarketQuote};
use crate::sources::{http_client, QuoteSource};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const SIMPLE_PRICE_PATH: &str = "/api/v3/simple/price";

struct CoinDefault {
    symbol: &'static str,
    id: &'static str,
    price: &'static str,
    change: f64,
}

const COINS: &[CoinDefault] = &[
    CoinDefault { symbol: "BTC", id: "bitcoin", price: "$65,000", change: 2.5 },
    CoinDefault { symbol: "ETH", id: "ethereum", price: "$3,500", change: 1.8 },
];

/// Keyless spot prices from a CoinGecko-compatible `simple/price` endpoint.
#[derive(Debug, Clone)]
pub struct CryptoPriceClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CoinPrice {
    #[serde(default)]
    usd: Option<f64>,
    #[serde(default)]
    usd_24h_change: Option<f64>,
}

impl CryptoPriceClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(&settings.crypto_base_url, settings.upstream_timeout)
    }

    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl QuoteSource for CryptoPriceClient {
    fn provider_name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_quotes(&self) -> Result<Vec<MarketQuote>> {
        let ids = COINS.iter().map(|c| c.id).collect::<Vec<_>>().join(",");
        let res = self
            .http
            .get(format!("{}{}", self.base_url, SIMPLE_PRICE_PATH))
            .query(&[
                ("ids", ids.as_str()),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
            ])
            .send()
            .await
            .context("crypto price request failed")?;
        let status = res.status();
        anyhow::ensure!(status.is_success(), "crypto price HTTP {status}");

        let prices = res
            .json::<HashMap<String, CoinPrice>>()
            .await
            .context("failed to parse crypto price response")?;

        COINS
            .iter()
            .map(|coin| -> Result<MarketQuote> {
                let price = prices
                    .get(coin.id)
                    .with_context(|| format!("crypto price response has no {}", coin.id))?;
                let display = price
                    .usd
                    .filter(|p| p.is_finite())
                    .map(format_usd)
                    .unwrap_or_else(|| coin.price.to_string());
                let change = price
                    .usd_24h_change
                    .filter(|c| c.is_finite())
                    .map(round2)
                    .unwrap_or(coin.change);
                Ok(MarketQuote::new(coin.symbol, display, change))
            })
            .collect()
    }

    fn fallback_quotes(&self) -> Vec<MarketQuote> {
        default_crypto_quotes()
    }
}

pub fn default_crypto_quotes() -> Vec<MarketQuote> {
    COINS
        .iter()
        .map(|c| MarketQuote::new(c.symbol, c.price, c.change))
        .collect()
}
