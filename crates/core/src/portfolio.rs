use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioAsset {
    #[serde(default = "new_id", deserialize_with = "lenient_id")]
    pub id: String,
    pub name: String,
    /// Entry price per unit.
    #[serde(deserialize_with = "lenient_number")]
    pub price: f64,
    #[serde(alias = "amount", default = "one", deserialize_with = "lenient_number")]
    pub quantity: f64,
}

impl PortfolioAsset {
    pub fn cost(&self) -> f64 {
        self.price * self.quantity
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn one() -> f64 {
    1.0
}

// Browser clients send numeric ids (Date.now()) and form values as strings.
fn lenient_id<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match Value::deserialize(de)? {
        Value::String(s) if !s.trim().is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Ok(new_id()),
    }
}

fn lenient_number<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
    use serde::de::Error;
    match Value::deserialize(de)? {
        Value::Number(n) => n.as_f64().ok_or_else(|| D::Error::custom("number out of range")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("not a number: {s:?}"))),
        other => Err(D::Error::custom(format!("expected a number, got {other}"))),
    }
}

/// Ordered list of holdings. Serialized as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Portfolio {
    assets: Vec<PortfolioAsset>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, price: f64, quantity: f64) -> Result<&PortfolioAsset> {
        let name = name.trim();
        anyhow::ensure!(!name.is_empty(), "asset name is required");
        anyhow::ensure!(price.is_finite() && price > 0.0, "price must be positive");
        anyhow::ensure!(
            quantity.is_finite() && quantity > 0.0,
            "quantity must be positive"
        );

        self.assets.push(PortfolioAsset {
            id: new_id(),
            name: name.to_string(),
            price,
            quantity,
        });
        self.assets.last().context("asset was just pushed")
    }

    /// Returns the removed asset, or `None` when no asset has `id`.
    pub fn remove(&mut self, id: &str) -> Option<PortfolioAsset> {
        let idx = self.assets.iter().position(|a| a.id == id)?;
        Some(self.assets.remove(idx))
    }

    pub fn list(&self) -> &[PortfolioAsset] {
        &self.assets
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn total_cost(&self) -> f64 {
        self.assets.iter().map(PortfolioAsset::cost).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize portfolio")
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_json::from_str(raw).context("failed to parse portfolio JSON")
    }
}
