use crate::llm::{ChatClient, ChatRequest};
use crate::portfolio::PortfolioAsset;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

/// Short LLM diagnosis of a list of holdings.
pub struct PortfolioAdvisor {
    llm: Option<Arc<dyn ChatClient>>,
    timeout: Duration,
}

impl PortfolioAdvisor {
    pub fn new(llm: Option<Arc<dyn ChatClient>>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub async fn analyze(&self, assets: &[PortfolioAsset]) -> anyhow::Result<String> {
        anyhow::ensure!(!assets.is_empty(), "portfolio is empty");
        let llm = self
            .llm
            .as_ref()
            .context("OPENAI_API_KEY is not configured")?;

        let text = tokio::time::timeout(self.timeout, llm.complete(analysis_request(assets)))
            .await
            .with_context(|| format!("portfolio analysis timed out after {:?}", self.timeout))??;
        let text = text.trim();
        anyhow::ensure!(!text.is_empty(), "model returned an empty analysis");
        Ok(text.to_string())
    }
}

fn analysis_request(assets: &[PortfolioAsset]) -> ChatRequest {
    let holdings = assets
        .iter()
        .map(|a| format!("- {}: entry price {}, quantity {}", a.name, a.price, a.quantity))
        .collect::<Vec<_>>()
        .join("\n");
    ChatRequest::new(
        "You are a prudent portfolio reviewer. Answer in plain text, at most 150 words.",
        format!(
            "Review this portfolio. Comment on concentration, risk and one concrete adjustment.\n{holdings}"
        ),
    )
    .with_temperature(0.7)
}
