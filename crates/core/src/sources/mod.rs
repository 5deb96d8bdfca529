pub mod crypto;
pub mod fx;
pub mod newsapi;

use crate::domain::market::MarketQuote;
use crate::domain::news::Article;
use anyhow::Result;

#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_headlines(&self, limit: usize) -> Result<Vec<Article>>;
}

/// One keyless market feed with its own hardcoded defaults.
#[async_trait::async_trait]
pub trait QuoteSource: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_quotes(&self) -> Result<Vec<MarketQuote>>;

    /// Quotes served when the upstream fails.
    fn fallback_quotes(&self) -> Vec<MarketQuote>;
}

pub(crate) fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client> {
    use anyhow::Context;

    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("finhub/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build upstream http client")
}
