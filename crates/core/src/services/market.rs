use crate::cache::CacheSlot;
use crate::domain::market::MarketQuote;
use crate::sources::QuoteSource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const MARKET_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub quotes: Vec<MarketQuote>,
    /// At least one upstream failed and its defaults were substituted.
    pub has_error: bool,
    pub from_cache: bool,
    pub timestamp: DateTime<Utc>,
}

pub struct MarketService {
    fx: Arc<dyn QuoteSource>,
    crypto: Arc<dyn QuoteSource>,
    cache: CacheSlot<Vec<MarketQuote>>,
}

impl MarketService {
    pub fn new(fx: Arc<dyn QuoteSource>, crypto: Arc<dyn QuoteSource>) -> Self {
        Self {
            fx,
            crypto,
            cache: CacheSlot::new(MARKET_CACHE_TTL),
        }
    }

    /// Never fails: a broken upstream contributes its defaults and sets `has_error`.
    pub async fn snapshot(&self) -> MarketSnapshot {
        if let Some(cached) = self.cache.get_fresh().await {
            return MarketSnapshot {
                quotes: cached.value,
                has_error: false,
                from_cache: true,
                timestamp: cached.cached_at,
            };
        }

        let (fx, crypto) = tokio::join!(
            quotes_or_fallback(self.fx.as_ref()),
            quotes_or_fallback(self.crypto.as_ref())
        );
        let has_error = fx.1 || crypto.1;
        let mut quotes = fx.0;
        quotes.extend(crypto.0);

        let timestamp = if has_error {
            Utc::now()
        } else {
            self.cache.set(quotes.clone()).await
        };

        MarketSnapshot {
            quotes,
            has_error,
            from_cache: false,
            timestamp,
        }
    }
}

async fn quotes_or_fallback(source: &dyn QuoteSource) -> (Vec<MarketQuote>, bool) {
    match source.fetch_quotes().await {
        Ok(quotes) if !quotes.is_empty() => (quotes, false),
        Ok(_) => {
            tracing::warn!(provider = source.provider_name(), "upstream returned no quotes; using defaults");
            (source.fallback_quotes(), true)
        }
        Err(err) => {
            tracing::warn!(provider = source.provider_name(), error = %err, "quote fetch failed; using defaults");
            (source.fallback_quotes(), true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        name: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl QuoteSource for FakeSource {
        fn provider_name(&self) -> &'static str {
            self.name
        }

        async fn fetch_quotes(&self) -> anyhow::Result<Vec<MarketQuote>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("{} is down", self.name);
            }
            Ok(vec![MarketQuote::new(format!("{} live", self.name), "1.00", 0.0)])
        }

        fn fallback_quotes(&self) -> Vec<MarketQuote> {
            vec![MarketQuote::new(format!("{} default", self.name), "9.99", 0.0)]
        }
    }

    #[tokio::test(start_paused = true)]
    async fn merges_sources_and_serves_from_cache() {
        let fx = FakeSource::new("fx", false);
        let crypto = FakeSource::new("crypto", false);
        let service = MarketService::new(fx.clone(), crypto.clone());

        let first = service.snapshot().await;
        assert!(!first.has_error);
        assert!(!first.from_cache);
        assert_eq!(first.quotes.len(), 2);
        assert_eq!(first.quotes[0].name, "fx live");
        assert_eq!(first.quotes[1].name, "crypto live");

        let second = service.snapshot().await;
        assert!(second.from_cache);
        assert_eq!(second.quotes, first.quotes);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(MARKET_CACHE_TTL).await;
        let third = service.snapshot().await;
        assert!(!third.from_cache);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_source_falls_back_independently_and_is_not_cached() {
        let fx = FakeSource::new("fx", true);
        let crypto = FakeSource::new("crypto", false);
        let service = MarketService::new(fx.clone(), crypto.clone());

        let snap = service.snapshot().await;
        assert!(snap.has_error);
        let names: Vec<_> = snap.quotes.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, vec!["fx default", "crypto live"]);

        service.snapshot().await;
        assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn output_is_never_empty() {
        let service = MarketService::new(FakeSource::new("fx", true), FakeSource::new("crypto", true));
        let snap = service.snapshot().await;
        assert!(snap.has_error);
        assert_eq!(snap.quotes.len(), 2);
    }
}
