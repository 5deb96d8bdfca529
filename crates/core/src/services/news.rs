use crate::cache::CacheSlot;
use crate::config::Settings;
use crate::domain::news::{same_articles, Article, ArticleTranslation, NewsItem};
use crate::fanout::map_with_fallback;
use crate::llm::json;
use crate::llm::{ChatClient, ChatRequest};
use crate::quota::{DailyQuota, DEFAULT_DAILY_LIMIT};
use crate::sources::NewsSource;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const NEWS_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
const DEFAULT_PAGE_SIZE: usize = 9;
const DEFAULT_PER_CALL_TIMEOUT: Duration = Duration::from_secs(8);

pub const QUOTA_EXHAUSTED_MESSAGE: &str = "daily refresh limit reached";
pub const MISSING_LLM_NOTICE: &str = "AI translation unavailable: OPENAI_API_KEY is not configured";
const MISSING_NEWS_KEY: &str = "NEWS_API_KEY is not configured";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationMode {
    /// One chat call per headline, issued concurrently.
    PerArticle,
    /// One chat call for the whole page.
    Batch,
}

impl TranslationMode {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("batch") | Some("batched") => TranslationMode::Batch,
            _ => TranslationMode::PerArticle,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub page_size: usize,
    pub cache_ttl: Duration,
    pub daily_limit: u32,
    pub per_call_timeout: Duration,
    pub mode: TranslationMode,
    pub target_language: String,
}

impl NewsConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            per_call_timeout: settings.llm_timeout,
            mode: TranslationMode::parse(settings.news_translation_mode.as_deref()),
            target_language: settings.news_target_language.clone(),
            ..Self::default()
        }
    }
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            cache_ttl: NEWS_CACHE_TTL,
            daily_limit: DEFAULT_DAILY_LIMIT,
            per_call_timeout: DEFAULT_PER_CALL_TIMEOUT,
            mode: TranslationMode::PerArticle,
            target_language: crate::config::DEFAULT_NEWS_TARGET_LANGUAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsFeed {
    pub items: Vec<NewsItem>,
    pub from_cache: bool,
    pub timestamp: DateTime<Utc>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl NewsFeed {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct NewsService {
    source: Option<Arc<dyn NewsSource>>,
    llm: Option<Arc<dyn ChatClient>>,
    cache: CacheSlot<Vec<NewsItem>>,
    quota: DailyQuota,
    config: NewsConfig,
}

impl NewsService {
    pub fn new(
        source: Option<Arc<dyn NewsSource>>,
        llm: Option<Arc<dyn ChatClient>>,
        config: NewsConfig,
    ) -> Self {
        let cache = CacheSlot::new(config.cache_ttl);
        let quota = DailyQuota::new(config.daily_limit);
        Self {
            source,
            llm,
            cache,
            quota,
            config,
        }
    }

    pub fn quota(&self) -> &DailyQuota {
        &self.quota
    }

    /// Latest translated headlines. Failures degrade to cached or placeholder items.
    pub async fn latest(&self, today: NaiveDate) -> NewsFeed {
        if let Some(cached) = self.cache.get_fresh().await {
            return NewsFeed {
                items: cached.value,
                from_cache: true,
                timestamp: cached.cached_at,
                message: None,
                error: None,
            };
        }

        if self.quota.is_exhausted(today).await {
            return self.quota_exhausted().await;
        }

        match self.refresh(today).await {
            Ok(feed) => feed,
            Err(err) => {
                tracing::error!(error = %err, "news refresh failed; serving last known items");
                NewsFeed {
                    items: self.last_known_items().await,
                    from_cache: true,
                    timestamp: Utc::now(),
                    message: None,
                    error: Some(format!("{err:#}")),
                }
            }
        }
    }

    async fn quota_exhausted(&self) -> NewsFeed {
        tracing::warn!(limit = self.quota.limit(), "news quota exhausted; serving last known items");
        NewsFeed {
            items: self.last_known_items().await,
            from_cache: true,
            timestamp: Utc::now(),
            message: Some(QUOTA_EXHAUSTED_MESSAGE.to_string()),
            error: None,
        }
    }

    async fn last_known_items(&self) -> Vec<NewsItem> {
        match self.cache.peek().await {
            Some(cached) => cached.value,
            None => vec![NewsItem::placeholder()],
        }
    }

    /// A quota unit is only spent once fresh headlines are about to be translated.
    async fn refresh(&self, today: NaiveDate) -> anyhow::Result<NewsFeed> {
        let source = self.source.as_ref().context(MISSING_NEWS_KEY)?;
        let articles = source
            .fetch_headlines(self.config.page_size)
            .await
            .with_context(|| format!("{} headlines fetch failed", source.provider_name()))?;
        anyhow::ensure!(!articles.is_empty(), "no headlines returned");

        if let Some(cached) = self.cache.peek().await {
            if same_articles(&articles, &cached.value) {
                if let Some(touched) = self.cache.touch().await {
                    tracing::info!("headlines unchanged; reusing cached translations");
                    return Ok(NewsFeed {
                        items: touched.value,
                        from_cache: true,
                        timestamp: touched.cached_at,
                        message: None,
                        error: None,
                    });
                }
            }
        }

        if !self.quota.try_acquire(today).await {
            return Ok(self.quota_exhausted().await);
        }

        let now = Utc::now();
        let items = match &self.llm {
            Some(llm) => match self.config.mode {
                TranslationMode::PerArticle => self.translate_each(llm.as_ref(), &articles, now).await,
                TranslationMode::Batch => self.translate_batch(llm.as_ref(), &articles, now).await,
            },
            None => articles
                .iter()
                .enumerate()
                .map(|(idx, article)| NewsItem::untranslated(idx, article, MISSING_LLM_NOTICE, now))
                .collect(),
        };

        let timestamp = self.cache.set(items.clone()).await;
        Ok(NewsFeed {
            items,
            from_cache: false,
            timestamp,
            message: None,
            error: None,
        })
    }

    async fn translate_each(
        &self,
        llm: &dyn ChatClient,
        articles: &[Article],
        now: DateTime<Utc>,
    ) -> Vec<NewsItem> {
        let timeout = self.config.per_call_timeout;
        map_with_fallback(
            articles,
            |idx, article| async move {
                let req = self.article_request(article);
                let text = tokio::time::timeout(timeout, llm.complete(req))
                    .await
                    .with_context(|| format!("timed out after {timeout:?}"))??;
                let translation = ArticleTranslation::parse(&text)?;
                Ok::<_, anyhow::Error>(NewsItem::translated(idx, article, translation, now))
            },
            |idx, article, err| {
                tracing::warn!(idx, title = %article.title, error = %err, "article translation failed");
                NewsItem::untranslated(idx, article, &format!("AI processing failed: {err}"), now)
            },
        )
        .await
    }

    async fn translate_batch(
        &self,
        llm: &dyn ChatClient,
        articles: &[Article],
        now: DateTime<Utc>,
    ) -> Vec<NewsItem> {
        let timeout = self.config.per_call_timeout;
        let reply = tokio::time::timeout(timeout, llm.complete(self.batch_request(articles)))
            .await
            .with_context(|| format!("timed out after {timeout:?}"))
            .and_then(|res| res)
            .and_then(|text| {
                json::parse_array(&text, &["news", "items", "articles"]).map_err(anyhow::Error::from)
            });

        let translated = match reply {
            Ok(values) => values,
            Err(err) => {
                tracing::warn!(error = %err, "batch translation failed");
                let notice = format!("AI processing failed: {err}");
                return articles
                    .iter()
                    .enumerate()
                    .map(|(idx, article)| NewsItem::untranslated(idx, article, &notice, now))
                    .collect();
            }
        };

        articles
            .iter()
            .enumerate()
            .map(|(idx, article)| {
                let parsed = translated
                    .get(idx)
                    .and_then(|v| v.as_object())
                    .map(ArticleTranslation::from_object);
                match parsed {
                    Some(Ok(translation)) => NewsItem::translated(idx, article, translation, now),
                    Some(Err(err)) => NewsItem::untranslated(
                        idx,
                        article,
                        &format!("AI processing failed: {err}"),
                        now,
                    ),
                    None => NewsItem::untranslated(
                        idx,
                        article,
                        "AI processing failed: missing from batch reply",
                        now,
                    ),
                }
            })
            .collect()
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a financial news translator and analyst. Translate news into {} and add a short investment insight. Reply with JSON only, without markdown.",
            self.config.target_language
        )
    }

    fn article_request(&self, article: &Article) -> ChatRequest {
        let user = format!(
            "Translate the following news into {lang} and give an investment insight. \
Reply as {{\"title\":\"...\",\"summary\":\"...\",\"aiInsight\":\"...\",\"category\":\"...\"}}.\n\
Title: {title}\nSummary: {summary}\nSource: {source}",
            lang = self.config.target_language,
            title = article.title,
            summary = article.excerpt(),
            source = article.source_name(),
        );
        ChatRequest::new(self.system_prompt(), user).json_object()
    }

    fn batch_request(&self, articles: &[Article]) -> ChatRequest {
        let listing = articles
            .iter()
            .enumerate()
            .map(|(i, a)| {
                format!(
                    "News {}:\nTitle: {}\nContent: {}\nSource: {}",
                    i + 1,
                    a.title,
                    a.excerpt(),
                    a.source_name()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");
        let user = format!(
            "Translate the following {n} news items into {lang} and give an investment insight for each. \
Reply with a JSON array in the same order, without markdown:\n\n{listing}\n\n\
Format: [{{\"title\":\"...\",\"summary\":\"...\",\"aiInsight\":\"...\",\"category\":\"...\"}}]",
            n = articles.len(),
            lang = self.config.target_language,
        );
        ChatRequest::new(self.system_prompt(), user).with_temperature(0.7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::news::ArticleSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            description: Some(format!("{title} description")),
            content: None,
            source: ArticleSource {
                name: Some("Wire".to_string()),
            },
            url: Some(format!("https://example.com/{title}")),
            url_to_image: None,
            published_at: None,
        }
    }

    struct FakeNews {
        titles: Mutex<Vec<String>>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeNews {
        fn new(titles: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                titles: Mutex::new(titles.iter().map(|t| t.to_string()).collect()),
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                titles: Mutex::new(Vec::new()),
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }

        async fn set_titles(&self, titles: &[&str]) {
            *self.titles.lock().await = titles.iter().map(|t| t.to_string()).collect();
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl NewsSource for FakeNews {
        fn provider_name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_headlines(&self, limit: usize) -> anyhow::Result<Vec<Article>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("upstream unavailable");
            }
            Ok(self
                .titles
                .lock()
                .await
                .iter()
                .take(limit)
                .map(|t| article(t))
                .collect())
        }
    }

    /// Translates by upper-casing the title found in the prompt; fails for titles containing "bad".
    struct FakeLlm {
        calls: AtomicUsize,
    }

    impl FakeLlm {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ChatClient for FakeLlm {
        fn model(&self) -> &str {
            "fake"
        }

        async fn complete(&self, req: ChatRequest) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = &req.messages[1].content;
            let titles: Vec<&str> = prompt
                .lines()
                .filter_map(|l| l.strip_prefix("Title: "))
                .collect();
            if titles.iter().any(|t| t.contains("bad")) && titles.len() == 1 {
                anyhow::bail!("model refused");
            }
            let items: Vec<_> = titles
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "title": t.to_uppercase(),
                        "summary": "s",
                        "aiInsight": format!("insight for {t}"),
                        "category": "Markets"
                    })
                })
                .collect();
            if titles.len() == 1 {
                Ok(items[0].to_string())
            } else {
                Ok(format!("```json\n{}\n```", serde_json::Value::Array(items)))
            }
        }
    }

    fn service(news: Arc<FakeNews>, llm: Option<Arc<FakeLlm>>, config: NewsConfig) -> NewsService {
        NewsService::new(
            Some(news as Arc<dyn NewsSource>),
            llm.map(|l| l as Arc<dyn ChatClient>),
            config,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_within_ttl_is_served_from_cache() {
        let news = FakeNews::new(&["alpha", "beta"]);
        let llm = FakeLlm::new();
        let svc = service(news.clone(), Some(llm.clone()), NewsConfig::default());

        let first = svc.latest(day()).await;
        assert!(first.success());
        assert!(!first.from_cache);
        assert_eq!(first.items[0].title, "ALPHA");
        assert_eq!(llm.calls(), 2);

        let second = svc.latest(day()).await;
        assert!(second.from_cache);
        assert_eq!(
            serde_json::to_string(&second.items).unwrap(),
            serde_json::to_string(&first.items).unwrap()
        );
        assert_eq!(news.calls(), 1);
        assert_eq!(svc.quota().used(day()).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_cache_triggers_upstream_fetch() {
        let news = FakeNews::new(&["alpha"]);
        let svc = service(news.clone(), Some(FakeLlm::new()), NewsConfig::default());

        svc.latest(day()).await;
        news.set_titles(&["gamma"]).await;
        tokio::time::advance(NEWS_CACHE_TTL).await;

        let feed = svc.latest(day()).await;
        assert!(!feed.from_cache);
        assert_eq!(feed.items[0].title, "GAMMA");
        assert_eq!(news.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_headlines_skip_llm_and_refresh_timestamp() {
        let news = FakeNews::new(&["alpha", "beta"]);
        let llm = FakeLlm::new();
        let svc = service(news.clone(), Some(llm.clone()), NewsConfig::default());

        let first = svc.latest(day()).await;
        tokio::time::advance(NEWS_CACHE_TTL).await;
        let second = svc.latest(day()).await;

        assert!(second.from_cache);
        assert_eq!(second.items, first.items);
        assert_eq!(news.calls(), 2);
        assert_eq!(llm.calls(), 2);
        assert_eq!(svc.quota().used(day()).await, 1);

        // Timestamp was refreshed, so the next call is a plain cache hit.
        svc.latest(day()).await;
        assert_eq!(news.calls(), 2);
    }

    #[tokio::test]
    async fn exhausted_quota_serves_last_items_without_counting() {
        let news = FakeNews::new(&["alpha"]);
        let config = NewsConfig {
            daily_limit: 1,
            cache_ttl: Duration::ZERO,
            ..NewsConfig::default()
        };
        let svc = service(news.clone(), Some(FakeLlm::new()), config);

        let first = svc.latest(day()).await;
        let limited = svc.latest(day()).await;
        assert!(limited.success());
        assert!(limited.from_cache);
        assert_eq!(limited.message.as_deref(), Some(QUOTA_EXHAUSTED_MESSAGE));
        assert_eq!(limited.items, first.items);

        svc.latest(day()).await;
        assert_eq!(svc.quota().used(day()).await, 1);
        assert_eq!(news.calls(), 1);

        // Next day the counter starts over.
        let next_day = day().succ_opt().unwrap();
        let fresh = svc.latest(next_day).await;
        assert!(fresh.message.is_none());
        assert_eq!(news.calls(), 2);
    }

    #[tokio::test]
    async fn exhausted_quota_without_cache_serves_placeholder() {
        let config = NewsConfig {
            daily_limit: 0,
            ..NewsConfig::default()
        };
        let svc = service(FakeNews::new(&["alpha"]), None, config);
        let feed = svc.latest(day()).await;
        assert_eq!(feed.items, vec![NewsItem::placeholder()]);
        assert!(feed.message.is_some());
    }

    #[tokio::test]
    async fn missing_llm_degrades_every_item() {
        let svc = service(FakeNews::new(&["alpha", "beta", "gamma"]), None, NewsConfig::default());
        let feed = svc.latest(day()).await;

        assert!(feed.success());
        assert_eq!(feed.items.len(), 3);
        for item in &feed.items {
            assert!(!item.title.is_empty());
            assert_eq!(item.source, "Wire");
            assert!(item.ai_insight.contains(MISSING_LLM_NOTICE));
        }
    }

    #[tokio::test]
    async fn per_article_failures_fall_back_individually() {
        let svc = service(
            FakeNews::new(&["alpha", "bad news", "gamma"]),
            Some(FakeLlm::new()),
            NewsConfig::default(),
        );
        let feed = svc.latest(day()).await;

        assert_eq!(feed.items[0].title, "ALPHA");
        assert_eq!(feed.items[1].title, "bad news");
        assert!(feed.items[1].ai_insight.contains("model refused"));
        assert_eq!(feed.items[2].title, "GAMMA");
        let ids: Vec<_> = feed.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn batch_mode_uses_one_call() {
        let llm = FakeLlm::new();
        let config = NewsConfig {
            mode: TranslationMode::Batch,
            ..NewsConfig::default()
        };
        let svc = service(FakeNews::new(&["alpha", "beta"]), Some(llm.clone()), config);
        let feed = svc.latest(day()).await;

        assert_eq!(llm.calls(), 1);
        assert_eq!(feed.items[1].title, "BETA");
        assert_eq!(feed.items[1].ai_insight, "insight for beta");
    }

    #[tokio::test]
    async fn upstream_failure_is_reported_in_payload() {
        let svc = service(FakeNews::failing(), None, NewsConfig::default());
        let feed = svc.latest(day()).await;

        assert!(!feed.success());
        assert!(feed.error.unwrap().contains("upstream unavailable"));
        assert_eq!(feed.items, vec![NewsItem::placeholder()]);
    }

    #[tokio::test]
    async fn missing_news_source_is_reported() {
        let svc = NewsService::new(None, None, NewsConfig::default());
        let feed = svc.latest(day()).await;
        assert!(feed.error.unwrap().contains("NEWS_API_KEY"));
    }

    #[tokio::test]
    async fn failed_refreshes_do_not_spend_quota() {
        let config = NewsConfig {
            daily_limit: 1,
            ..NewsConfig::default()
        };
        let svc = service(FakeNews::failing(), None, config.clone());
        for _ in 0..3 {
            let feed = svc.latest(day()).await;
            assert!(!feed.success());
            assert!(feed.message.is_none());
        }
        assert_eq!(svc.quota().used(day()).await, 0);

        let unconfigured = NewsService::new(None, None, config);
        for _ in 0..3 {
            let feed = unconfigured.latest(day()).await;
            assert!(feed.error.unwrap().contains("NEWS_API_KEY"));
        }
        assert_eq!(unconfigured.quota().used(day()).await, 0);
    }

    #[test]
    fn parses_translation_mode() {
        assert_eq!(TranslationMode::parse(Some("BATCH")), TranslationMode::Batch);
        assert_eq!(TranslationMode::parse(Some("per_article")), TranslationMode::PerArticle);
        assert_eq!(TranslationMode::parse(None), TranslationMode::PerArticle);
    }
}
