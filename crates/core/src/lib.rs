pub mod cache;
pub mod calc;
pub mod domain;
pub mod fanout;
pub mod llm;
pub mod portfolio;
pub mod quota;
pub mod services;
pub mod sources;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    pub const DEFAULT_NEWS_API_BASE_URL: &str = "https://newsapi.org";
    pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
    pub const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_FX_RATES_BASE_URL: &str = "https://open.er-api.com";
    pub const DEFAULT_CRYPTO_BASE_URL: &str = "https://api.coingecko.com";
    pub const DEFAULT_NEWS_TARGET_LANGUAGE: &str = "Traditional Chinese";

    const DEFAULT_LLM_TIMEOUT_SECS: u64 = 8;
    const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 5;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub news_api_key: Option<String>,
        pub news_api_base_url: String,
        pub openai_api_key: Option<String>,
        pub api_base_url: String,
        pub ai_model: String,
        pub llm_timeout: Duration,
        pub news_target_language: String,
        pub news_translation_mode: Option<String>,
        pub fx_rates_base_url: String,
        pub crypto_base_url: String,
        pub upstream_timeout: Duration,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                news_api_key: non_empty_var("NEWS_API_KEY"),
                news_api_base_url: non_empty_var("NEWS_API_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_NEWS_API_BASE_URL.to_string()),
                openai_api_key: non_empty_var("OPENAI_API_KEY"),
                api_base_url: non_empty_var("API_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
                ai_model: non_empty_var("AI_MODEL").unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
                llm_timeout: secs_var("LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)?,
                news_target_language: non_empty_var("NEWS_TARGET_LANGUAGE")
                    .unwrap_or_else(|| DEFAULT_NEWS_TARGET_LANGUAGE.to_string()),
                news_translation_mode: non_empty_var("NEWS_TRANSLATION_MODE"),
                fx_rates_base_url: non_empty_var("FX_RATES_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_FX_RATES_BASE_URL.to_string()),
                crypto_base_url: non_empty_var("CRYPTO_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_CRYPTO_BASE_URL.to_string()),
                upstream_timeout: secs_var("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS)?,
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn require_news_api_key(&self) -> anyhow::Result<&str> {
            self.news_api_key
                .as_deref()
                .context("NEWS_API_KEY is required")
        }

        pub fn require_openai_api_key(&self) -> anyhow::Result<&str> {
            self.openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required")
        }
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                news_api_key: None,
                news_api_base_url: DEFAULT_NEWS_API_BASE_URL.to_string(),
                openai_api_key: None,
                api_base_url: DEFAULT_API_BASE_URL.to_string(),
                ai_model: DEFAULT_AI_MODEL.to_string(),
                llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
                news_target_language: DEFAULT_NEWS_TARGET_LANGUAGE.to_string(),
                news_translation_mode: None,
                fx_rates_base_url: DEFAULT_FX_RATES_BASE_URL.to_string(),
                crypto_base_url: DEFAULT_CRYPTO_BASE_URL.to_string(),
                upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
                sentry_dsn: None,
            }
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn secs_var(key: &str, default: u64) -> anyhow::Result<Duration> {
        match non_empty_var(key) {
            Some(raw) => {
                let secs = raw
                    .parse::<u64>()
                    .with_context(|| format!("{key} must be a whole number of seconds (got {raw})"))?;
                Ok(Duration::from_secs(secs))
            }
            None => Ok(Duration::from_secs(default)),
        }
    }
}
