pub mod advisor;
pub mod calendar;
pub mod glossary;
pub mod market;
pub mod news;

use crate::config::Settings;
use crate::llm::openai::OpenAiClient;
use crate::llm::ChatClient;
use crate::sources::crypto::CryptoPriceClient;
use crate::sources::fx::FxRatesClient;
use crate::sources::newsapi::NewsApiClient;
use crate::sources::NewsSource;
use std::sync::Arc;

use advisor::PortfolioAdvisor;
use calendar::CalendarService;
use glossary::GlossaryService;
use market::MarketService;
use news::{NewsConfig, NewsService};

/// Every dashboard service, wired once per process and shared by handlers.
pub struct Services {
    pub market: MarketService,
    pub news: NewsService,
    pub calendar: CalendarService,
    pub glossary: GlossaryService,
    pub advisor: PortfolioAdvisor,
}

impl Services {
    /// Missing credentials are not fatal; the affected features degrade at request time.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let llm: Option<Arc<dyn ChatClient>> = match settings.openai_api_key {
            Some(_) => {
                let client = OpenAiClient::from_settings(settings)?;
                tracing::info!(model = client.model(), "LLM client configured");
                Some(Arc::new(client))
            }
            None => {
                tracing::warn!("OPENAI_API_KEY not set; AI features will degrade");
                None
            }
        };

        let news_source: Option<Arc<dyn NewsSource>> = match settings.news_api_key {
            Some(_) => Some(Arc::new(NewsApiClient::from_settings(settings)?)),
            None => {
                tracing::warn!("NEWS_API_KEY not set; news requests will report an error");
                None
            }
        };

        let market = MarketService::new(
            Arc::new(FxRatesClient::from_settings(settings)?),
            Arc::new(CryptoPriceClient::from_settings(settings)?),
        );

        Ok(Self {
            market,
            news: NewsService::new(news_source, llm.clone(), NewsConfig::from_settings(settings)),
            calendar: CalendarService::new(llm.clone(), settings.llm_timeout),
            glossary: GlossaryService::new(llm.clone()),
            advisor: PortfolioAdvisor::new(llm, settings.llm_timeout),
        })
    }
}
