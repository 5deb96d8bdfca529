use crate::cache::CacheSlot;
use crate::domain::calendar::{static_calendar, CalendarEvent};
use crate::llm::json;
use crate::llm::{ChatClient, ChatRequest};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const CALENDAR_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const WRAPPER_KEYS: &[&str] = &["events", "data"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSnapshot {
    pub events: Vec<CalendarEvent>,
    /// The static week was served instead of generated events.
    pub fallback: bool,
    pub from_cache: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredCalendar {
    events: Vec<CalendarEvent>,
    fallback: bool,
}

pub struct CalendarService {
    llm: Option<Arc<dyn ChatClient>>,
    cache: CacheSlot<StoredCalendar>,
    timeout: Duration,
}

impl CalendarService {
    pub fn new(llm: Option<Arc<dyn ChatClient>>, timeout: Duration) -> Self {
        Self {
            llm,
            cache: CacheSlot::new(CALENDAR_CACHE_TTL),
            timeout,
        }
    }

    pub async fn upcoming(&self, today: NaiveDate) -> CalendarSnapshot {
        if let Some(cached) = self.cache.get_fresh().await {
            return CalendarSnapshot {
                events: cached.value.events,
                fallback: cached.value.fallback,
                from_cache: true,
                timestamp: cached.cached_at,
                error: None,
            };
        }

        let (stored, error) = match self.generate(today).await {
            Ok(events) => {
                tracing::info!(count = events.len(), "generated calendar events");
                (
                    StoredCalendar {
                        events,
                        fallback: false,
                    },
                    None,
                )
            }
            Err(err) => {
                tracing::warn!(error = %err, "calendar generation failed; using static week");
                (
                    StoredCalendar {
                        events: static_calendar(today),
                        fallback: true,
                    },
                    Some(format!("{err:#}")),
                )
            }
        };

        let timestamp = self.cache.set(stored.clone()).await;
        CalendarSnapshot {
            events: stored.events,
            fallback: stored.fallback,
            from_cache: false,
            timestamp,
            error,
        }
    }

    async fn generate(&self, today: NaiveDate) -> anyhow::Result<Vec<CalendarEvent>> {
        let llm = self
            .llm
            .as_ref()
            .context("OPENAI_API_KEY is not configured")?;
        let text = tokio::time::timeout(self.timeout, llm.complete(calendar_request(today)))
            .await
            .with_context(|| format!("calendar request timed out after {:?}", self.timeout))??;

        let values = json::parse_array(&text, WRAPPER_KEYS)?;
        anyhow::ensure!(!values.is_empty(), "model returned no events");
        Ok(values
            .iter()
            .map(|v| CalendarEvent::from_llm_value(v, today))
            .collect())
    }
}

fn calendar_request(today: NaiveDate) -> ChatRequest {
    let system = "You are a macroeconomic analyst. Reply with a single JSON object only.";
    let user = format!(
        "Today is {today}. List the important global economic data releases and central bank \
events for the next 7 days (US, Europe, Asia). Reply as \
{{\"events\":[{{\"date\":\"YYYY-MM-DD\",\"event\":\"...\",\"time\":\"HH:MM\",\
\"importance\":\"high|medium\",\"previous\":\"...\",\"forecast\":\"...\",\"aiAnalysis\":\"...\"}}]}} \
sorted by date.",
        today = today.format("%Y-%m-%d"),
    );
    ChatRequest::new(system, user).with_temperature(0.3).json_object()
}
