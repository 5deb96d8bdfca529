use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use finhub_core::domain::calendar::CalendarEvent;
use finhub_core::domain::market::MarketQuote;
use finhub_core::domain::news::NewsItem;
use finhub_core::portfolio::PortfolioAsset;
use finhub_core::services::Services;
use finhub_core::time::local_today;

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            services: Arc::new(services),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/market", get(get_market))
        .route("/api/news", get(get_news).post(post_news))
        .route("/api/calendar", get(get_calendar))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarketResponse {
    success: bool,
    data: Vec<MarketQuote>,
    has_error: bool,
    from_cache: bool,
    timestamp: DateTime<Utc>,
}

async fn get_market(State(state): State<AppState>) -> Json<MarketResponse> {
    let snap = state.services.market.snapshot().await;
    Json(MarketResponse {
        success: true,
        data: snap.quotes,
        has_error: snap.has_error,
        from_cache: snap.from_cache,
        timestamp: snap.timestamp,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewsResponse {
    success: bool,
    news: Vec<NewsItem>,
    from_cache: bool,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsQuery {
    term: Option<String>,
}

async fn get_news(State(state): State<AppState>, Query(query): Query<NewsQuery>) -> Response {
    if let Some(term) = query.term {
        return lookup_term(&state, &term).await.into_response();
    }

    let feed = state.services.news.latest(local_today()).await;
    Json(NewsResponse {
        success: feed.success(),
        news: feed.items,
        from_cache: feed.from_cache,
        timestamp: feed.timestamp,
        message: feed.message,
        error: feed.error,
    })
    .into_response()
}

async fn lookup_term(state: &AppState, term: &str) -> Json<finhub_core::services::glossary::TermAnswer> {
    let lookup = state.services.glossary.lookup(term).await;
    Json(lookup.into_answer(term))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum NewsRequest {
    WikiLookup { term: String },
    PortfolioAnalysis { portfolio: Vec<PortfolioAsset> },
}

#[derive(Debug, Serialize)]
struct AnalysisResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl AnalysisResponse {
    fn failed(error: String) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error),
        }
    }
}

async fn post_news(
    State(state): State<AppState>,
    body: Result<Json<NewsRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "rejected news request body");
            return Json(AnalysisResponse::failed(format!("invalid request: {rejection}")))
                .into_response();
        }
    };

    match request {
        NewsRequest::WikiLookup { term } => lookup_term(&state, &term).await.into_response(),
        NewsRequest::PortfolioAnalysis { portfolio } => {
            match state.services.advisor.analyze(&portfolio).await {
                Ok(result) => Json(AnalysisResponse {
                    success: true,
                    result: Some(result),
                    error: None,
                })
                .into_response(),
                Err(err) => {
                    sentry_anyhow::capture_anyhow(&err);
                    tracing::error!(error = %err, "portfolio analysis failed");
                    Json(AnalysisResponse::failed(format!("{err:#}"))).into_response()
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CalendarResponse {
    success: bool,
    events: Vec<CalendarEvent>,
    from_cache: bool,
    fallback: bool,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn get_calendar(State(state): State<AppState>) -> Json<CalendarResponse> {
    let snap = state.services.calendar.upcoming(local_today()).await;
    Json(CalendarResponse {
        success: true,
        events: snap.events,
        from_cache: snap.from_cache,
        fallback: snap.fallback,
        timestamp: snap.timestamp,
        error: snap.error,
    })
}
