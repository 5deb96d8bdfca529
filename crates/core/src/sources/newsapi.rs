use crate::config::Settings;
use crate::domain::news::Article;
use crate::sources::{http_client, NewsSource};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

const HEADLINES_PATH: &str = "/v2/top-headlines";
const CATEGORY: &str = "business";
const LANGUAGE: &str = "en";

/// Client for a NewsAPI-compatible top-headlines endpoint.
#[derive(Debug, Clone)]
pub struct NewsApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NewsApiClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_news_api_key()?.to_string();
        Self::new(&settings.news_api_base_url, api_key, settings.upstream_timeout)
    }

    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url, HEADLINES_PATH)
    }
}

#[derive(Debug, Deserialize)]
struct HeadlinesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[async_trait::async_trait]
impl NewsSource for NewsApiClient {
    fn provider_name(&self) -> &'static str {
        "newsapi"
    }

    async fn fetch_headlines(&self, limit: usize) -> Result<Vec<Article>> {
        let page_size = limit.to_string();
        let res = self
            .http
            .get(self.url())
            .query(&[
                ("category", CATEGORY),
                ("language", LANGUAGE),
                ("pageSize", page_size.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("news API request failed")?;

        let status = res.status();
        anyhow::ensure!(status.is_success(), "news API HTTP {status}");

        let body = res
            .json::<HeadlinesResponse>()
            .await
            .context("failed to parse news API response")?;
        if body.status.as_deref() == Some("error") {
            anyhow::bail!(
                "news API error: {}",
                body.message.as_deref().unwrap_or("unknown")
            );
        }

        let mut articles: Vec<Article> = body
            .articles
            .into_iter()
            .filter(|a| !a.title.trim().is_empty())
            .collect();
        articles.truncate(limit);
        anyhow::ensure!(!articles.is_empty(), "news API returned no articles");
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> NewsApiClient {
        NewsApiClient::new(&server.uri(), "key".to_string(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn fetches_and_truncates_headlines() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/top-headlines"))
            .and(query_param("category", "business"))
            .and(query_param("pageSize", "2"))
            .and(query_param("apiKey", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "articles": [
                    {"source": {"name": "A"}, "title": "one"},
                    {"source": {"name": "B"}, "title": "  "},
                    {"source": {"name": "N"}, "title": null},
                    {"source": {"name": "C"}, "title": "two"},
                    {"source": {"name": "D"}, "title": "three"}
                ]
            })))
            .mount(&server)
            .await;

        let articles = client(&server).fetch_headlines(2).await.unwrap();
        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn empty_article_list_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/top-headlines"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "articles": []})),
            )
            .mount(&server)
            .await;

        assert!(client(&server).fetch_headlines(9).await.is_err());
    }

    #[tokio::test]
    async fn non_2xx_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "status": "error",
                "message": "apiKeyInvalid"
            })))
            .mount(&server)
            .await;

        let err = client(&server).fetch_headlines(9).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
