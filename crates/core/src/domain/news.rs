use crate::llm::json::{self, MalformedOutput};
use crate::time::relative::relative_time;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const FALLBACK_CATEGORY: &str = "System notice";
const NO_SUMMARY: &str = "Open the original article for details.";

/// A headline as delivered by the news API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Empty when the API sends `null`; such articles are dropped by the source.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub source: ArticleSource,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub url_to_image: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleSource {
    #[serde(default)]
    pub name: Option<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}

impl Article {
    pub fn source_name(&self) -> &str {
        self.source.name.as_deref().unwrap_or("Unknown")
    }

    /// Description, or the first 200 characters of the body.
    pub fn excerpt(&self) -> String {
        if let Some(description) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            return description.trim().to_string();
        }
        self.content
            .as_deref()
            .map(|c| c.chars().take(200).collect())
            .unwrap_or_default()
    }
}

/// What the LLM produces for one headline.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleTranslation {
    pub title: String,
    pub summary: String,
    pub insight: String,
    pub category: String,
}

impl ArticleTranslation {
    pub fn from_object(obj: &Map<String, Value>) -> Result<Self, MalformedOutput> {
        let title = json::text_field(obj, &["title"]).ok_or_else(|| MalformedOutput {
            reason: "translation is missing a title".to_string(),
            raw: Value::Object(obj.clone()).to_string(),
        })?;

        Ok(Self {
            title,
            summary: json::text_field_or(obj, &["summary"], ""),
            insight: json::text_field_or(obj, &["aiInsight", "insight"], ""),
            category: json::text_field_or(obj, &["category"], FALLBACK_CATEGORY),
        })
    }

    pub fn parse(text: &str) -> Result<Self, MalformedOutput> {
        Self::from_object(&json::parse_object(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: u32,
    pub title: String,
    pub source: String,
    pub time: String,
    pub summary: String,
    pub ai_insight: String,
    pub category: String,
    pub url: String,
    pub image: Option<String>,
    /// Headline as fetched, used to detect an unchanged article set.
    #[serde(default)]
    pub original_title: Option<String>,
}

impl NewsItem {
    pub fn translated(
        position: usize,
        article: &Article,
        translation: ArticleTranslation,
        now: DateTime<Utc>,
    ) -> Self {
        let summary = if translation.summary.is_empty() {
            article.excerpt()
        } else {
            translation.summary
        };
        Self {
            id: position as u32 + 1,
            title: translation.title,
            source: article.source_name().to_string(),
            time: relative_time(article.published_at.as_deref(), now),
            summary,
            ai_insight: translation.insight,
            category: translation.category,
            url: article.url.clone().unwrap_or_else(|| "#".to_string()),
            image: article.url_to_image.clone(),
            original_title: Some(article.title.clone()),
        }
    }

    /// The raw headline with a system-message insight in place of the AI one.
    pub fn untranslated(position: usize, article: &Article, notice: &str, now: DateTime<Utc>) -> Self {
        let summary = article.excerpt();
        Self {
            id: position as u32 + 1,
            title: article.title.clone(),
            source: article.source_name().to_string(),
            time: relative_time(article.published_at.as_deref(), now),
            summary: if summary.is_empty() {
                NO_SUMMARY.to_string()
            } else {
                summary
            },
            ai_insight: format!("💡 {notice}"),
            category: FALLBACK_CATEGORY.to_string(),
            url: article.url.clone().unwrap_or_else(|| "#".to_string()),
            image: article.url_to_image.clone(),
            original_title: Some(article.title.clone()),
        }
    }

    pub fn placeholder() -> Self {
        Self {
            id: 1,
            title: "System message".to_string(),
            source: "System".to_string(),
            time: "now".to_string(),
            summary: "Check the environment configuration.".to_string(),
            ai_insight: "💡 Tip: make sure NEWS_API_KEY and API_BASE_URL are set correctly."
                .to_string(),
            category: "System".to_string(),
            url: "#".to_string(),
            image: None,
            original_title: None,
        }
    }
}

/// Ordered title equality between fresh headlines and cached items.
pub fn same_articles(articles: &[Article], cached: &[NewsItem]) -> bool {
    articles.len() == cached.len()
        && articles
            .iter()
            .zip(cached)
            .all(|(article, item)| item.original_title.as_deref() == Some(article.title.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            description: None,
            content: Some("x".repeat(300)),
            source: ArticleSource {
                name: Some("Reuters".to_string()),
            },
            url: Some("https://example.com/a".to_string()),
            url_to_image: None,
            published_at: Some("2026-03-10T10:00:00Z".to_string()),
        }
    }

    #[test]
    fn deserializes_news_api_article() {
        let raw = serde_json::json!({
            "source": {"id": null, "name": "Bloomberg"},
            "title": "Stocks rally",
            "description": "Markets up",
            "url": "https://example.com",
            "urlToImage": "https://example.com/i.png",
            "publishedAt": "2026-03-10T10:00:00Z",
            "content": null
        });
        let parsed: Article = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.source_name(), "Bloomberg");
        assert_eq!(parsed.url_to_image.as_deref(), Some("https://example.com/i.png"));
        assert_eq!(parsed.excerpt(), "Markets up");
    }

    #[test]
    fn null_or_missing_title_does_not_break_the_page() {
        let raw = r#"[{"title": null, "source": {"name": "A"}}, {"source": {}}, {"title": "kept"}]"#;
        let parsed: Vec<Article> = serde_json::from_str(raw).unwrap();
        let titles: Vec<_> = parsed.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["", "", "kept"]);
    }

    #[test]
    fn excerpt_truncates_content() {
        assert_eq!(article("a").excerpt().chars().count(), 200);
    }

    #[test]
    fn untranslated_item_keeps_headline_and_notice() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let item = NewsItem::untranslated(2, &article("Fed holds"), "AI unavailable", now);
        assert_eq!(item.id, 3);
        assert_eq!(item.title, "Fed holds");
        assert_eq!(item.source, "Reuters");
        assert_eq!(item.time, "2h ago");
        assert!(item.ai_insight.contains("AI unavailable"));
        assert_eq!(item.original_title.as_deref(), Some("Fed holds"));
    }

    #[test]
    fn translation_requires_title_and_defaults_rest() {
        let t = ArticleTranslation::parse("```json\n{\"title\":\"聯準會按兵不動\",\"aiInsight\":\"利多\"}\n```")
            .unwrap();
        assert_eq!(t.title, "聯準會按兵不動");
        assert_eq!(t.insight, "利多");
        assert_eq!(t.category, FALLBACK_CATEGORY);

        assert!(ArticleTranslation::parse("{\"summary\":\"no title\"}").is_err());
    }

    #[test]
    fn same_articles_compares_ordered_titles() {
        let now = Utc::now();
        let a = vec![article("one"), article("two")];
        let cached: Vec<_> = a
            .iter()
            .enumerate()
            .map(|(i, art)| NewsItem::untranslated(i, art, "x", now))
            .collect();

        assert!(same_articles(&a, &cached));
        assert!(!same_articles(&[article("two"), article("one")], &cached));
        assert!(!same_articles(&a[..1], &cached));
    }
}
