use crate::cache::TtlCache;
use crate::llm::json;
use crate::llm::retry::{retry_on_rate_limit, RetryOutcome, RetryPolicy};
use crate::llm::{ChatClient, ChatRequest};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const TERM_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub const BUSY_MESSAGE: &str = "service busy, please try again shortly";
pub const BAD_FORMAT_MESSAGE: &str = "the explanation came back in an unreadable format";
const MISSING_TERM: &str = "a term is required";
const MISSING_LLM: &str = "OPENAI_API_KEY is not configured";

struct DictionaryEntry {
    keys: &'static [&'static str],
    explanation: &'static str,
}

const DICTIONARY: &[DictionaryEntry] = &[
    DictionaryEntry {
        keys: &["CPI", "consumer price index", "消費者物價指數"],
        explanation: "Consumer Price Index: the price change of a basket of consumer goods and services, the headline measure of inflation.",
    },
    DictionaryEntry {
        keys: &["PPI", "producer price index", "生產者物價指數"],
        explanation: "Producer Price Index: prices received by domestic producers, often a leading signal for consumer inflation.",
    },
    DictionaryEntry {
        keys: &["GDP", "gross domestic product", "國內生產毛額"],
        explanation: "Gross Domestic Product: the total value of goods and services produced in an economy over a period.",
    },
    DictionaryEntry {
        keys: &["PMI", "purchasing managers index", "採購經理人指數"],
        explanation: "Purchasing Managers' Index: a survey of business activity where readings above 50 indicate expansion.",
    },
    DictionaryEntry {
        keys: &["QT", "quantitative tightening", "縮表"],
        explanation: "Quantitative tightening: a central bank shrinks its balance sheet, usually by not reinvesting maturing bonds. A contractionary policy.",
    },
    DictionaryEntry {
        keys: &["QE", "quantitative easing", "量化寬鬆"],
        explanation: "Quantitative easing: a central bank buys bonds at scale to push down long-term rates and add liquidity.",
    },
    DictionaryEntry {
        keys: &["NFP", "non-farm payrolls", "nonfarm payrolls", "非農"],
        explanation: "US non-farm payrolls: monthly change in employment outside agriculture, one of the most watched gauges of US economic health.",
    },
    DictionaryEntry {
        keys: &["CAGR", "compound annual growth rate", "年化報酬率"],
        explanation: "Compound annual growth rate: the constant yearly rate that takes an initial value to a final value over a number of years.",
    },
    DictionaryEntry {
        keys: &["ROI", "return on investment", "投資報酬率"],
        explanation: "Return on investment: gain relative to the amount invested, (final - initial) / initial.",
    },
    DictionaryEntry {
        keys: &["ETF", "exchange-traded fund", "指數股票型基金"],
        explanation: "Exchange-traded fund: a pooled fund that tracks an index or basket and trades on an exchange like a stock.",
    },
];

/// Case-insensitive match against every key and alias of the built-in table.
pub fn dictionary_lookup(term: &str) -> Option<&'static str> {
    let term = term.trim();
    DICTIONARY
        .iter()
        .find(|entry| entry.keys.iter().any(|key| key.eq_ignore_ascii_case(term)))
        .map(|entry| entry.explanation)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TermSource {
    Dictionary,
    Cache,
    Llm,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TermLookup {
    Found {
        explanation: String,
        source: TermSource,
    },
    /// Still rate limited after every retry.
    Busy,
    BadFormat,
    Unavailable(String),
    MissingTerm,
}

/// Wire shape of a lookup result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermAnswer {
    pub success: bool,
    pub term: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<TermSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TermLookup {
    pub fn into_answer(self, term: &str) -> TermAnswer {
        let term = term.trim().to_string();
        let failed = |error: &str| TermAnswer {
            success: false,
            term: term.clone(),
            explanation: None,
            source: None,
            error: Some(error.to_string()),
        };
        match self {
            TermLookup::Found {
                explanation,
                source,
            } => TermAnswer {
                success: true,
                term: term.clone(),
                explanation: Some(explanation),
                source: Some(source),
                error: None,
            },
            TermLookup::Busy => failed(BUSY_MESSAGE),
            TermLookup::BadFormat => failed(BAD_FORMAT_MESSAGE),
            TermLookup::Unavailable(reason) => failed(&reason),
            TermLookup::MissingTerm => failed(MISSING_TERM),
        }
    }
}

pub struct GlossaryService {
    llm: Option<Arc<dyn ChatClient>>,
    cache: TtlCache<String, String>,
    retry: RetryPolicy,
}

impl GlossaryService {
    pub fn new(llm: Option<Arc<dyn ChatClient>>) -> Self {
        Self::with_parts(llm, TtlCache::new(TERM_CACHE_TTL), RetryPolicy::default())
    }

    pub fn with_parts(
        llm: Option<Arc<dyn ChatClient>>,
        cache: TtlCache<String, String>,
        retry: RetryPolicy,
    ) -> Self {
        Self { llm, cache, retry }
    }

    /// Dictionary, then cache, then the model.
    pub async fn lookup(&self, term: &str) -> TermLookup {
        let term = term.trim();
        if term.is_empty() {
            return TermLookup::MissingTerm;
        }

        if let Some(explanation) = dictionary_lookup(term) {
            return TermLookup::Found {
                explanation: explanation.to_string(),
                source: TermSource::Dictionary,
            };
        }

        let key = term.to_lowercase();
        if let Some(cached) = self.cache.get_fresh(&key).await {
            return TermLookup::Found {
                explanation: cached.value,
                source: TermSource::Cache,
            };
        }

        let Some(llm) = self.llm.as_ref() else {
            return TermLookup::Unavailable(MISSING_LLM.to_string());
        };

        let outcome = retry_on_rate_limit(self.retry, || llm.complete(term_request(term))).await;
        let text = match outcome {
            RetryOutcome::Done(text) => text,
            RetryOutcome::Exhausted(err) => {
                tracing::warn!(term, error = %err, "term lookup still rate limited after retries");
                return TermLookup::Busy;
            }
            RetryOutcome::Failed(err) => {
                tracing::error!(term, error = %err, "term lookup failed");
                return TermLookup::Unavailable(format!("{err:#}"));
            }
        };

        match parse_explanation(&text) {
            Some(explanation) => {
                self.cache.set(key, explanation.clone()).await;
                TermLookup::Found {
                    explanation,
                    source: TermSource::Llm,
                }
            }
            None => {
                tracing::warn!(term, raw = %text, "term explanation was malformed");
                TermLookup::BadFormat
            }
        }
    }
}

fn term_request(term: &str) -> ChatRequest {
    let system = "You are a finance educator. Explain terms in plain language in two or three sentences. Reply with JSON only.";
    let user = format!("Explain the financial term \"{term}\". Reply as {{\"explanation\":\"...\"}}.");
    ChatRequest::new(system, user).with_temperature(0.3).json_object()
}

fn parse_explanation(text: &str) -> Option<String> {
    let obj = json::parse_object(text).ok()?;
    json::text_field(&obj, &["explanation", "definition", "result"])
}
