use crate::llm::json;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const UNKNOWN_EVENT: &str = "unknown event";
pub const DEFAULT_TIME: &str = "00:00";
pub const MISSING_VALUE: &str = "--";
pub const NO_ANALYSIS: &str = "no analysis available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    Medium,
}

impl Importance {
    /// Anything other than an explicit "high" is medium.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("high") => Importance::High,
            _ => Importance::Medium,
        }
    }
}

/// Canonical calendar event.
///
/// Older payloads used `name`, `impact` and `description`; those are read as
/// aliases by [`CalendarEvent::from_llm_value`] but never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub date: NaiveDate,
    pub event: String,
    pub time: String,
    pub importance: Importance,
    pub previous: String,
    pub forecast: String,
    pub ai_analysis: String,
}

impl CalendarEvent {
    /// Normalizes one loosely shaped event, defaulting every missing field.
    pub fn from_llm_value(value: &Value, today: NaiveDate) -> Self {
        let empty = serde_json::Map::new();
        let obj = value.as_object().unwrap_or(&empty);

        let date = json::text_field(obj, &["date"])
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
            .unwrap_or(today);

        Self {
            date,
            event: json::text_field_or(obj, &["event", "name"], UNKNOWN_EVENT),
            time: json::text_field_or(obj, &["time"], DEFAULT_TIME),
            importance: Importance::parse_lenient(
                json::text_field(obj, &["importance", "impact"]).as_deref(),
            ),
            previous: json::text_field_or(obj, &["previous"], MISSING_VALUE),
            forecast: json::text_field_or(obj, &["forecast"], MISSING_VALUE),
            ai_analysis: json::text_field_or(obj, &["aiAnalysis", "analysis", "description"], NO_ANALYSIS),
        }
    }
}

struct StaticEvent {
    offset_days: i64,
    event: &'static str,
    time: &'static str,
    importance: Importance,
    previous: &'static str,
    forecast: &'static str,
    analysis: &'static str,
}

const STATIC_EVENTS: &[StaticEvent] = &[
    StaticEvent {
        offset_days: 0,
        event: "US initial jobless claims",
        time: "20:30",
        importance: Importance::High,
        previous: "212K",
        forecast: "220K",
        analysis: "A print above forecast would support equities via softer rate expectations.",
    },
    StaticEvent {
        offset_days: 1,
        event: "Euro area CPI (final, YoY)",
        time: "10:00",
        importance: Importance::Medium,
        previous: "2.4%",
        forecast: "2.4%",
        analysis: "Stable inflation keeps ECB rate-cut expectations intact.",
    },
    StaticEvent {
        offset_days: 2,
        event: "UK GDP (preliminary, QoQ)",
        time: "09:00",
        importance: Importance::High,
        previous: "0.1%",
        forecast: "0.2%",
        analysis: "A slow recovery in UK output would be mildly positive for sterling.",
    },
    StaticEvent {
        offset_days: 3,
        event: "US GDP (advance, QoQ)",
        time: "13:30",
        importance: Importance::High,
        previous: "3.1%",
        forecast: "2.8%",
        analysis: "Slower growth is consistent with a soft-landing narrative.",
    },
    StaticEvent {
        offset_days: 4,
        event: "Japan unemployment rate",
        time: "08:30",
        importance: Importance::Medium,
        previous: "2.4%",
        forecast: "2.5%",
        analysis: "The Japanese labour market remains tight and stable.",
    },
    StaticEvent {
        offset_days: 5,
        event: "Canada retail sales",
        time: "13:30",
        importance: Importance::Medium,
        previous: "-0.2%",
        forecast: "0.1%",
        analysis: "Consumer spending is expected to improve modestly.",
    },
    StaticEvent {
        offset_days: 6,
        event: "Australia CPI (QoQ)",
        time: "11:30",
        importance: Importance::High,
        previous: "0.4%",
        forecast: "0.3%",
        analysis: "Cooling inflation would support an RBA cut.",
    },
];

/// Deterministic fallback week starting at `today`, in ascending day order.
pub fn static_calendar(today: NaiveDate) -> Vec<CalendarEvent> {
    STATIC_EVENTS
        .iter()
        .map(|e| CalendarEvent {
            date: today + Duration::days(e.offset_days),
            event: e.event.to_string(),
            time: e.time.to_string(),
            importance: e.importance,
            previous: e.previous.to_string(),
            forecast: e.forecast.to_string(),
            ai_analysis: e.analysis.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 12, 28).unwrap()
    }

    #[test]
    fn static_calendar_covers_next_seven_days_in_order() {
        let events = static_calendar(today());
        assert_eq!(events.len(), 7);
        for (i, e) in events.iter().enumerate() {
            let offset = (e.date - today()).num_days();
            assert!((0..7).contains(&offset));
            assert_eq!(offset, i as i64);
        }
        // Crosses the year boundary without trouble.
        assert_eq!(events[6].date, NaiveDate::from_ymd_opt(2027, 1, 3).unwrap());
    }

    #[test]
    fn normalizes_missing_fields_to_defaults() {
        let e = CalendarEvent::from_llm_value(&json!({}), today());
        assert_eq!(e.date, today());
        assert_eq!(e.event, UNKNOWN_EVENT);
        assert_eq!(e.time, DEFAULT_TIME);
        assert_eq!(e.importance, Importance::Medium);
        assert_eq!(e.previous, MISSING_VALUE);
        assert_eq!(e.forecast, MISSING_VALUE);
        assert_eq!(e.ai_analysis, NO_ANALYSIS);

        let e = CalendarEvent::from_llm_value(&json!("not an object"), today());
        assert_eq!(e.event, UNKNOWN_EVENT);
    }

    #[test]
    fn reads_legacy_aliases() {
        let e = CalendarEvent::from_llm_value(
            &json!({
                "date": "2026-12-30",
                "name": "FOMC minutes",
                "impact": "HIGH",
                "previous": 4.5,
                "description": "Hawkish tone expected"
            }),
            today(),
        );
        assert_eq!(e.date, NaiveDate::from_ymd_opt(2026, 12, 30).unwrap());
        assert_eq!(e.event, "FOMC minutes");
        assert_eq!(e.importance, Importance::High);
        assert_eq!(e.previous, "4.5");
        assert_eq!(e.ai_analysis, "Hawkish tone expected");
    }

    #[test]
    fn bad_date_falls_back_to_today() {
        let e = CalendarEvent::from_llm_value(&json!({"date": "next Tuesday"}), today());
        assert_eq!(e.date, today());
    }

    #[test]
    fn serializes_canonical_field_names() {
        let v = serde_json::to_value(&static_calendar(today())[0]).unwrap();
        assert_eq!(v["importance"], "high");
        assert!(v.get("aiAnalysis").is_some());
        assert_eq!(v["date"], "2026-12-28");
    }
}
