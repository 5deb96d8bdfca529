use chrono::{DateTime, Utc};

/// Renders how long ago `published_at` was, for headline lists.
///
/// Under an hour is `just now`, under a day is `Nh ago`, anything older is the
/// publication date. Unparseable timestamps render as an empty string.
pub fn relative_time(published_at: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(published) = published_at
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
    else {
        return String::new();
    };

    let hours = now.signed_duration_since(published).num_hours();
    if hours < 1 {
        "just now".to_string()
    } else if hours < 24 {
        format!("{hours}h ago")
    } else {
        published.format("%Y-%m-%d").to_string()
    }
}
