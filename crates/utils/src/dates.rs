use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

/// Parses the date formats the client is known to send. Anything else yields
/// `None` instead of an error.
pub fn parse_date_lenient(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(datetime.date_naive());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(datetime.date());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%m/%d/%Y") {
        return Some(date);
    }

    tracing::debug!(value = trimmed, "Ignoring unparseable date");
    None
}

/// `date + days`, or `None` when the result falls outside chrono's range.
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::days(days))
}

/// Serde adapter for optional request dates: malformed values become `None`.
pub mod lenient {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(Value::String(value)) => super::parse_date_lenient(&value),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct Payload {
        #[serde(default, deserialize_with = "lenient::deserialize")]
        due_date: Option<NaiveDate>,
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn accepts_common_formats() {
        assert_eq!(parse_date_lenient("2025-06-01"), Some(ymd(2025, 6, 1)));
        assert_eq!(
            parse_date_lenient("2025-06-01T15:30:00Z"),
            Some(ymd(2025, 6, 1))
        );
        assert_eq!(
            parse_date_lenient("2025-06-01T15:30:00.250"),
            Some(ymd(2025, 6, 1))
        );
        assert_eq!(parse_date_lenient("06/01/2025"), Some(ymd(2025, 6, 1)));
    }

    #[test]
    fn garbage_becomes_none() {
        assert_eq!(parse_date_lenient(""), None);
        assert_eq!(parse_date_lenient("next tuesday"), None);
        assert_eq!(parse_date_lenient("2025-13-45"), None);
    }

    #[test]
    fn lenient_deserializer_substitutes_null() {
        let payload: Payload = serde_json::from_str(r#"{"due_date":"not a date"}"#).unwrap();
        assert_eq!(payload.due_date, None);

        let payload: Payload = serde_json::from_str(r#"{"due_date":12345}"#).unwrap();
        assert_eq!(payload.due_date, None);

        let payload: Payload = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(payload.due_date, None);

        let payload: Payload = serde_json::from_str(r#"{"due_date":"2025-06-01"}"#).unwrap();
        assert_eq!(payload.due_date, Some(ymd(2025, 6, 1)));
    }

    #[test]
    fn add_days_handles_negative_offsets() {
        assert_eq!(add_days(ymd(2025, 6, 1), -10), Some(ymd(2025, 5, 22)));
        assert_eq!(add_days(ymd(2025, 6, 1), 3), Some(ymd(2025, 6, 4)));
        assert_eq!(add_days(NaiveDate::MAX, 1), None);
    }
}
