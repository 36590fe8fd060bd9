pub mod invitation;
pub mod match_state;
pub mod recommendation;

/// Timestamps from the backend arrive either as RFC 3339 or as naive UTC
/// (`2025-01-01T10:00:00.123456`). Both deserialize to `DateTime<Utc>`.
pub mod lenient_datetime {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{s}'"))),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::{Datelike, Timelike};

        #[test]
        fn test_parses_naive_and_rfc3339() {
            let naive = parse("2025-03-01T10:15:00.250000").unwrap();
            assert_eq!(naive.hour(), 10);
            let zoned = parse("2025-03-01T10:15:00+02:00").unwrap();
            assert_eq!(zoned.hour(), 8);
            assert_eq!(zoned.day(), 1);
            assert!(parse("yesterday").is_none());
        }
    }
}
