//! Serde helpers for human-readable durations in configuration.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::{fmt, time::Duration};

/// Custom serde functions for Duration that support human-readable strings
///
/// Plain integers are read as milliseconds, strings go through `humantime`
/// (`"5s"`, `"1m"`, `"1h30m"`).
pub mod duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration_str = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&duration_str)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(
                    "a duration as milliseconds (number) or human-readable string (e.g., '5s', '1m', '1h30m')",
                )
            }

            fn visit_u64<E>(self, millis: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Duration::from_millis(millis))
            }

            fn visit_i64<E>(self, millis: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(millis)
                    .map(Duration::from_millis)
                    .map_err(|_| de::Error::custom(format!("Negative duration: {millis}")))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                humantime::parse_duration(value)
                    .map_err(|e| de::Error::custom(format!("Invalid duration '{value}': {e}")))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super::duration")]
        value: Duration,
    }

    #[test]
    fn test_parses_human_readable_strings() {
        let holder: Holder = toml::from_str(r#"value = "1m30s""#).unwrap();
        assert_eq!(holder.value, Duration::from_secs(90));
    }

    #[test]
    fn test_parses_integers_as_millis() {
        let holder: Holder = toml::from_str("value = 5000").unwrap();
        assert_eq!(holder.value, Duration::from_millis(5000));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let holder = Holder {
            value: Duration::from_secs(60),
        };
        let text = toml::to_string(&holder).unwrap();
        assert!(text.contains("1m"));
        let back: Holder = toml::from_str(&text).unwrap();
        assert_eq!(back.value, Duration::from_secs(60));
    }
}
