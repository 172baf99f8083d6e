use std::time::Duration;

use serde::{Deserialize, Deserializer};

pub fn deserialize_human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let buf = String::deserialize(deserializer)?;
    humantime::parse_duration(&buf).map_err(serde::de::Error::custom)
}

/// Reads a duration in milliseconds from an environment variable.
pub fn get_duration_from_env(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
}
