//! # Duration Validation
//!
//! Parses Kubernetes-style duration strings such as `30s`, `5m`, `1h`, `1d`.

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static DURATION_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?P<number>\d+)(?P<unit>[smhd])$").ok());

/// Parse a Kubernetes duration string into a `Duration`
/// Accepts `<number><unit>` with unit one of s, m, h, d (case insensitive)
pub fn parse_kubernetes_duration(duration_str: &str) -> Result<Duration> {
    let trimmed = duration_str.trim();
    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("Duration string cannot be empty"));
    }

    let regex = DURATION_REGEX
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Failed to compile duration regex"))?;
    let lower = trimmed.to_lowercase();
    let captures = regex.captures(&lower).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid duration format '{trimmed}'. Expected format: <number><unit> (e.g., '30s', '5m', '1h')"
        )
    })?;

    let number: u64 = captures["number"]
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid duration number in '{trimmed}': {e}"))?;
    if number == 0 {
        return Err(anyhow::anyhow!(
            "Duration must be greater than 0, got '{trimmed}'"
        ));
    }

    let multiplier = match &captures["unit"] {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => 86_400,
    };
    number
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow::anyhow!("Duration '{trimmed}' is too large"))
}

/// Validate a duration field against a minimum
pub fn validate_duration_interval(interval: &str, field_name: &str, min_seconds: u64) -> Result<()> {
    let duration = parse_kubernetes_duration(interval)
        .map_err(|e| anyhow::anyhow!("{field_name}: {e}"))?;
    if duration.as_secs() < min_seconds {
        return Err(anyhow::anyhow!(
            "{field_name} '{}' must be at least {min_seconds} seconds (got {} seconds)",
            interval.trim(),
            duration.as_secs()
        ));
    }
    Ok(())
}
