//! # Kubernetes Validation
//!
//! RFC 1123 checks for names that end up in object names and label values.

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;

static LABEL_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").ok());

static DNS_SUBDOMAIN_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").ok()
});

static LABEL_VALUE_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").ok());

/// Validate an RFC 1123 label (lowercase alphanumeric and hyphens, 1-63 characters)
pub fn validate_kubernetes_label(value: &str, field_name: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("{field_name} cannot be empty"));
    }
    if trimmed.len() > 63 {
        return Err(anyhow::anyhow!(
            "{field_name} '{trimmed}' exceeds maximum length of 63 characters (got {})",
            trimmed.len()
        ));
    }
    let regex = LABEL_REGEX
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Failed to compile label regex"))?;
    if !regex.is_match(trimmed) {
        return Err(anyhow::anyhow!(
            "{field_name} '{trimmed}' must be a valid RFC 1123 label (lowercase alphanumeric and hyphens; cannot start/end with hyphen)"
        ));
    }
    Ok(())
}

/// Validate a label selector value (may be empty, up to 63 characters)
pub fn validate_label_value(value: &str, field_name: &str) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    if value.len() > 63 {
        return Err(anyhow::anyhow!(
            "{field_name} '{value}' exceeds maximum length of 63 characters"
        ));
    }
    let regex = LABEL_VALUE_REGEX
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Failed to compile label value regex"))?;
    if !regex.is_match(value) {
        return Err(anyhow::anyhow!(
            "{field_name} '{value}' must be a valid label value"
        ));
    }
    Ok(())
}

/// Validate a label key: optional DNS subdomain prefix, then a name segment
pub fn validate_label_key(key: &str, field_name: &str) -> Result<()> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    if let Some(prefix) = prefix {
        let regex = DNS_SUBDOMAIN_REGEX
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Failed to compile DNS subdomain regex"))?;
        if prefix.is_empty() || prefix.len() > 253 || !regex.is_match(prefix) {
            return Err(anyhow::anyhow!(
                "{field_name} key '{key}' has an invalid prefix (must be a DNS subdomain)"
            ));
        }
    }
    if name.is_empty() {
        return Err(anyhow::anyhow!("{field_name} key '{key}' has an empty name"));
    }
    validate_label_value(name, field_name)
        .map_err(|_| anyhow::anyhow!("{field_name} key '{key}' has an invalid name segment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_accepts_rfc1123() {
        assert!(validate_kubernetes_label("v1", "version").is_ok());
        assert!(validate_kubernetes_label("release-2024-05", "version").is_ok());
    }

    #[test]
    fn test_label_rejects_invalid() {
        assert!(validate_kubernetes_label("", "version").is_err());
        assert!(validate_kubernetes_label("V1", "version").is_err());
        assert!(validate_kubernetes_label("-v1", "version").is_err());
        assert!(validate_kubernetes_label("v1.2", "version").is_err());
        assert!(validate_kubernetes_label(&"a".repeat(64), "version").is_err());
    }

    #[test]
    fn test_label_value() {
        assert!(validate_label_value("", "selector").is_ok());
        assert!(validate_label_value("Beta_1.2", "selector").is_ok());
        assert!(validate_label_value("beta!", "selector").is_err());
    }

    #[test]
    fn test_label_key() {
        assert!(validate_label_key("channel", "selector").is_ok());
        assert!(validate_label_key("qa.example.com/approved", "selector").is_ok());
        assert!(validate_label_key("/approved", "selector").is_err());
        assert!(validate_label_key("Example.com/approved", "selector").is_err());
        assert!(validate_label_key("example.com/", "selector").is_err());
    }
}
