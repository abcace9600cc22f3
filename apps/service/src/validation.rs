use url::Url;

use crate::error::{MonitorError, Result};

/// Smallest per-URL check interval accepted, in milliseconds.
pub const MIN_CHECK_INTERVAL_MS: u64 = 10_000;
/// Largest per-URL check interval accepted, in milliseconds.
pub const MAX_CHECK_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;
const MAX_TAG_LEN: usize = 32;

/// Validation results with specific error messages
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(msg.into()) }
    }

    pub fn to_result(&self) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(MonitorError::validation(
                self.error.clone().unwrap_or_else(|| "Validation failed".to_string()),
            ))
        }
    }
}

/// Parse `target` and return its normalized form.
///
/// Normalization is whatever the URL parser produces, so `https://a.com`
/// and `https://a.com/` name the same monitored URL.
pub fn normalize_url(target: &str) -> Result<String> {
    parse_http_url(target).map(|url| url.to_string()).map_err(MonitorError::Validation)
}

fn parse_http_url(target: &str) -> std::result::Result<Url, String> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err("URL cannot be empty".to_string());
    }

    match Url::parse(trimmed) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return Err(format!("Invalid scheme '{scheme}'. Must be http or https"));
            }

            if url.host_str().is_none() {
                return Err("URL must have a valid host".to_string());
            }

            Ok(url)
        }
        Err(e) => {
            if !trimmed.contains("://") {
                Err("URL must include scheme (http:// or https://)".to_string())
            } else {
                Err(format!("Invalid URL: {e}"))
            }
        }
    }
}

/// Split newline-separated bulk input into candidate URLs, skipping blanks.
pub fn split_bulk_input(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate a per-URL check interval in milliseconds.
pub fn validate_check_interval(interval_ms: u64) -> ValidationResult {
    if interval_ms < MIN_CHECK_INTERVAL_MS {
        return ValidationResult::err(format!(
            "Check interval too short: {interval_ms}ms (minimum: {MIN_CHECK_INTERVAL_MS}ms)"
        ));
    }

    if interval_ms > MAX_CHECK_INTERVAL_MS {
        return ValidationResult::err("Check interval too long (max 24 hours)");
    }

    ValidationResult::ok()
}

/// Trim, drop empties and duplicates, keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());

    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if tag.len() > MAX_TAG_LEN {
            return Err(MonitorError::validation(format!(
                "Tag too long (max {MAX_TAG_LEN} characters): {tag}"
            )));
        }
        if !out.iter().any(|existing| existing == tag) {
            out.push(tag.to_string());
        }
    }

    Ok(out)
}
