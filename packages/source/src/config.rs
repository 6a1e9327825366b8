//! Upstream API configuration.
//!
//! Defaults target the City of LA Socrata dataset. Every field can be
//! overridden from the environment (see [`SourceConfig::apply_overrides`])
//! or from the `[source]` table of a settings file.

use std::str::FromStr;
use std::time::Duration;

use la_crime_source_models::MAX_WINDOW_DAYS;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// LAPD "Crime Data from 2020 to Present" Socrata resource.
pub const DEFAULT_API_URL: &str = "https://data.lacity.org/resource/2nrs-mtv8.json";

/// Hard page-size ceiling imposed by the Socrata SODA API.
pub const UPSTREAM_MAX_PAGE_SIZE: u64 = 50_000;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value could not be parsed or is out of range.
    #[error("Invalid value {value:?} for {key}: {message}")]
    Invalid {
        /// Environment variable or settings key.
        key: String,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        message: String,
    },

    /// The settings file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid TOML for the settings schema.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// How to reach and page through the upstream incident API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Socrata resource URL.
    pub api_url: String,
    /// Optional Socrata application token. Without one requests are made
    /// anonymously at a lower rate limit.
    pub app_token: Option<String>,
    /// Records requested per page (`$limit`).
    pub page_size: u64,
    /// Upper bound on records fetched for one window.
    pub max_records: u64,
    /// Pages allowed in flight at once.
    pub max_concurrent_pages: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the first failed attempt.
    pub retries: u32,
    /// Fixed delay between attempts, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Longest window the adapter will fetch.
    pub max_window_days: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            app_token: None,
            page_size: 1_000,
            max_records: 100_000,
            max_concurrent_pages: 5,
            timeout_secs: 30,
            retries: 2,
            retry_backoff_ms: 500,
            max_window_days: MAX_WINDOW_DAYS,
        }
    }
}

impl SourceConfig {
    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set but malformed.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// Recognized keys: `LA_CRIME_API_URL`, `SOCRATA_APP_TOKEN`,
    /// `LA_CRIME_PAGE_SIZE`, `LA_CRIME_MAX_RECORDS`,
    /// `LA_CRIME_MAX_CONCURRENT_PAGES`, `LA_CRIME_TIMEOUT_SECS`,
    /// `LA_CRIME_RETRIES`, `LA_CRIME_RETRY_BACKOFF_MS`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a value is malformed or the
    /// resulting configuration fails [`Self::validate`].
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("LA_CRIME_API_URL").filter(|s| !s.is_empty()) {
            self.api_url = url;
        }
        if let Some(token) = lookup("SOCRATA_APP_TOKEN").filter(|s| !s.is_empty()) {
            self.app_token = Some(token);
        }
        override_parsed(&lookup, "LA_CRIME_PAGE_SIZE", &mut self.page_size)?;
        override_parsed(&lookup, "LA_CRIME_MAX_RECORDS", &mut self.max_records)?;
        override_parsed(
            &lookup,
            "LA_CRIME_MAX_CONCURRENT_PAGES",
            &mut self.max_concurrent_pages,
        )?;
        override_parsed(&lookup, "LA_CRIME_TIMEOUT_SECS", &mut self.timeout_secs)?;
        override_parsed(&lookup, "LA_CRIME_RETRIES", &mut self.retries)?;
        override_parsed(&lookup, "LA_CRIME_RETRY_BACKOFF_MS", &mut self.retry_backoff_ms)?;
        self.validate()
    }

    /// Checks that the numeric limits are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > UPSTREAM_MAX_PAGE_SIZE {
            return Err(invalid(
                "page_size",
                self.page_size,
                &format!("must be between 1 and {UPSTREAM_MAX_PAGE_SIZE}"),
            ));
        }
        if self.max_concurrent_pages == 0 {
            return Err(invalid(
                "max_concurrent_pages",
                self.max_concurrent_pages,
                "must be at least 1",
            ));
        }
        if self.max_records == 0 {
            return Err(invalid("max_records", self.max_records, "must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs", self.timeout_secs, "must be at least 1"));
        }
        if self.max_window_days == 0 || self.max_window_days > MAX_WINDOW_DAYS {
            return Err(invalid(
                "max_window_days",
                self.max_window_days,
                &format!("must be between 1 and {MAX_WINDOW_DAYS}"),
            ));
        }
        Ok(())
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry budget for a single page request.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Parses `key` from `lookup` into `target` when it is set and non-blank.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if the value does not parse as `T`.
pub fn override_parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(());
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(());
    }
    *target = raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        value: raw.to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}

fn invalid(key: &str, value: impl std::fmt::Display, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}
