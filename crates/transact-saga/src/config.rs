use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_millis(5000);
pub const DEFAULT_RETRY_DELAY_MULTIPLIER: f64 = 1.3;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawRetryConfig {
    retry_delay_ms: Option<u64>,
    max_retry_delay_ms: Option<u64>,
    retry_delay_multiplier: Option<f64>,
}

/// Backoff policy shared by action and rollback retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    retry_delay: Duration,
    max_retry_delay: Duration,
    retry_delay_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            retry_delay_multiplier: DEFAULT_RETRY_DELAY_MULTIPLIER,
        }
    }
}

impl RetryConfig {
    /// Parse a retry policy from TOML.
    ///
    /// Recognized keys are `retry-delay-ms`, `max-retry-delay-ms` and
    /// `retry-delay-multiplier`. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed, contains unknown keys, or
    /// the multiplier is negative or not finite.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: RawRetryConfig = toml::from_str(input)?;
        Self::from_raw(raw)
    }

    /// Read and parse a retry policy from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails to parse.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    fn from_raw(raw: RawRetryConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Self {
            retry_delay: raw
                .retry_delay_ms
                .map_or(defaults.retry_delay, Duration::from_millis),
            max_retry_delay: raw
                .max_retry_delay_ms
                .map_or(defaults.max_retry_delay, Duration::from_millis),
            retry_delay_multiplier: raw
                .retry_delay_multiplier
                .unwrap_or(defaults.retry_delay_multiplier),
        }
        .validated()
    }

    pub(crate) fn validated(self) -> Result<Self, ConfigError> {
        if !self.retry_delay_multiplier.is_finite() || self.retry_delay_multiplier < 0.0 {
            return Err(ConfigError::Invalid {
                field: "retry-delay-multiplier",
                reason: format!(
                    "expected a finite, non-negative number, got {}",
                    self.retry_delay_multiplier
                ),
            });
        }
        Ok(self)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    #[must_use]
    pub fn max_retry_delay(&self) -> Duration {
        self.max_retry_delay
    }

    #[must_use]
    pub fn retry_delay_multiplier(&self) -> f64 {
        self.retry_delay_multiplier
    }

    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    #[must_use]
    pub fn with_max_retry_delay(mut self, max_retry_delay: Duration) -> Self {
        self.max_retry_delay = max_retry_delay;
        self
    }

    #[must_use]
    pub fn with_retry_delay_multiplier(mut self, multiplier: f64) -> Self {
        self.retry_delay_multiplier = multiplier;
        self
    }
}
