//! Retry policy for per-image builds.
//!
//! A build is retried only when its error is recoverable (a failed or timed
//! out container command, an I/O hiccup). Engine and argument errors fail at
//! once.

use tokio::time::Duration;

/// Environment variable overriding the retry count
pub const RETRY_ENV_VAR: &str = "KODEGEN_CROSS_RETRY_BUILD";

/// Highest accepted retry count
pub const MAX_BUILD_RETRIES: u32 = 5;

/// Longest wait between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How often a failed image build is attempted again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first (0 = try once)
    pub build_retries: u32,

    /// Wait before the first retry, doubled for each further one
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            build_retries: 0,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy with `build_retries` extra attempts and the default backoff
    pub fn new(build_retries: u32) -> Self {
        Self {
            build_retries,
            ..Self::default()
        }
    }

    /// Replace the base backoff
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Policy from [`RETRY_ENV_VAR`], clamped to [`MAX_BUILD_RETRIES`].
    ///
    /// Unset or unparsable values fall back to no retries.
    pub fn from_env() -> Self {
        Self::new(parse_retry_env(
            std::env::var(RETRY_ENV_VAR).ok().as_deref(),
        ))
    }

    /// Validate the retry count is reasonable
    pub fn validate(&self) -> Result<(), String> {
        if self.build_retries > MAX_BUILD_RETRIES {
            return Err(format!(
                "build retry count too high: {} (max: {})",
                self.build_retries, MAX_BUILD_RETRIES
            ));
        }
        Ok(())
    }

    /// Wait before retry number `retry` (1-based): base, 2x base, 4x base...
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

fn parse_retry_env(value: Option<&str>) -> u32 {
    value
        .and_then(|s| s.trim().parse::<u32>().ok())
        .map(|v| v.min(MAX_BUILD_RETRIES))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_env_clamps() {
        assert_eq!(parse_retry_env(None), 0);
        assert_eq!(parse_retry_env(Some("2")), 2);
        assert_eq!(parse_retry_env(Some("99")), MAX_BUILD_RETRIES);
        assert_eq!(parse_retry_env(Some("lots")), 0);
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::new(MAX_BUILD_RETRIES).validate().is_ok());
        assert!(RetryPolicy::new(MAX_BUILD_RETRIES + 1).validate().is_err());
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(3);
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(20), MAX_BACKOFF);
        assert_eq!(policy.with_backoff(Duration::ZERO).delay(3), Duration::ZERO);
    }
}
