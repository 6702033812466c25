//! Configuration validation utilities.

use std::time::Duration;

use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}

/// Parse a duration string with humantime (`100ms`, `30s`, `1h30m`, ...).
///
/// Used for CLI overrides; YAML fields go through `humantime_serde`.
///
/// # Examples
///
/// ```
/// use vigil::config::parse_duration;
///
/// assert_eq!(parse_duration("250ms").unwrap().as_millis(), 250);
/// assert_eq!(parse_duration("1m").unwrap().as_secs(), 60);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Expand `${VAR}` and `${VAR:-default}` references from the environment.
///
/// Unset variables without a default expand to the empty string.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let default_value = caps.get(2).map_or("", |m| m.as_str());
            std::env::var(&caps[1]).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_duration(" 5s ").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("fast").is_err());
    }

    #[test]
    fn test_expand_env_vars_defaults() {
        assert_eq!(expand_env_vars("plain"), "plain");
        assert_eq!(
            expand_env_vars("${VIGIL_TEST_UNSET_91823:-fallback}"),
            "fallback"
        );
        assert_eq!(expand_env_vars("a${VIGIL_TEST_UNSET_91823}b"), "ab");
    }

    #[test]
    fn test_expand_env_vars_from_env() {
        // SAFETY: test-specific variable, not read by any other test.
        unsafe {
            std::env::set_var("VIGIL_TEST_INFLUX_PASSWORD", "s3cret");
        }
        assert_eq!(
            expand_env_vars("${VIGIL_TEST_INFLUX_PASSWORD:-none}"),
            "s3cret"
        );
        // SAFETY: cleanup of the variable set above.
        unsafe {
            std::env::remove_var("VIGIL_TEST_INFLUX_PASSWORD");
        }
    }
}
