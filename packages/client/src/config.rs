//! Client configuration, populated from environment variables.

use std::time::Duration;

use halnav::{DEFAULT_ACCEPT, DEFAULT_USER_AGENT};
use thiserror::Error;

/// Errors from reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a whole number of seconds greater than zero (got {value:?})")]
    InvalidTimeout { var: &'static str, value: String },

    #[error("{var} must not be empty")]
    Empty { var: &'static str },

    #[error("{var} is not a valid HTTP header value: {value:?}")]
    InvalidHeader { var: &'static str, value: String },
}

/// Runtime configuration for the HTTP client.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `HALNAV_TIMEOUT_SECS` | `30` | Per-request timeout |
/// | `HALNAV_USER_AGENT` | `halnav/<version>` | `User-Agent` header |
/// | `HALNAV_ACCEPT` | `application/hal+json,application/json` | `Accept` header |
/// | `HALNAV_CURIE` | (absent) | Session default curie |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Deadline for each request, connection included.
    pub timeout: Duration,
    pub user_agent: String,
    pub accept: String,
    /// Prefix tried for short relation names.
    pub default_curie: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.into(),
            accept: DEFAULT_ACCEPT.into(),
            default_curie: None,
        }
    }
}

impl ClientConfig {
    /// Populate config from environment variables, applying defaults where
    /// absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`ClientConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let timeout = match lookup("HALNAV_TIMEOUT_SECS") {
            None => defaults.timeout,
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        var: "HALNAV_TIMEOUT_SECS",
                        value,
                    })
                }
            },
        };

        let user_agent = header_var(&lookup, "HALNAV_USER_AGENT")?.unwrap_or(defaults.user_agent);
        let accept = header_var(&lookup, "HALNAV_ACCEPT")?.unwrap_or(defaults.accept);

        let default_curie = match lookup("HALNAV_CURIE") {
            Some(prefix) if prefix.trim().is_empty() => {
                return Err(ConfigError::Empty { var: "HALNAV_CURIE" })
            }
            other => other.map(|p| p.trim().to_string()),
        };

        Ok(Self {
            timeout,
            user_agent,
            accept,
            default_curie,
        })
    }
}

fn header_var(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<String>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Err(ConfigError::Empty { var }),
        Some(value) if reqwest::header::HeaderValue::from_str(&value).is_err() => {
            Err(ConfigError::InvalidHeader { var, value })
        }
        Some(value) => Ok(Some(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("halnav/"));
    }

    #[test]
    fn reads_every_variable() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("HALNAV_TIMEOUT_SECS", "5"),
            ("HALNAV_USER_AGENT", "tester/1.0"),
            ("HALNAV_ACCEPT", "application/hal+json"),
            ("HALNAV_CURIE", "acme"),
        ]))
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "tester/1.0");
        assert_eq!(config.accept, "application/hal+json");
        assert_eq!(config.default_curie.as_deref(), Some("acme"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("HALNAV_TIMEOUT_SECS", "soon")])),
            Err(ConfigError::InvalidTimeout { .. })
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("HALNAV_TIMEOUT_SECS", "0")])),
            Err(ConfigError::InvalidTimeout { .. })
        ));
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[("HALNAV_CURIE", " ")])),
            Err(ConfigError::Empty { var: "HALNAV_CURIE" })
        );
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("HALNAV_USER_AGENT", "bad\nagent")])),
            Err(ConfigError::InvalidHeader { .. })
        ));
    }
}
