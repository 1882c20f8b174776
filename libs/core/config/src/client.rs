use crate::{env_or_default, env_parse_or, ConfigError, FromEnv};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://todo-app.pioneeralpha.com";

/// Settings for talking to the todo REST backend
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL without a trailing slash, e.g. `https://todo.example.com`
    pub base_url: String,
    pub request_timeout: Duration,
    /// Settle window applied to free-text search before a reload is issued
    pub search_debounce: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            ..Self::default()
        }
    }

    pub fn with_search_debounce(mut self, debounce: Duration) -> Self {
        self.search_debounce = debounce;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

impl FromEnv for ClientConfig {
    /// Reads from environment variables with defaults:
    /// - TODO_API_URL: defaults to the hosted backend
    /// - TODO_REQUEST_TIMEOUT_SECS: defaults to 30
    /// - TODO_SEARCH_DEBOUNCE_MS: defaults to 300
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = normalize_base_url(env_or_default("TODO_API_URL", DEFAULT_API_URL));
        if base_url.is_empty() {
            return Err(ConfigError::ParseError {
                key: "TODO_API_URL".to_string(),
                details: "must not be empty".to_string(),
            });
        }

        let timeout_secs: u64 = env_parse_or("TODO_REQUEST_TIMEOUT_SECS", 30)?;
        let debounce_ms: u64 = env_parse_or("TODO_SEARCH_DEBOUNCE_MS", 300)?;

        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            search_debounce: Duration::from_millis(debounce_ms),
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            search_debounce: Duration::from_millis(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_from_env_with_defaults() {
        temp_env::with_vars(
            [
                ("TODO_API_URL", None::<&str>),
                ("TODO_REQUEST_TIMEOUT_SECS", None::<&str>),
                ("TODO_SEARCH_DEBOUNCE_MS", None::<&str>),
            ],
            || {
                let config = ClientConfig::from_env().unwrap();
                assert_eq!(config.base_url, DEFAULT_API_URL);
                assert_eq!(config.request_timeout, Duration::from_secs(30));
                assert_eq!(config.search_debounce, Duration::from_millis(300));
            },
        );
    }

    #[test]
    fn test_client_config_strips_trailing_slash() {
        temp_env::with_var("TODO_API_URL", Some("http://localhost:8000/"), || {
            let config = ClientConfig::from_env().unwrap();
            assert_eq!(config.base_url, "http://localhost:8000");
        });
    }

    #[test]
    fn test_client_config_custom_values() {
        temp_env::with_vars(
            [
                ("TODO_API_URL", Some("http://127.0.0.1:9000")),
                ("TODO_REQUEST_TIMEOUT_SECS", Some("5")),
                ("TODO_SEARCH_DEBOUNCE_MS", Some("50")),
            ],
            || {
                let config = ClientConfig::from_env().unwrap();
                assert_eq!(config.base_url, "http://127.0.0.1:9000");
                assert_eq!(config.request_timeout, Duration::from_secs(5));
                assert_eq!(config.search_debounce, Duration::from_millis(50));
            },
        );
    }

    #[test]
    fn test_client_config_invalid_timeout() {
        temp_env::with_var("TODO_REQUEST_TIMEOUT_SECS", Some("soon"), || {
            let err = ClientConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("TODO_REQUEST_TIMEOUT_SECS"));
        });
    }

    #[test]
    fn test_client_config_new_normalizes_url() {
        let config = ClientConfig::new("http://localhost:8000//");
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.search_debounce, Duration::from_millis(300));
    }
}
