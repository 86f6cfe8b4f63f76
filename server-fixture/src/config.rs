//! Environment-driven configuration helpers.
//!
//! Fixture settings can be overridden from environment variables or a `.env`
//! file, see [`Builder::from_env`](crate::fixture::Builder::from_env).

use std::env;
use std::str::FromStr;

/// Load environment variables from a `.env` file if it exists.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Get a required environment variable.
pub fn get_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key.to_string()))
}

/// Get and parse an environment variable that may be absent.
///
/// Absent is `Ok(None)`; present but unparsable is an error.
pub fn get_env_parsed_opt<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => parse_value(key, value).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_value<T: FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value,
    })
}

/// Configuration loading errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Environment variable is not set.
    Missing(String),
    /// Environment variable value is invalid.
    Invalid { key: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => {
                write!(f, "Missing required environment variable '{}'", key)
            }
            ConfigError::Invalid { key, value } => {
                write!(
                    f,
                    "Invalid value '{}' for environment variable '{}' (failed to parse as expected type)",
                    value, key
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_get_env_missing() {
        let result = get_env("SERVER_FIXTURE_TEST_MISSING_VAR_12345");
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_get_env_present() {
        unsafe { env::set_var("SERVER_FIXTURE_TEST_HOST", "127.0.0.1") };
        let value = get_env("SERVER_FIXTURE_TEST_HOST");
        unsafe { env::remove_var("SERVER_FIXTURE_TEST_HOST") };
        assert_eq!(value.unwrap(), "127.0.0.1");
    }

    #[test]
    fn test_get_env_parsed_opt_missing_is_none() {
        let value: Option<u16> =
            get_env_parsed_opt("SERVER_FIXTURE_TEST_MISSING_VAR_12345").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    #[serial]
    fn test_get_env_parsed_opt_invalid() {
        unsafe { env::set_var("SERVER_FIXTURE_TEST_BAD_PORT", "eighty") };
        let result: Result<Option<u16>, _> = get_env_parsed_opt("SERVER_FIXTURE_TEST_BAD_PORT");
        unsafe { env::remove_var("SERVER_FIXTURE_TEST_BAD_PORT") };

        match result {
            Err(ConfigError::Invalid { key, value }) => {
                assert_eq!(key, "SERVER_FIXTURE_TEST_BAD_PORT");
                assert_eq!(value, "eighty");
            }
            other => panic!("expected invalid value error, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_get_env_parsed_opt_present() {
        unsafe { env::set_var("SERVER_FIXTURE_TEST_PORT", "8070") };
        let value: Option<u16> = get_env_parsed_opt("SERVER_FIXTURE_TEST_PORT").unwrap();
        unsafe { env::remove_var("SERVER_FIXTURE_TEST_PORT") };
        assert_eq!(value, Some(8070));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Missing("SERVER_FIXTURE_HOST".to_string());
        assert_eq!(
            err.to_string(),
            "Missing required environment variable 'SERVER_FIXTURE_HOST'"
        );

        let err = ConfigError::Invalid {
            key: "SERVER_FIXTURE_PORT".to_string(),
            value: "abc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value 'abc' for environment variable 'SERVER_FIXTURE_PORT' (failed to parse as expected type)"
        );
    }
}
