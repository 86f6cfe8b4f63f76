//! Error handling for the embedded server and the fixture that drives it.
//!
//! The fixture never translates errors: whatever the server reports while
//! configuring, starting or stopping is handed back to the caller unchanged.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::config::ConfigError;

/// Convenient alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while configuring or running the server.
#[derive(Debug)]
pub enum Error {
    /// The listening socket could not be bound.
    Bind { addr: String, source: io::Error },
    /// The host/port pair did not resolve to a socket address.
    Resolve { addr: String, source: io::Error },
    /// The worker runtime or server thread could not be created.
    Runtime(io::Error),
    /// A context path that is neither empty nor `/segment[/segment...]`.
    InvalidContextPath(String),
    /// The document root could not be made absolute.
    DocBase { path: PathBuf, source: io::Error },
    /// A second context was added under an existing path.
    DuplicateContext(String),
    /// A URL pattern that is not one of the supported mapping forms.
    InvalidMapping(String),
    /// A mapping refers to a handler name that was never registered.
    UnknownHandler(String),
    /// `start` was called on a server that is already running.
    AlreadyRunning,
    /// `stop` was called on a server that was never started.
    NotStarted,
    /// The server has been stopped and cannot be used again.
    Stopped,
    /// The server thread terminated abnormally.
    ServerThread(String),
    /// Configuration could not be loaded from the environment.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bind { addr, source } => write!(f, "failed to bind {}: {}", addr, source),
            Error::Resolve { addr, source } => {
                write!(f, "failed to resolve address '{}': {}", addr, source)
            }
            Error::Runtime(source) => write!(f, "failed to start server runtime: {}", source),
            Error::InvalidContextPath(path) => write!(
                f,
                "invalid context path '{}': must be empty or start with '/' and not end with '/'",
                path
            ),
            Error::DocBase { path, source } => {
                write!(f, "invalid document root '{}': {}", path.display(), source)
            }
            Error::DuplicateContext(path) => {
                write!(f, "a context is already registered at '{}'", path)
            }
            Error::InvalidMapping(pattern) => write!(f, "invalid URL pattern '{}'", pattern),
            Error::UnknownHandler(name) => {
                write!(f, "no handler registered under the name '{}'", name)
            }
            Error::AlreadyRunning => write!(f, "server is already running"),
            Error::NotStarted => write!(f, "server has not been started"),
            Error::Stopped => write!(f, "server has been stopped and cannot be reused"),
            Error::ServerThread(message) => write!(f, "server thread failed: {}", message),
            Error::Config(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Bind { source, .. }
            | Error::Resolve { source, .. }
            | Error::DocBase { source, .. } => Some(source),
            Error::Runtime(source) => Some(source),
            Error::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_bind_error_display_includes_address() {
        let err = Error::Bind {
            addr: "localhost:8086".to_string(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };
        assert_eq!(err.to_string(), "failed to bind localhost:8086: address in use");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_lifecycle_error_display() {
        assert_eq!(Error::NotStarted.to_string(), "server has not been started");
        assert_eq!(Error::AlreadyRunning.to_string(), "server is already running");
        assert_eq!(
            Error::Stopped.to_string(),
            "server has been stopped and cannot be reused"
        );
        assert!(Error::NotStarted.source().is_none());
    }

    #[test]
    fn test_doc_base_error_display() {
        let err = Error::DocBase {
            path: PathBuf::new(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "cannot make an empty path absolute"),
        };
        assert_eq!(
            err.to_string(),
            "invalid document root '': cannot make an empty path absolute"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_mapping_error_display() {
        let err = Error::InvalidMapping("/a/*/b".to_string());
        assert_eq!(err.to_string(), "invalid URL pattern '/a/*/b'");
    }

    #[test]
    fn test_config_error_converts() {
        let err: Error = ConfigError::Missing("SERVER_FIXTURE_PORT".to_string()).into();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(
            err.to_string(),
            "Missing required environment variable 'SERVER_FIXTURE_PORT'"
        );
    }
}
