//! Logging setup for test binaries.
//!
//! The server and fixture log through `tracing`; install a subscriber with
//! [`TracingConfig`] to see the output.

mod tracing;

pub use self::tracing::TracingConfig;
