//! Suite-level lifecycle hooks.
//!
//! Rust's test harness has no per-suite callbacks, so the hooks are plain
//! methods that a test (or a shared setup function) invokes, and
//! [`run_with`] sequences them around a body the way a test framework would.

use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::error::Result;

/// Callbacks invoked once before and once after all tests of a suite.
pub trait Extension {
    fn before_all(&mut self) -> Result<()>;

    fn after_all(&mut self) -> Result<()>;
}

/// Runs `body` between `before_all` and `after_all`.
///
/// `after_all` runs even when `before_all` fails; the `before_all` error is
/// returned in that case and the teardown error, if any, is only logged.
/// A panic in `body` still runs `after_all` and is then resumed, so a failed
/// assertion never leaves the server behind.
///
/// # Examples
///
/// ```no_run
/// use server_fixture::prelude::*;
///
/// let mut fixture = ServerFixture::builder().port(0).wait(0).build();
/// let url = run_with(&mut fixture, |fixture| fixture.base_url()).unwrap();
/// assert!(url.is_some());
/// ```
pub fn run_with<E, T, F>(extension: &mut E, body: F) -> Result<T>
where
    E: Extension + ?Sized,
    F: FnOnce(&mut E) -> T,
{
    if let Err(err) = extension.before_all() {
        if let Err(teardown) = extension.after_all() {
            warn!(error = %teardown, "after_all failed following a before_all failure");
        }
        return Err(err);
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut *extension)));
    match outcome {
        Ok(output) => {
            extension.after_all()?;
            Ok(output)
        }
        Err(payload) => {
            if let Err(teardown) = extension.after_all() {
                warn!(error = %teardown, "after_all failed following a panic in the test body");
            }
            panic::resume_unwind(payload)
        }
    }
}
