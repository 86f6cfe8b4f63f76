//! Start an embedded HTTP server around a test suite.
//!
//! [`ServerFixture`](fixture::ServerFixture) is built with a fluent builder,
//! starts an [`EmbeddedServer`](server::EmbeddedServer) in its `before_all`
//! hook with one [`Handler`](handler::Handler) type mounted under a context
//! path and URL pattern, and stops it again in `after_all`.

pub mod config;
pub mod context;
pub mod error;
pub mod fixture;
pub mod handler;
pub mod lifecycle;
pub mod mapping;
pub mod observability;
pub mod response;
pub mod server;
pub mod static_files;
pub mod test;
pub mod testing;

pub mod prelude {
    pub use crate::context::RequestContext;
    pub use crate::error::{Error, Result};
    pub use crate::fixture::{FixtureConfig, ServerFixture};
    pub use crate::handler::{BoxFuture, Handler, HandlerType};
    pub use crate::lifecycle::{Extension, run_with};
    pub use crate::response::{BoxBody, IntoResponse};
    pub use crate::server::{Context, EmbeddedServer};
    pub use crate::static_files::DefaultHandler;

    pub use http::{Method, StatusCode};
}
