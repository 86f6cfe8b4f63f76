//! The server test fixture.
//!
//! A [`ServerFixture`] starts an [`EmbeddedServer`] before the tests of a
//! suite run and stops it afterwards, with one handler type mounted at a
//! configurable path.
//!
//! ```no_run
//! use server_fixture::prelude::*;
//!
//! # #[derive(Default)]
//! # struct ReverseProxyHandler;
//! # impl Handler for ReverseProxyHandler {
//! #     fn handle<'a>(
//! #         &'a self,
//! #         _req: http::Request<bytes::Bytes>,
//! #         _ctx: &'a RequestContext,
//! #     ) -> BoxFuture<'a, http::Response<BoxBody>> {
//! #         Box::pin(async { StatusCode::OK.into_response() })
//! #     }
//! # }
//! # fn main() -> server_fixture::error::Result<()> {
//! let mut fixture = ServerFixture::builder()
//!     .host("localhost")
//!     .port(8070)
//!     .clazz::<ReverseProxyHandler>()
//!     .build();
//!
//! fixture.before_all()?;
//! // requests to http://localhost:8070/ reach ReverseProxyHandler
//! fixture.after_all()?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::info;

use crate::config::{ConfigError, get_env, get_env_parsed_opt, load_dotenv};
use crate::error::{Error, Result};
use crate::handler::{Handler, HandlerType};
use crate::lifecycle::Extension;
use crate::server::EmbeddedServer;
use crate::static_files::DefaultHandler;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8086;
pub const DEFAULT_WAIT_MS: u64 = 1000;
pub const DEFAULT_APP_BASE: &str = ".";
pub const DEFAULT_DOC_BASE: &str = ".";
pub const DEFAULT_CONTEXT: &str = "";
pub const DEFAULT_MAPPING: &str = "/";

pub const ENV_HOST: &str = "SERVER_FIXTURE_HOST";
pub const ENV_PORT: &str = "SERVER_FIXTURE_PORT";
pub const ENV_APP_BASE: &str = "SERVER_FIXTURE_APP_BASE";
pub const ENV_DOC_BASE: &str = "SERVER_FIXTURE_DOC_BASE";
pub const ENV_CONTEXT: &str = "SERVER_FIXTURE_CONTEXT";
pub const ENV_MAPPING: &str = "SERVER_FIXTURE_MAPPING";
pub const ENV_WAIT_MS: &str = "SERVER_FIXTURE_WAIT_MS";

/// Immutable fixture settings produced by [`Builder::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureConfig {
    handler: HandlerType,
    host: String,
    port: u16,
    app_base: PathBuf,
    doc_base: PathBuf,
    context: String,
    mapping: String,
    wait_ms: u64,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            handler: HandlerType::of::<DefaultHandler>(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            app_base: PathBuf::from(DEFAULT_APP_BASE),
            doc_base: PathBuf::from(DEFAULT_DOC_BASE),
            context: DEFAULT_CONTEXT.to_string(),
            mapping: DEFAULT_MAPPING.to_string(),
            wait_ms: DEFAULT_WAIT_MS,
        }
    }
}

impl FixtureConfig {
    pub fn handler(&self) -> HandlerType {
        self.handler
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn app_base(&self) -> &Path {
        &self.app_base
    }

    pub fn doc_base(&self) -> &Path {
        &self.doc_base
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn mapping(&self) -> &str {
        &self.mapping
    }

    /// Post-start delay in milliseconds.
    pub fn wait_ms(&self) -> u64 {
        self.wait_ms
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

/// Fluent builder for [`ServerFixture`]. Every setter overwrites the previous
/// value; nothing is validated until the server is started.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: FixtureConfig,
}

impl Builder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the handler type mounted by the fixture.
    pub fn clazz<H: Handler + Default>(self) -> Self {
        self.handler_type(HandlerType::of::<H>())
    }

    pub fn handler_type(mut self, handler: HandlerType) -> Self {
        self.config.handler = handler;
        self
    }

    pub fn app_base(mut self, app_base: impl Into<PathBuf>) -> Self {
        self.config.app_base = app_base.into();
        self
    }

    pub fn doc_base(mut self, doc_base: impl Into<PathBuf>) -> Self {
        self.config.doc_base = doc_base.into();
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.config.context = context.into();
        self
    }

    pub fn mapping(mut self, mapping: impl Into<String>) -> Self {
        self.config.mapping = mapping.into();
        self
    }

    /// Milliseconds to sleep after the server has started.
    pub fn wait(mut self, millis: u64) -> Self {
        self.config.wait_ms = millis;
        self
    }

    /// Overlays settings from `SERVER_FIXTURE_*` environment variables,
    /// loading a `.env` file first if there is one.
    ///
    /// Only variables that are set are applied, so setters called after
    /// this still win.
    pub fn from_env(mut self) -> std::result::Result<Self, ConfigError> {
        load_dotenv();

        if let Ok(host) = get_env(ENV_HOST) {
            self.config.host = host;
        }
        if let Some(port) = get_env_parsed_opt(ENV_PORT)? {
            self.config.port = port;
        }
        if let Ok(app_base) = get_env(ENV_APP_BASE) {
            self.config.app_base = PathBuf::from(app_base);
        }
        if let Ok(doc_base) = get_env(ENV_DOC_BASE) {
            self.config.doc_base = PathBuf::from(doc_base);
        }
        if let Ok(context) = get_env(ENV_CONTEXT) {
            self.config.context = context;
        }
        if let Ok(mapping) = get_env(ENV_MAPPING) {
            self.config.mapping = mapping;
        }
        if let Some(wait_ms) = get_env_parsed_opt(ENV_WAIT_MS)? {
            self.config.wait_ms = wait_ms;
        }

        Ok(self)
    }

    pub fn build(self) -> ServerFixture {
        ServerFixture {
            config: self.config,
            server: None,
        }
    }
}

/// Runs an [`EmbeddedServer`] for the duration of a test suite.
///
/// The hooks come from [`Extension`]: `before_all` creates, configures and
/// starts the server, then blocks for the configured wait; `after_all` stops
/// it. Neither hook translates errors.
pub struct ServerFixture {
    config: FixtureConfig,
    server: Option<EmbeddedServer>,
}

impl ServerFixture {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// The server handle, present once `before_all` has run.
    pub fn server(&self) -> Option<&EmbeddedServer> {
        self.server.as_ref()
    }

    /// The bound address while the server is running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().and_then(EmbeddedServer::local_addr)
    }

    /// `http://{host}:{bound port}{context}` while the server is running.
    pub fn base_url(&self) -> Option<String> {
        let addr = self.local_addr()?;
        let context = match self.config.context.as_str() {
            "/" => "",
            other => other,
        };
        Some(format!("http://{}:{}{}", self.config.host, addr.port(), context))
    }

    /// Absolute URL of `path` below the context.
    pub fn url(&self, path: &str) -> Option<String> {
        self.base_url().map(|base| format!("{}{}", base, path))
    }
}

impl Extension for ServerFixture {
    fn before_all(&mut self) -> Result<()> {
        if let Some(server) = &self.server {
            if server.is_running() {
                return Err(Error::AlreadyRunning);
            }
            if server.is_stopped() {
                return Err(Error::Stopped);
            }
        }

        let config = &self.config;
        let server = self.server.insert(EmbeddedServer::new());
        server.set_port(config.port);
        server.set_hostname(&config.host);
        server.set_app_base(config.app_base.clone());

        let doc_base =
            std::path::absolute(&config.doc_base).map_err(|source| Error::DocBase {
                path: config.doc_base.clone(),
                source,
            })?;
        let name = config.handler.simple_name();
        let context = server.add_context(&config.context, &doc_base)?;
        context.add_handler(name, config.handler);
        context.add_mapping(&config.mapping, name)?;

        server.start()?;
        info!(
            handler = config.handler.type_name(),
            host = %config.host,
            port = config.port,
            context = %config.context,
            mapping = %config.mapping,
            wait_ms = config.wait_ms,
            "fixture server started"
        );

        thread::sleep(config.wait());
        Ok(())
    }

    fn after_all(&mut self) -> Result<()> {
        match self.server.as_mut() {
            Some(server) => server.stop(),
            None => Err(Error::NotStarted),
        }
    }
}
