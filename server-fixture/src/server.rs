//! A small embedded HTTP/1.1 server with servlet-style contexts.
//!
//! The server is configured on the calling thread and then runs on a thread
//! of its own that owns a multi-threaded tokio runtime, so it can be driven
//! from plain `#[test]` functions as well as from async tests.
//!
//! ```no_run
//! use server_fixture::prelude::*;
//!
//! # fn main() -> server_fixture::error::Result<()> {
//! let mut server = EmbeddedServer::new();
//! server.set_hostname("localhost");
//! server.set_port(8080);
//!
//! let context = server.add_context("/app", "./public")?;
//! context.add_handler("DefaultHandler", HandlerType::of::<DefaultHandler>());
//! context.add_mapping("/", "DefaultHandler")?;
//!
//! server.start()?;
//! // ... talk to http://localhost:8080/app/
//! server.stop()?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::convert::Infallible;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::handler::{Handler, HandlerType};
use crate::mapping::MappingTable;
use crate::response::{BoxBody, IntoResponse};

/// Worker threads used when none are configured.
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// How long `stop` lets in-flight requests finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A request-routing context: a path prefix with its own document root,
/// handler registrations and URL mappings.
#[derive(Debug)]
pub struct Context {
    path: String,
    doc_base: PathBuf,
    handlers: Vec<(String, HandlerType)>,
    mappings: MappingTable,
}

impl Context {
    /// Registers a handler type under `name`. Re-using a name replaces the
    /// earlier registration.
    pub fn add_handler(&mut self, name: &str, handler: HandlerType) -> &mut Self {
        debug!(
            context = %self.path,
            handler_name = name,
            handler = handler.type_name(),
            "registering handler"
        );
        match self.handlers.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = handler,
            None => self.handlers.push((name.to_string(), handler)),
        }
        self
    }

    /// Binds a URL pattern to a previously registered handler name.
    pub fn add_mapping(&mut self, pattern: &str, name: &str) -> Result<&mut Self> {
        if !self.handlers.iter().any(|(n, _)| n == name) {
            return Err(Error::UnknownHandler(name.to_string()));
        }
        self.mappings.insert(pattern, name)?;
        debug!(context = %self.path, pattern, handler_name = name, "added mapping");
        Ok(self)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn doc_base(&self) -> &Path {
        &self.doc_base
    }

    pub fn handler(&self, name: &str) -> Option<&HandlerType> {
        self.handlers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, handler)| handler)
    }

    /// Instantiates every registered handler once.
    fn mount(&self) -> MountedContext {
        let handlers = self
            .handlers
            .iter()
            .map(|(name, ty)| (name.clone(), Arc::<dyn Handler>::from(ty.instantiate())))
            .collect();

        MountedContext {
            path: self.path.clone(),
            doc_base: self.doc_base.clone(),
            handlers,
            mappings: self.mappings.clone(),
        }
    }
}

enum State {
    New,
    Running(Running),
    Stopped,
}

struct Running {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

/// The embedded server.
///
/// Lifecycle is strictly `new -> running -> stopped`; a stopped server
/// cannot be started again.
pub struct EmbeddedServer {
    hostname: String,
    port: u16,
    app_base: PathBuf,
    worker_threads: usize,
    contexts: Vec<Context>,
    state: State,
}

impl EmbeddedServer {
    pub fn new() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 8080,
            app_base: PathBuf::from("."),
            worker_threads: DEFAULT_WORKER_THREADS,
            contexts: Vec::new(),
            state: State::New,
        }
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    /// Host name the listening socket binds to.
    ///
    /// Unlike a servlet container, where the host name only selects a
    /// virtual host and the connector listens on every interface, the name
    /// is resolved and bound here: `"localhost"` listens on loopback only,
    /// and a name that does not resolve fails `start` with
    /// [`Error::Resolve`]. Use `"0.0.0.0"` to listen on all interfaces.
    pub fn set_hostname(&mut self, hostname: &str) {
        self.hostname = hostname.to_string();
    }

    /// Base directory that relative context document roots resolve against.
    pub fn set_app_base(&mut self, app_base: impl Into<PathBuf>) {
        self.app_base = app_base.into();
    }

    pub fn set_worker_threads(&mut self, threads: usize) {
        self.worker_threads = threads.max(1);
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn app_base(&self) -> &Path {
        &self.app_base
    }

    /// Adds a context at `path` serving from `doc_base`.
    ///
    /// `"/"` is treated as the root context `""`.
    pub fn add_context(&mut self, path: &str, doc_base: impl AsRef<Path>) -> Result<&mut Context> {
        let path = normalize_context_path(path)?;
        if self.contexts.iter().any(|c| c.path == path) {
            return Err(Error::DuplicateContext(path));
        }

        let doc_base = doc_base.as_ref();
        let doc_base = if doc_base.is_absolute() {
            doc_base.to_path_buf()
        } else {
            self.app_base.join(doc_base)
        };
        debug!(context = %path, doc_base = %doc_base.display(), "added context");

        self.contexts.push(Context {
            path,
            doc_base,
            handlers: Vec::new(),
            mappings: MappingTable::new(),
        });
        let last = self.contexts.len() - 1;
        Ok(&mut self.contexts[last])
    }

    pub fn context(&self, path: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.path == path)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.state, State::Stopped)
    }

    /// The address the server is listening on while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            State::Running(running) => Some(running.local_addr),
            _ => None,
        }
    }

    /// Binds the listening socket and starts serving.
    ///
    /// Returns once the socket is bound; connections arriving before the
    /// accept loop is scheduled wait in the listen backlog.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            State::New => {}
            State::Running(_) => return Err(Error::AlreadyRunning),
            State::Stopped => return Err(Error::Stopped),
        }

        let addr = format!("{}:{}", self.hostname, self.port);
        let listener = bind(&addr)?;
        let local_addr = listener.local_addr().map_err(|source| Error::Bind {
            addr: addr.clone(),
            source,
        })?;

        let mut contexts: Vec<MountedContext> = self.contexts.iter().map(Context::mount).collect();
        // longest path first so nested contexts win over their parents
        contexts.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        let dispatcher = Arc::new(Dispatcher { contexts });

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.worker_threads)
            .thread_name("server-fixture-worker")
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let thread = std::thread::Builder::new()
            .name(format!("server-fixture-{}", local_addr.port()))
            .spawn(move || {
                runtime.block_on(serve(listener, dispatcher, shutdown_rx));
                runtime.shutdown_timeout(SHUTDOWN_GRACE);
            })
            .map_err(Error::Runtime)?;

        info!(addr = %local_addr, contexts = self.contexts.len(), "server started");
        self.state = State::Running(Running {
            local_addr,
            shutdown: shutdown_tx,
            thread,
        });
        Ok(())
    }

    /// Stops the server and releases the listening socket.
    ///
    /// Fails with [`Error::NotStarted`] before `start` and with
    /// [`Error::Stopped`] when called a second time.
    pub fn stop(&mut self) -> Result<()> {
        let running = match std::mem::replace(&mut self.state, State::Stopped) {
            State::Running(running) => running,
            State::New => {
                self.state = State::New;
                return Err(Error::NotStarted);
            }
            State::Stopped => return Err(Error::Stopped),
        };

        let local_addr = running.local_addr;
        // the receiver is gone only if the accept loop already exited
        let _ = running.shutdown.send(());
        running
            .thread
            .join()
            .map_err(|_| Error::ServerThread("server thread panicked".to_string()))?;

        info!(addr = %local_addr, "server stopped");
        Ok(())
    }
}

impl Default for EmbeddedServer {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_context_path(path: &str) -> Result<String> {
    if path.is_empty() || path == "/" {
        return Ok(String::new());
    }
    if !path.starts_with('/') || path.ends_with('/') || path.contains('*') {
        return Err(Error::InvalidContextPath(path.to_string()));
    }
    Ok(path.to_string())
}

/// Binds the first resolved address that accepts the bind.
fn bind(addr: &str) -> Result<std::net::TcpListener> {
    let candidates = addr.to_socket_addrs().map_err(|source| Error::Resolve {
        addr: addr.to_string(),
        source,
    })?;

    let mut last_err = None;
    for candidate in candidates {
        match std::net::TcpListener::bind(candidate) {
            Ok(listener) => {
                listener.set_nonblocking(true).map_err(|source| Error::Bind {
                    addr: addr.to_string(),
                    source,
                })?;
                return Ok(listener);
            }
            Err(err) => {
                debug!(addr = %candidate, error = %err, "bind attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(Error::Bind {
        addr: addr.to_string(),
        source: last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses to bind")
        }),
    })
}

async fn serve(
    listener: std::net::TcpListener,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, "failed to register listener with the runtime");
            return;
        }
    };

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let io = TokioIo::new(stream);
                        let dispatcher = dispatcher.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req: Request<Incoming>| {
                                let dispatcher = dispatcher.clone();
                                async move { Ok::<_, Infallible>(dispatcher.dispatch(req).await) }
                            });

                            if let Err(err) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                debug!(peer = %peer, error = %err, "connection closed with error");
                            }
                        });
                    }
                    Err(err) => warn!(error = %err, "failed to accept connection"),
                }
            }
            // fires on an explicit stop and when the server handle is dropped
            _ = &mut shutdown => break,
        }
    }
}

struct MountedContext {
    path: String,
    doc_base: PathBuf,
    handlers: HashMap<String, Arc<dyn Handler>>,
    mappings: MappingTable,
}

struct Dispatcher {
    contexts: Vec<MountedContext>,
}

impl Dispatcher {
    async fn dispatch(&self, req: Request<Incoming>) -> Response<BoxBody> {
        let mut ctx = RequestContext::new();
        let span = info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            trace_id = %ctx.trace_id,
        );

        async move {
            let response = self.route(req, &mut ctx).await;
            debug!(
                status = response.status().as_u16(),
                handler = %ctx.handler_name,
                duration_ms = ctx.elapsed().as_millis() as u64,
                "request completed"
            );
            response
        }
        .instrument(span)
        .await
    }

    async fn route(&self, req: Request<Incoming>, ctx: &mut RequestContext) -> Response<BoxBody> {
        let path = req.uri().path().to_string();

        let Some((mounted, relative)) = self.find_context(&path) else {
            return StatusCode::NOT_FOUND.into_response();
        };
        let Some((name, found)) = mounted.mappings.resolve(relative) else {
            return StatusCode::NOT_FOUND.into_response();
        };
        let Some(handler) = mounted.handlers.get(name) else {
            return StatusCode::NOT_FOUND.into_response();
        };

        ctx.context_path = mounted.path.clone();
        ctx.servlet_path = found.servlet_path;
        ctx.path_info = found.path_info;
        ctx.doc_base = mounted.doc_base.clone();
        ctx.handler_name = name.to_string();

        let (parts, body) = req.into_parts();
        let body: Bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                debug!(error = %err, "failed to read request body");
                return StatusCode::BAD_REQUEST.into_response();
            }
        };

        handler.handle(Request::from_parts(parts, body), ctx).await
    }

    /// Picks the context owning `path` and returns the context-relative rest.
    fn find_context<'a>(&self, path: &'a str) -> Option<(&MountedContext, &'a str)> {
        self.contexts.iter().find_map(|mounted| {
            let rest = path.strip_prefix(mounted.path.as_str())?;
            (rest.is_empty() || rest.starts_with('/')).then_some((mounted, rest))
        })
    }
}
