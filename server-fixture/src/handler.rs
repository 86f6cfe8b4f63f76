//! The request handler contract and the type-level handle used to register
//! handlers by name.

use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::{Request, Response};

use crate::context::RequestContext;
use crate::response::BoxBody;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A request handler mounted by the embedded server.
///
/// The server creates exactly one instance per registration when it starts,
/// so handler types must implement `Default` to be registered through
/// [`HandlerType::of`]. The request body has already been read in full.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use http::{Request, Response};
/// use server_fixture::prelude::*;
///
/// #[derive(Default)]
/// struct EchoHandler;
///
/// impl Handler for EchoHandler {
///     fn handle<'a>(
///         &'a self,
///         req: Request<Bytes>,
///         _ctx: &'a RequestContext,
///     ) -> BoxFuture<'a, Response<BoxBody>> {
///         Box::pin(async move { String::from_utf8_lossy(req.body()).into_owned().into_response() })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn handle<'a>(
        &'a self,
        req: Request<Bytes>,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Response<BoxBody>>;
}

/// A handler type that the server can instantiate on its own.
///
/// Captures the fully qualified type name and a factory producing a fresh,
/// default-constructed instance.
#[derive(Clone, Copy)]
pub struct HandlerType {
    type_name: &'static str,
    factory: fn() -> Box<dyn Handler>,
}

impl HandlerType {
    /// Describes the handler type `H`.
    pub fn of<H: Handler + Default>() -> Self {
        Self {
            type_name: type_name::<H>(),
            factory: || Box::new(H::default()),
        }
    }

    /// Fully qualified type name, e.g. `my_tests::proxy::ReverseProxyHandler`.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Last path segment of the type name without generic arguments,
    /// e.g. `ReverseProxyHandler`.
    pub fn simple_name(&self) -> &'static str {
        let base = self.type_name.split('<').next().unwrap_or(self.type_name);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Creates a new instance of the handler.
    pub fn instantiate(&self) -> Box<dyn Handler> {
        (self.factory)()
    }
}

impl fmt::Debug for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerType")
            .field("type_name", &self.type_name)
            .finish()
    }
}

impl PartialEq for HandlerType {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
    }
}

impl Eq for HandlerType {}
