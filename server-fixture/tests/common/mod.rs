//! Handlers shared by the integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use http::{Request, Response};
use server_fixture::prelude::*;

/// Answers with the request body, prefixed by the method.
#[derive(Default)]
pub struct EchoHandler;

impl Handler for EchoHandler {
    fn handle<'a>(
        &'a self,
        req: Request<Bytes>,
        _ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Response<BoxBody>> {
        Box::pin(async move {
            format!("{} {}", req.method(), String::from_utf8_lossy(req.body())).into_response()
        })
    }
}

/// Answers with how the request was routed: `context|servlet|path_info`.
#[derive(Default)]
pub struct RouteHandler;

impl Handler for RouteHandler {
    fn handle<'a>(
        &'a self,
        _req: Request<Bytes>,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Response<BoxBody>> {
        Box::pin(async move {
            format!(
                "{}|{}|{}",
                ctx.context_path,
                ctx.servlet_path,
                ctx.path_info.as_deref().unwrap_or("-")
            )
            .into_response()
        })
    }
}

pub fn init_tracing() {
    server_fixture::observability::TracingConfig::new()
        .for_tests()
        .try_init();
}
