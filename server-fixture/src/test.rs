//! Helpers for unit testing handlers without opening a socket.

use std::path::PathBuf;

use bytes::Bytes;
use http::Request;
use serde::Serialize;

use crate::context::RequestContext;

/// A test request builder for calling a [`Handler`](crate::handler::Handler) directly.
pub struct TestRequest {
    method: http::Method,
    uri: String,
    headers: http::HeaderMap,
    body: Bytes,
    ctx: RequestContext,
}

impl TestRequest {
    /// Create a request with an arbitrary method.
    pub fn new(method: http::Method, uri: &str) -> Self {
        let mut ctx = RequestContext::new();
        ctx.servlet_path = uri.split('?').next().unwrap_or(uri).to_string();
        Self {
            method,
            uri: uri.to_string(),
            headers: http::HeaderMap::new(),
            body: Bytes::new(),
            ctx,
        }
    }

    /// Create a new GET request
    pub fn get(uri: &str) -> Self {
        Self::new(http::Method::GET, uri)
    }

    /// Create a new POST request
    pub fn post(uri: &str) -> Self {
        Self::new(http::Method::POST, uri)
    }

    /// Add a header to the request
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(
            http::header::HeaderName::from_bytes(key.as_bytes()).expect("invalid header name"),
            http::header::HeaderValue::from_str(value).expect("invalid header value"),
        );
        self
    }

    /// Set a JSON body on the request
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Bytes::from(serde_json::to_vec(body).expect("failed to serialize JSON body"));
        self.headers.insert(
            http::header::CONTENT_TYPE,
            http::header::HeaderValue::from_static("application/json"),
        );
        self
    }

    /// Set raw body bytes
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the document root seen by the handler.
    pub fn doc_base(mut self, doc_base: impl Into<PathBuf>) -> Self {
        self.ctx.doc_base = doc_base.into();
        self
    }

    /// Split the path the way a prefix mapping would.
    pub fn routed(mut self, servlet_path: &str, path_info: Option<&str>) -> Self {
        self.ctx.servlet_path = servlet_path.to_string();
        self.ctx.path_info = path_info.map(str::to_string);
        self
    }

    /// Build the request and the context a handler receives with it.
    pub fn into_request(self) -> (Request<Bytes>, RequestContext) {
        let mut builder = Request::builder().method(self.method).uri(self.uri);

        for (key, value) in self.headers.iter() {
            builder = builder.header(key, value);
        }

        let request = builder.body(self.body).expect("invalid test request");
        (request, self.ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_defaults_to_servlet_path_without_query() {
        let (req, ctx) = TestRequest::get("/proxy/forward?target=a").into_request();
        assert_eq!(req.method(), http::Method::GET);
        assert_eq!(req.uri().path(), "/proxy/forward");
        assert_eq!(req.uri().query(), Some("target=a"));
        assert_eq!(ctx.context_path, "");
        assert_eq!(ctx.servlet_path, "/proxy/forward");
        assert!(ctx.path_info.is_none());
        assert!(req.body().is_empty());
    }

    #[test]
    fn test_post_with_json_body() {
        #[derive(Serialize)]
        struct Target {
            host: String,
        }

        let (req, _) = TestRequest::post("/forward")
            .json(&Target {
                host: "localhost".to_string(),
            })
            .into_request();

        assert_eq!(req.method(), http::Method::POST);
        assert_eq!(req.headers().get("content-type").unwrap(), "application/json");
        assert_eq!(&req.body()[..], br#"{"host":"localhost"}"#);
    }

    #[test]
    fn test_headers_and_raw_body() {
        let (req, _) = TestRequest::new(http::Method::PUT, "/upload")
            .header("x-forwarded-host", "example.test")
            .body("payload")
            .into_request();

        assert_eq!(req.method(), http::Method::PUT);
        assert_eq!(req.headers().get("x-forwarded-host").unwrap(), "example.test");
        assert_eq!(&req.body()[..], b"payload");
    }

    #[test]
    fn test_routed_and_doc_base() {
        let (_, ctx) = TestRequest::get("/static/css/site.css")
            .routed("/static", Some("/css/site.css"))
            .doc_base("/srv/www")
            .into_request();

        assert_eq!(ctx.servlet_path, "/static");
        assert_eq!(ctx.path_info.as_deref(), Some("/css/site.css"));
        assert_eq!(ctx.relative_path(), "/static/css/site.css");
        assert_eq!(ctx.doc_base, PathBuf::from("/srv/www"));
    }
}
