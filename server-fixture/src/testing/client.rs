//! HTTP client for integration testing against a running server.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::{Serialize, de::DeserializeOwned};

use crate::fixture::ServerFixture;

/// A test client for making HTTP requests to a running server.
///
/// # Examples
///
/// ```ignore
/// use server_fixture::prelude::*;
/// use server_fixture::testing::TestClient;
///
/// #[tokio::test]
/// async fn test_default_handler() {
///     let mut fixture = ServerFixture::builder().port(0).wait(0).build();
///     fixture.before_all().unwrap();
///
///     let client = TestClient::for_fixture(&fixture);
///     let response = client.get("/Cargo.toml").send().await;
///     assert_eq!(response.status(), StatusCode::OK);
///
///     fixture.after_all().unwrap();
/// }
/// ```
pub struct TestClient {
    authority: String,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl TestClient {
    /// Creates a client for `host:port`, e.g. `"localhost:8070"`.
    pub fn new(authority: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();

        Self {
            authority: authority.into(),
            client,
        }
    }

    /// Creates a client talking to a socket address directly.
    pub fn for_addr(addr: SocketAddr) -> Self {
        Self::new(addr.to_string())
    }

    /// Creates a client for a fixture whose `before_all` has run.
    ///
    /// Uses the configured host name with the port actually bound. Paths
    /// passed to the request methods must include the context path.
    ///
    /// # Panics
    ///
    /// Panics if the fixture's server is not running.
    pub fn for_fixture(fixture: &ServerFixture) -> Self {
        let addr = fixture
            .local_addr()
            .expect("fixture server is not running");
        Self::new(format!("{}:{}", fixture.config().host(), addr.port()))
    }

    /// Creates a GET request builder.
    pub fn get(&self, path: &str) -> TestRequestBuilder<'_> {
        self.request(Method::GET, path)
    }

    /// Creates a POST request builder.
    pub fn post(&self, path: &str) -> TestRequestBuilder<'_> {
        self.request(Method::POST, path)
    }

    /// Creates a PUT request builder.
    pub fn put(&self, path: &str) -> TestRequestBuilder<'_> {
        self.request(Method::PUT, path)
    }

    /// Creates a DELETE request builder.
    pub fn delete(&self, path: &str) -> TestRequestBuilder<'_> {
        self.request(Method::DELETE, path)
    }

    /// Creates a HEAD request builder.
    pub fn head(&self, path: &str) -> TestRequestBuilder<'_> {
        self.request(Method::HEAD, path)
    }

    /// Creates a request builder with the given method and path.
    pub fn request(&self, method: Method, path: &str) -> TestRequestBuilder<'_> {
        TestRequestBuilder::new(self, method, path)
    }

    /// Returns the `host:port` requests are sent to.
    pub fn authority(&self) -> &str {
        &self.authority
    }
}

/// Builder for constructing test requests.
pub struct TestRequestBuilder<'a> {
    client: &'a TestClient,
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
}

impl<'a> TestRequestBuilder<'a> {
    fn new(client: &'a TestClient, method: Method, path: &str) -> Self {
        Self {
            client,
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Adds a header to the request.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(
            HeaderName::from_bytes(key.as_bytes()).expect("invalid header name"),
            HeaderValue::from_str(value).expect("invalid header value"),
        );
        self
    }

    /// Sets a JSON body on the request.
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Bytes::from(serde_json::to_vec(body).expect("failed to serialize JSON body"));
        self.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self
    }

    /// Sets raw body bytes.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sends the request and returns the response.
    ///
    /// # Panics
    ///
    /// Panics if the connection fails; use [`try_send`](Self::try_send) to
    /// observe connection errors.
    pub async fn send(self) -> TestResponse {
        self.try_send().await.expect("request failed")
    }

    /// Sends the request, returning connection errors instead of panicking.
    pub async fn try_send(
        self,
    ) -> Result<TestResponse, Box<dyn std::error::Error + Send + Sync>> {
        let uri = format!("http://{}{}", self.client.authority, self.path);

        let mut builder = Request::builder().method(self.method).uri(&uri);

        for (key, value) in self.headers.iter() {
            builder = builder.header(key, value);
        }

        let request = builder.body(Full::new(self.body))?;

        let response = self.client.client.request(request).await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await?.to_bytes();

        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }
}

/// Response from a test request.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Returns the HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the response body as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Returns the response body as raw bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Deserializes the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("response body is not valid JSON")
    }

    /// Attempts to deserialize the response body as JSON.
    pub fn try_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
