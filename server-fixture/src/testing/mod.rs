//! Testing utilities for talking to a running fixture.
//!
//! The client sends real HTTP requests over a socket, so it exercises the
//! embedded server end to end.

mod client;

pub use client::{TestClient, TestRequestBuilder, TestResponse};
