//! The handler registered when no other handler type is configured.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use new_mime_guess::MimeGuess;
use tracing::debug;

use crate::context::RequestContext;
use crate::handler::{BoxFuture, Handler};
use crate::response::{BoxBody, IntoResponse};

/// Serves files from the context's document root.
///
/// Only `GET` and `HEAD` are accepted. Directories, missing files and paths
/// that try to leave the document root all answer `404 Not Found`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHandler;

impl Handler for DefaultHandler {
    fn handle<'a>(
        &'a self,
        req: Request<Bytes>,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Response<BoxBody>> {
        Box::pin(async move {
            let head_only = match *req.method() {
                Method::GET => false,
                Method::HEAD => true,
                _ => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
            };

            let Some(path) = resolve_file(&ctx.doc_base, &ctx.relative_path()) else {
                return StatusCode::NOT_FOUND.into_response();
            };

            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => {}
                _ => return StatusCode::NOT_FOUND.into_response(),
            }

            let contents = match tokio::fs::read(&path).await {
                Ok(contents) => contents,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "failed to read file");
                    return StatusCode::NOT_FOUND.into_response();
                }
            };

            file_response(&path, contents, head_only)
        })
    }
}

/// Maps a context-relative request path onto the document root.
///
/// Returns `None` for paths containing `..` or anything other than plain
/// file name segments.
fn resolve_file(doc_base: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = doc_base.to_path_buf();
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => path.push(name),
            (Some(Component::CurDir), None) => {}
            _ => return None,
        }
    }
    Some(path)
}

fn file_response(path: &Path, contents: Vec<u8>, head_only: bool) -> Response<BoxBody> {
    let mime = MimeGuess::from_path(path).first_or_octet_stream();
    let length = contents.len();
    let body = if head_only {
        Bytes::new()
    } else {
        Bytes::from(contents)
    };

    let mut response = Response::new(Full::new(body));
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestRequest;
    use http_body_util::BodyExt;

    fn doc_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css").join("site.css"), "body{}").unwrap();
        std::fs::create_dir_all(dir.path().join("static").join("css")).unwrap();
        std::fs::write(dir.path().join("static").join("css").join("app.css"), "main{}").unwrap();
        dir
    }

    #[test]
    fn test_resolve_file_rejects_traversal() {
        let base = Path::new("/srv/www");
        assert_eq!(
            resolve_file(base, "/css/site.css"),
            Some(PathBuf::from("/srv/www/css/site.css"))
        );
        assert_eq!(resolve_file(base, "/./a"), Some(PathBuf::from("/srv/www/a")));
        assert_eq!(resolve_file(base, "/../etc/passwd"), None);
        assert_eq!(resolve_file(base, "/a/../../b"), None);
    }

    #[tokio::test]
    async fn test_serves_file_with_content_type() {
        let dir = doc_root();
        let (req, ctx) = TestRequest::get("/index.html").doc_base(dir.path()).into_request();

        let response = DefaultHandler.handle(req, &ctx).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "text/html");
        assert_eq!(response.headers().get("content-length").unwrap(), "11");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"<h1>hi</h1>");
    }

    #[tokio::test]
    async fn test_serves_file_below_prefix_mapping() {
        let dir = doc_root();
        let (req, ctx) = TestRequest::get("/static/css/app.css")
            .routed("/static", Some("/css/app.css"))
            .doc_base(dir.path())
            .into_request();

        let response = DefaultHandler.handle(req, &ctx).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "text/css");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"main{}");

        // path info alone is not looked up at the document root
        let (req, ctx) = TestRequest::get("/static/css/site.css")
            .routed("/static", Some("/css/site.css"))
            .doc_base(dir.path())
            .into_request();
        assert_eq!(DefaultHandler.handle(req, &ctx).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_head_has_length_but_no_body() {
        let dir = doc_root();
        let (req, ctx) = TestRequest::new(Method::HEAD, "/index.html")
            .doc_base(dir.path())
            .into_request();

        let response = DefaultHandler.handle(req, &ctx).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-length").unwrap(), "11");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_and_directory_are_not_found() {
        let dir = doc_root();

        let (req, ctx) = TestRequest::get("/missing.txt").doc_base(dir.path()).into_request();
        assert_eq!(DefaultHandler.handle(req, &ctx).await.status(), StatusCode::NOT_FOUND);

        let (req, ctx) = TestRequest::get("/css").doc_base(dir.path()).into_request();
        assert_eq!(DefaultHandler.handle(req, &ctx).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_other_methods_not_allowed() {
        let dir = doc_root();
        let (req, ctx) = TestRequest::post("/index.html")
            .body("x")
            .doc_base(dir.path())
            .into_request();

        let response = DefaultHandler.handle(req, &ctx).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
