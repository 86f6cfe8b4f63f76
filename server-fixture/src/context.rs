use std::path::PathBuf;
use std::time::Instant;

/// Per-request routing information handed to a [`Handler`](crate::handler::Handler).
///
/// The request path splits into `context_path + servlet_path + path_info`.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    pub start_time: Instant,
    /// Path prefix of the context that accepted the request, `""` for the root.
    pub context_path: String,
    /// The part of the path matched by the URL pattern.
    pub servlet_path: String,
    /// Whatever follows the matched part, if anything.
    pub path_info: Option<String>,
    /// Absolute document root of the context.
    pub doc_base: PathBuf,
    /// Name the handler was registered under.
    pub handler_name: String,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::with_trace_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_trace_id(trace_id: String) -> Self {
        Self {
            trace_id,
            start_time: Instant::now(),
            context_path: String::new(),
            servlet_path: String::new(),
            path_info: None,
            doc_base: PathBuf::from("."),
            handler_name: String::new(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Path relative to the context: `servlet_path` followed by `path_info`.
    pub fn relative_path(&self) -> String {
        match &self.path_info {
            Some(info) => format!("{}{}", self.servlet_path, info),
            None => self.servlet_path.clone(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
