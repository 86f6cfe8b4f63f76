//! URL pattern mapping inside a context.
//!
//! Patterns follow the servlet container rules:
//!
//! | pattern   | kind         | matches                                   |
//! |-----------|--------------|-------------------------------------------|
//! | `""`      | context root | exactly `/`                               |
//! | `"/"`     | default      | anything nothing else matched             |
//! | `"/a/*"`  | prefix       | `/a` and everything below it              |
//! | `"*.txt"` | extension    | paths whose last segment ends in `.txt`   |
//! | `"/a/b"`  | exact        | exactly `/a/b`                            |
//!
//! Resolution order is exact, longest prefix, extension, default.

use crate::error::{Error, Result};

/// A parsed URL pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mapping {
    ContextRoot,
    Default,
    Exact(String),
    Prefix(String),
    Extension(String),
}

/// The outcome of matching a path against a [`Mapping`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    pub servlet_path: String,
    pub path_info: Option<String>,
}

impl Mapping {
    /// Parses a URL pattern.
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = || Error::InvalidMapping(pattern.to_string());

        if pattern.is_empty() {
            return Ok(Mapping::ContextRoot);
        }
        if pattern == "/" {
            return Ok(Mapping::Default);
        }
        if let Some(ext) = pattern.strip_prefix("*.") {
            if ext.is_empty() || ext.contains(['/', '*']) {
                return Err(invalid());
            }
            return Ok(Mapping::Extension(ext.to_string()));
        }
        if !pattern.starts_with('/') {
            return Err(invalid());
        }
        if let Some(prefix) = pattern.strip_suffix("/*") {
            if prefix.contains('*') {
                return Err(invalid());
            }
            return Ok(Mapping::Prefix(prefix.to_string()));
        }
        if pattern.contains('*') {
            return Err(invalid());
        }
        Ok(Mapping::Exact(pattern.to_string()))
    }

    /// Matches a context-relative path (`""` or starting with `/`).
    pub fn matches(&self, path: &str) -> Option<PathMatch> {
        match self {
            Mapping::ContextRoot => (path.is_empty() || path == "/").then(|| PathMatch {
                servlet_path: String::new(),
                path_info: Some("/".to_string()),
            }),
            Mapping::Default => Some(PathMatch {
                servlet_path: path.to_string(),
                path_info: None,
            }),
            Mapping::Exact(exact) => (path == exact).then(|| PathMatch {
                servlet_path: exact.clone(),
                path_info: None,
            }),
            Mapping::Prefix(prefix) => {
                let rest = path.strip_prefix(prefix.as_str())?;
                if !rest.is_empty() && !rest.starts_with('/') {
                    return None;
                }
                Some(PathMatch {
                    servlet_path: prefix.clone(),
                    path_info: (!rest.is_empty()).then(|| rest.to_string()),
                })
            }
            Mapping::Extension(ext) => {
                let last = path.rsplit('/').next().unwrap_or(path);
                let stem = last.strip_suffix(ext.as_str())?.strip_suffix('.')?;
                (!stem.is_empty()).then(|| PathMatch {
                    servlet_path: path.to_string(),
                    path_info: None,
                })
            }
        }
    }
}

/// The URL patterns of one context, each bound to a handler name.
#[derive(Debug, Default, Clone)]
pub struct MappingTable {
    entries: Vec<(Mapping, String)>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `pattern` to `name`. Re-binding a pattern replaces the old handler.
    pub fn insert(&mut self, pattern: &str, name: &str) -> Result<()> {
        let mapping = Mapping::parse(pattern)?;
        match self.entries.iter_mut().find(|(m, _)| *m == mapping) {
            Some(entry) => entry.1 = name.to_string(),
            None => self.entries.push((mapping, name.to_string())),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handler names referenced by the table.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, name)| name.as_str())
    }

    /// Finds the handler responsible for a context-relative path.
    pub fn resolve(&self, path: &str) -> Option<(&str, PathMatch)> {
        let mut best: Option<(u8, usize, &str, PathMatch)> = None;

        for (mapping, name) in &self.entries {
            let Some(found) = mapping.matches(path) else {
                continue;
            };
            let rank = match mapping {
                Mapping::Exact(_) | Mapping::ContextRoot => 0,
                Mapping::Prefix(_) => 1,
                Mapping::Extension(_) => 2,
                Mapping::Default => 3,
            };
            // longer prefixes win within the same rank
            let weight = found.servlet_path.len();
            let better = match &best {
                None => true,
                Some((best_rank, best_weight, _, _)) => {
                    rank < *best_rank || (rank == *best_rank && rank == 1 && weight > *best_weight)
                }
            };
            if better {
                best = Some((rank, weight, name.as_str(), found));
            }
        }

        best.map(|(_, _, name, found)| (name, found))
    }
}
