//! Route normalization into the canonical form sent to the documentation service.
//!
//! Adapters report routes the way their framework stores them. The normalizer uppercases
//! methods, rewrites parameter placeholders to the `:name` notation, bounds handler source
//! size, and drops everything under the documentation prefix so the docs endpoints never
//! document themselves.

use crate::extractor::RouteDescriptor;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

/// Default reserved documentation prefix
pub const DEFAULT_DOCS_PREFIX: &str = "/docs";

/// Default upper bound for captured handler source, in bytes
pub const DEFAULT_HANDLER_SOURCE_LIMIT: usize = 16 * 1024;

// One level of nested braces covers quantifiers such as `{[0-9]{2}}`
static CONSTRAINED_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":(\w+)\{(?:[^{}]|\{[^{}]*\})*\}").expect("valid constrained param pattern")
});
static BRACED_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("valid braced param pattern"));

/// Converts raw routes into canonical [`RouteDescriptor`]s.
#[derive(Debug, Clone)]
pub struct Normalizer {
    docs_prefix: String,
    handler_source_limit: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_DOCS_PREFIX, DEFAULT_HANDLER_SOURCE_LIMIT)
    }
}

impl Normalizer {
    pub fn new(docs_prefix: impl Into<String>, handler_source_limit: usize) -> Self {
        Self {
            docs_prefix: docs_prefix.into(),
            handler_source_limit,
        }
    }

    /// Normalizes routes, preserving input order. Duplicates are kept.
    pub fn normalize(&self, routes: Vec<RouteDescriptor>) -> Vec<RouteDescriptor> {
        let total = routes.len();
        let normalized: Vec<RouteDescriptor> = routes
            .into_iter()
            .map(|route| RouteDescriptor {
                method: route.method.to_uppercase(),
                path_pattern: canonical_path(&route.path_pattern),
                handler_source: truncate_source(route.handler_source, self.handler_source_limit),
            })
            .filter(|route| !route.path_pattern.starts_with(&self.docs_prefix))
            .collect();

        debug!(
            "Normalized {} routes, dropped {} under {}",
            normalized.len(),
            total - normalized.len(),
            self.docs_prefix
        );
        normalized
    }
}

/// Rewrites framework-specific parameter syntax to `:name`.
///
/// Hono's constrained `:id{[0-9]+}` and brace-style `{id}` both become `:id`. An empty path is
/// the root.
pub fn canonical_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let path = CONSTRAINED_PARAM.replace_all(path, ":$1");
    BRACED_PARAM.replace_all(&path, ":$1").into_owned()
}

fn truncate_source(mut source: String, limit: usize) -> String {
    if source.len() > limit {
        let mut end = limit;
        while !source.is_char_boundary(end) {
            end -= 1;
        }
        source.truncate(end);
    }
    source
}
