//! Route extraction module for reading web framework routing structures.
//!
//! This module provides a unified interface for listing the routes a host application has
//! registered. Each framework has its own adapter that knows the shape of that framework's
//! internal routing objects, as dumped by the host process.
//!
//! # Supported Frameworks
//!
//! - **Express**: See [`express::ExpressSource`] (nested router stacks)
//! - **Hono**: See [`hono::HonoSource`] (flat route table)
//! - **Fiber**: See [`fiber::FiberSource`] (flat route list with handler names)
//!
//! # Example
//!
//! ```no_run
//! use atomicdocs::extractor::{RouteSource, express::ExpressSource};
//!
//! let dump: serde_json::Value = serde_json::from_str(
//!     r#"{"_router": {"stack": []}}"#,
//! ).unwrap();
//! let source = ExpressSource::from_value(&dump);
//! println!("Found {} routes", source.list_routes().len());
//! ```

pub mod express;
pub mod fiber;
pub mod hono;

use crate::cli::Framework;
use serde::{Deserialize, Serialize};

/// Adapter over one host framework's routing structures.
///
/// Implementations never fail: when the framework internals cannot be read they return an
/// empty list and log a warning, so a host application keeps serving even if its routes
/// cannot be documented.
pub trait RouteSource {
    /// The framework this adapter reads
    fn framework(&self) -> Framework;

    /// Lists every route in traversal order, before normalization.
    fn list_routes(&self) -> Vec<RouteDescriptor>;
}

/// One discovered endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    /// HTTP verb, uppercase after normalization
    pub method: String,
    /// Route path pattern (e.g. "/users/:id")
    #[serde(rename = "path")]
    pub path_pattern: String,
    /// Handler source text or name; empty when unavailable
    #[serde(rename = "handler", default)]
    pub handler_source: String,
}

impl RouteDescriptor {
    /// Create a new RouteDescriptor
    pub fn new(
        method: impl Into<String>,
        path_pattern: impl Into<String>,
        handler_source: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path_pattern: path_pattern.into(),
            handler_source: handler_source.into(),
        }
    }
}

/// The payload sent to the registration endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteBatch {
    pub routes: Vec<RouteDescriptor>,
    /// Port the originating application listens on
    pub port: u16,
}

impl RouteBatch {
    pub fn new(routes: Vec<RouteDescriptor>, port: u16) -> Self {
        Self { routes, port }
    }
}

/// Renders a handler value from a router dump as text.
///
/// Dumps carry either the function source as a string or an object with a `source` or `name`
/// field. Anything else yields an empty string.
pub(crate) fn handler_text(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(serde_json::Value::Object(map)) => map
            .get("source")
            .or_else(|| map.get("name"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}
