use crate::cli::Framework;
use crate::extractor::{handler_text, RouteDescriptor, RouteSource};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Express route source backed by the application's router stack.
///
/// The stack is the ordered list of layers Express matches requests against. Routers mounted
/// with `app.use("/prefix", router)` and sub-applications mounted the same way appear as layers
/// that carry their own stack, so the walk is recursive.
pub struct ExpressSource {
    stack: Option<Vec<Layer>>,
}

/// One entry of an Express router stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layer {
    /// A terminal route (`app.get(path, handler)` and friends)
    Route {
        path: String,
        /// Methods in the order Express recorded them
        methods: Vec<String>,
        handler: String,
    },
    /// A nested `express.Router()` mount
    Router { prefix: MountPrefix, stack: Vec<Layer> },
    /// A nested Express application mount
    MountedApp { prefix: MountPrefix, stack: Vec<Layer> },
    /// Plain middleware, contributes no routes
    Middleware,
}

/// How a mount layer reports where it is attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountPrefix {
    /// Literal mount path (Express 5)
    pub path: Option<String>,
    /// Source of the path-matching regular expression (Express 4)
    pub regexp: Option<String>,
}

impl MountPrefix {
    pub fn literal(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            regexp: None,
        }
    }

    pub fn regexp(source: impl Into<String>) -> Self {
        Self {
            path: None,
            regexp: Some(source.into()),
        }
    }

    /// Resolves the prefix, preferring the literal path over the regular expression.
    pub fn resolve(&self) -> String {
        match (&self.path, &self.regexp) {
            (Some(path), _) if !path.is_empty() => path.clone(),
            (_, Some(source)) => prefix_from_regex(source),
            _ => String::new(),
        }
    }

    fn from_layer(layer: &Value) -> Self {
        let regexp = match layer.get("regexp") {
            Some(Value::String(source)) => Some(source.clone()),
            Some(Value::Object(map)) => map
                .get("source")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        };

        Self {
            path: layer.get("path").and_then(Value::as_str).map(str::to_string),
            regexp,
        }
    }
}

impl Layer {
    /// Convenience constructor for a terminal route
    pub fn route(path: impl Into<String>, methods: &[&str], handler: impl Into<String>) -> Self {
        Layer::Route {
            path: path.into(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
            handler: handler.into(),
        }
    }

    /// Reads one layer from a router dump.
    ///
    /// Unrecognized layers become [`Layer::Middleware`] so a partially understood stack still
    /// yields the routes that can be read.
    pub fn from_value(value: &Value) -> Self {
        if let Some(route) = value.get("route").filter(|r| r.is_object()) {
            return Self::route_from_value(route);
        }

        let name = value.get("name").and_then(Value::as_str).unwrap_or_default();
        let handle = value.get("handle");

        match name {
            "router" => {
                if let Some(stack) = handle
                    .and_then(|h| h.get("stack"))
                    .and_then(Value::as_array)
                {
                    return Layer::Router {
                        prefix: MountPrefix::from_layer(value),
                        stack: parse_stack(stack),
                    };
                }
            }
            "mounted_app" => {
                if let Some(stack) = handle.and_then(find_router_stack) {
                    return Layer::MountedApp {
                        prefix: MountPrefix::from_layer(value),
                        stack: parse_stack(stack),
                    };
                }
            }
            _ => {}
        }

        Layer::Middleware
    }

    fn route_from_value(route: &Value) -> Self {
        let path = match route.get("path").and_then(Value::as_str) {
            Some(path) => path.to_string(),
            None => {
                debug!("Skipping route with non-string path: {:?}", route.get("path"));
                return Layer::Middleware;
            }
        };

        let methods = route
            .get("methods")
            .and_then(Value::as_object)
            .map(|methods| {
                methods
                    .iter()
                    .filter(|(_, enabled)| enabled.as_bool().unwrap_or(false))
                    .map(|(method, _)| {
                        if method == "_all" {
                            "ALL".to_string()
                        } else {
                            method.clone()
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let handler = handler_text(route.pointer("/stack/0/handle"));

        Layer::Route {
            path,
            methods,
            handler,
        }
    }
}

/// Locates the router stack of an Express application dump.
///
/// Express 4 exposes it as `_router.stack`, Express 5 as `router.stack`; some dumps only carry
/// the router under the application settings.
pub fn find_router_stack(app: &Value) -> Option<&Vec<Value>> {
    ["/_router/stack", "/router/stack", "/settings/router/stack"]
        .iter()
        .find_map(|pointer| app.pointer(pointer))
        .and_then(Value::as_array)
}

fn parse_stack(stack: &[Value]) -> Vec<Layer> {
    stack.iter().map(Layer::from_value).collect()
}

impl ExpressSource {
    /// Create a source from an already-built layer stack
    pub fn new(stack: Vec<Layer>) -> Self {
        Self { stack: Some(stack) }
    }

    /// Create a source from an application dump, locating its router stack.
    pub fn from_value(app: &Value) -> Self {
        Self {
            stack: find_router_stack(app).map(|stack| parse_stack(stack)),
        }
    }
}

impl RouteSource for ExpressSource {
    fn framework(&self) -> Framework {
        Framework::Express
    }

    fn list_routes(&self) -> Vec<RouteDescriptor> {
        match &self.stack {
            Some(stack) => walk(stack),
            None => {
                warn!("Could not find Express router stack. Routes may not be detected.");
                Vec::new()
            }
        }
    }
}

/// Flattens a layer stack into routes with absolute paths, depth first.
pub fn walk(stack: &[Layer]) -> Vec<RouteDescriptor> {
    let mut routes = Vec::new();
    walk_stack(stack, "", &mut routes);
    debug!("Walked Express stack, found {} routes", routes.len());
    routes
}

fn walk_stack(stack: &[Layer], base_path: &str, routes: &mut Vec<RouteDescriptor>) {
    for layer in stack {
        match layer {
            Layer::Route {
                path,
                methods,
                handler,
            } => {
                for method in methods {
                    routes.push(RouteDescriptor::new(
                        method.to_uppercase(),
                        format!("{}{}", base_path, path),
                        handler.clone(),
                    ));
                }
            }
            Layer::Router { prefix, stack } | Layer::MountedApp { prefix, stack } => {
                let nested_base = format!("{}{}", base_path, prefix.resolve());
                debug!("Descending into mount at {}", nested_base);
                walk_stack(stack, &nested_base, routes);
            }
            Layer::Middleware => {}
        }
    }
}

static REGEX_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(\^.*)/[a-z]*$").expect("valid regex literal pattern"));
static TRAILING_MATCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\\/\?)?(?:\(\?=\\/\|\$\)|\$)$").expect("valid trailing match pattern")
});
static CAPTURE_GROUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\?:\(\[\^\\/\]\+\?\)\)|\(\?<\w+>[^)]*\)|\(\[\^\\/\]\+\?\)")
        .expect("valid capture group pattern")
});
static ESCAPED_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(.)").expect("valid escape pattern"));
static TRAILING_OPTIONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\?(?:=.*)?$").expect("valid trailing optional pattern"));

/// Recovers a mount path from the regular expression Express compiled for it.
///
/// `^\/api\/?(?=\/|$)` becomes `/api`; parameter captures become `:param`.
pub fn prefix_from_regex(source: &str) -> String {
    let source = match REGEX_LITERAL.captures(source) {
        Some(caps) => caps.get(1).map_or(source, |m| m.as_str()),
        None => source,
    };
    let source = source.strip_prefix('^').unwrap_or(source);
    let source = TRAILING_MATCH.replace(source, "");
    let source = CAPTURE_GROUP.replace_all(&source, ":param");
    let source = ESCAPED_CHAR.replace_all(&source, "$1");
    TRAILING_OPTIONAL.replace(&source, "").into_owned()
}
