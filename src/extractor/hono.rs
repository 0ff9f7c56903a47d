use crate::cli::Framework;
use crate::extractor::{handler_text, RouteDescriptor, RouteSource};
use log::{debug, warn};
use serde_json::Value;

/// Hono route source backed by the application's flat `routes` table.
///
/// Hono already resolves `app.route("/prefix", sub)` mounts into absolute paths, so no tree walk
/// is needed. Middleware registered with `app.use` shows up as `ALL` entries and is reported as
/// such.
pub struct HonoSource {
    routes: Option<Vec<RouteDescriptor>>,
}

impl HonoSource {
    /// Create a source from an already-flat route table
    pub fn new(routes: Vec<RouteDescriptor>) -> Self {
        Self {
            routes: Some(routes),
        }
    }

    /// Create a source from an application dump carrying a `routes` array.
    pub fn from_value(app: &Value) -> Self {
        let routes = app.get("routes").and_then(Value::as_array).map(|routes| {
            routes
                .iter()
                .filter_map(|route| {
                    let method = route.get("method").and_then(Value::as_str);
                    let path = route.get("path").and_then(Value::as_str);
                    match (method, path) {
                        (Some(method), Some(path)) => Some(RouteDescriptor::new(
                            method.to_uppercase(),
                            path,
                            handler_text(route.get("handler")),
                        )),
                        _ => {
                            debug!("Skipping malformed Hono route entry: {}", route);
                            None
                        }
                    }
                })
                .collect()
        });

        Self { routes }
    }
}

impl RouteSource for HonoSource {
    fn framework(&self) -> Framework {
        Framework::Hono
    }

    fn list_routes(&self) -> Vec<RouteDescriptor> {
        match &self.routes {
            Some(routes) => routes.clone(),
            None => {
                warn!("Could not find Hono route table. Routes may not be detected.");
                Vec::new()
            }
        }
    }
}
