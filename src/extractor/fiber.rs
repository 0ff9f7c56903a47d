use crate::cli::Framework;
use crate::extractor::{RouteDescriptor, RouteSource};
use log::debug;
use serde::Deserialize;
use serde_json::Value;

/// Fiber route source backed by the output of `app.GetRoutes()`.
///
/// Fiber reports handler functions by their qualified name only, so the handler field carries
/// the name of the last handler in the chain (the endpoint itself, after any middleware).
pub struct FiberSource {
    routes: Vec<FiberRoute>,
}

/// One entry of Fiber's route list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiberRoute {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub handlers: Vec<String>,
}

impl FiberSource {
    pub fn new(routes: Vec<FiberRoute>) -> Self {
        Self { routes }
    }

    /// Create a source from a dump of the route list. Entries that do not match the expected
    /// shape are skipped.
    pub fn from_value(routes: &Value) -> Self {
        let routes = routes
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| match FiberRoute::deserialize(entry) {
                        Ok(route) => Some(route),
                        Err(e) => {
                            debug!("Skipping malformed Fiber route entry: {}", e);
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { routes }
    }
}

impl RouteSource for FiberSource {
    fn framework(&self) -> Framework {
        Framework::Fiber
    }

    fn list_routes(&self) -> Vec<RouteDescriptor> {
        self.routes
            .iter()
            .filter_map(|route| {
                let Some(handler) = route.handlers.last() else {
                    debug!("No handlers for route {} {}", route.method, route.path);
                    return None;
                };
                Some(RouteDescriptor::new(
                    route.method.as_str(),
                    route.path.as_str(),
                    handler.as_str(),
                ))
            })
            .collect()
    }
}
