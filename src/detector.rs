use crate::cli::Framework;
use crate::extractor::express::{find_router_stack, ExpressSource};
use crate::extractor::fiber::FiberSource;
use crate::extractor::hono::HonoSource;
use crate::extractor::RouteSource;
use log::{debug, warn};
use serde_json::Value;

/// Framework detector for identifying which web framework produced a router dump.
///
/// The `FrameworkDetector` looks at the shape of the dumped application object, the same
/// properties the framework's own router keeps:
/// - Hono (a `routes` array on the app)
/// - Express (a router `stack` under `_router`, `router` or `settings.router`)
/// - Fiber (a top-level array of routes carrying `handlers`)
pub struct FrameworkDetector;

/// Result of framework detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionResult {
    /// The detected framework, if the dump matched a known shape
    pub framework: Option<Framework>,
}

impl FrameworkDetector {
    /// Detects the framework of a router dump.
    ///
    /// Hono is checked first: a Hono app exposes `routes` directly, while an Express app never
    /// does.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use atomicdocs::detector::FrameworkDetector;
    ///
    /// let dump = serde_json::json!({"routes": [{"method": "GET", "path": "/"}]});
    /// let result = FrameworkDetector::detect(&dump);
    /// println!("Detected {:?}", result.framework);
    /// ```
    pub fn detect(dump: &Value) -> DetectionResult {
        let framework = if dump.get("routes").map_or(false, Value::is_array) {
            Some(Framework::Hono)
        } else if find_router_stack(dump).is_some() {
            Some(Framework::Express)
        } else if Self::is_fiber_route_list(dump) {
            Some(Framework::Fiber)
        } else {
            None
        };

        debug!("Detected framework: {:?}", framework);
        DetectionResult { framework }
    }

    /// Builds the route source for a dump.
    ///
    /// A user-specified framework wins over detection. When nothing matches, a warning is
    /// logged and `None` is returned; callers treat that as an empty route set.
    pub fn source_for(dump: &Value, framework: Option<Framework>) -> Option<Box<dyn RouteSource>> {
        let framework = match framework.or(Self::detect(dump).framework) {
            Some(framework) => framework,
            None => {
                warn!("No supported web framework detected in router dump");
                return None;
            }
        };

        let source: Box<dyn RouteSource> = match framework {
            Framework::Express => Box::new(ExpressSource::from_value(dump)),
            Framework::Hono => Box::new(HonoSource::from_value(dump)),
            Framework::Fiber => Box::new(FiberSource::from_value(dump)),
        };
        Some(source)
    }

    fn is_fiber_route_list(dump: &Value) -> bool {
        match dump.as_array() {
            Some(entries) => entries
                .first()
                .map_or(false, |entry| entry.get("handlers").is_some()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_hono_framework() {
        let dump = json!({"routes": [{"method": "GET", "path": "/", "handler": ""}]});
        assert_eq!(FrameworkDetector::detect(&dump).framework, Some(Framework::Hono));
    }

    #[test]
    fn test_detect_express_versions() {
        let express4 = json!({"_router": {"stack": []}});
        let express5 = json!({"router": {"stack": []}});
        let settings = json!({"settings": {"router": {"stack": []}}});

        for dump in [express4, express5, settings] {
            assert_eq!(
                FrameworkDetector::detect(&dump).framework,
                Some(Framework::Express)
            );
        }
    }

    #[test]
    fn test_detect_fiber_framework() {
        let dump = json!([{"method": "GET", "path": "/", "handlers": ["main.index"]}]);
        assert_eq!(FrameworkDetector::detect(&dump).framework, Some(Framework::Fiber));
    }

    #[test]
    fn test_detect_no_framework() {
        assert_eq!(FrameworkDetector::detect(&json!({"app": true})).framework, None);
        assert_eq!(FrameworkDetector::detect(&json!([])).framework, None);
        assert_eq!(FrameworkDetector::detect(&json!("express")).framework, None);
    }

    #[test]
    fn test_source_for_respects_override() {
        let dump = json!({"routes": []});

        let detected = FrameworkDetector::source_for(&dump, None).unwrap();
        assert_eq!(detected.framework(), Framework::Hono);

        let forced = FrameworkDetector::source_for(&dump, Some(Framework::Express)).unwrap();
        assert_eq!(forced.framework(), Framework::Express);
        assert!(forced.list_routes().is_empty());
    }

    #[test]
    fn test_source_for_unknown_dump() {
        assert!(FrameworkDetector::source_for(&json!({}), None).is_none());
    }
}
