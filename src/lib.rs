//! AtomicDocs route collector - route introspection and registration for the AtomicDocs
//! documentation service.
//!
//! This library reads the routing structures of a host web application, normalizes the routes
//! into a canonical `{method, path, handler}` form, and registers them with a separately
//! running documentation service over loopback HTTP. It also proxies the documentation
//! endpoints from the host application to that service.
//!
//! # Supported Frameworks
//!
//! - **Express**: Walks the nested router stack, including mounted routers and sub-apps
//! - **Hono**: Reads the flat route table
//! - **Fiber**: Reads the route list returned by `GetRoutes()`
//!
//! # Architecture
//!
//! 1. [`extractor`] - Framework adapters behind the [`extractor::RouteSource`] trait
//! 2. [`detector`] - Detects which framework produced a router dump
//! 3. [`normalizer`] - Canonical methods and paths, docs-prefix filtering
//! 4. [`service`] - Launches and probes the documentation service process
//! 5. [`registration`] - Sends route batches with retry on a background task
//! 6. [`proxy`] - Forwards `/docs` and `/docs/json` to the service
//! 7. [`middleware`] - [`middleware::AtomicDocs`], the per-application entry point
//!
//! # Example Usage
//!
//! ```no_run
//! use atomicdocs::{
//!     config::Config,
//!     detector::FrameworkDetector,
//!     middleware::AtomicDocs,
//!     proxy::ProxyOutcome,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let dump = atomicdocs::serializer::read_dump(std::path::Path::new("routes.json"))?;
//! let source = FrameworkDetector::source_for(&dump, None)
//!     .ok_or_else(|| anyhow::anyhow!("unknown router dump"))?;
//!
//! let docs = AtomicDocs::new(Config::default(), 3000)?;
//! docs.start();
//! docs.register(source.as_ref());
//!
//! // In the host's request handling:
//! match docs.proxy().handle("/docs").await {
//!     ProxyOutcome::Respond(response) => println!("docs status {}", response.status()),
//!     ProxyOutcome::Next => {}
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod config;
pub mod detector;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod normalizer;
pub mod proxy;
pub mod registration;
pub mod serializer;
pub mod service;
