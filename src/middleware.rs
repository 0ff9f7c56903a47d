//! High-level entry point tying collection, registration and the docs proxy together.
//!
//! A host application builds one [`AtomicDocs`] per listening port, starts the service, hands
//! over its routes once they are all defined, and routes every request through
//! [`AtomicDocs::proxy`].
//!
//! ```no_run
//! use atomicdocs::config::Config;
//! use atomicdocs::extractor::hono::HonoSource;
//! use atomicdocs::middleware::AtomicDocs;
//!
//! # async fn example() -> atomicdocs::error::Result<()> {
//! let docs = AtomicDocs::new(Config::default(), 3000)?;
//! docs.start();
//!
//! let dump = serde_json::json!({"routes": [{"method": "GET", "path": "/users"}]});
//! docs.register(&HonoSource::from_value(&dump));
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::error::Result;
use crate::extractor::{RouteBatch, RouteDescriptor, RouteSource};
use crate::normalizer::Normalizer;
use crate::proxy::DocsProxy;
use crate::registration::{RegistrationClient, RegistrationHandle};
use crate::service::ServiceHandle;
use log::{debug, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Route collector, registration client and docs proxy for one host application.
pub struct AtomicDocs {
    app_port: u16,
    service: Arc<ServiceHandle>,
    normalizer: Normalizer,
    registration: RegistrationClient,
    proxy: DocsProxy,
}

impl AtomicDocs {
    /// Builds the components for an application listening on `app_port`.
    pub fn new(config: Config, app_port: u16) -> Result<Self> {
        let service = Arc::new(ServiceHandle::new(&config)?);
        Ok(Self::with_service(config, app_port, service))
    }

    /// Builds the components around an existing service handle, so several applications in
    /// one process can share a single documentation service.
    pub fn with_service(config: Config, app_port: u16, service: Arc<ServiceHandle>) -> Self {
        let normalizer = Normalizer::new(
            config.docs.prefix.clone(),
            config.docs.handler_source_limit,
        );
        let registration = RegistrationClient::new(Arc::clone(&service), config.retry.clone());
        let proxy = DocsProxy::new(Arc::clone(&service), &config.docs, app_port);

        Self {
            app_port,
            service,
            normalizer,
            registration,
            proxy,
        }
    }

    pub fn service(&self) -> &Arc<ServiceHandle> {
        &self.service
    }

    pub fn proxy(&self) -> &DocsProxy {
        &self.proxy
    }

    pub fn registration(&self) -> &RegistrationClient {
        &self.registration
    }

    /// Launches the documentation service in the background. Failures are logged only.
    pub fn start(&self) -> JoinHandle<()> {
        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            if let Err(e) = service.ensure_started().await {
                warn!("AtomicDocs: documentation features unavailable: {}", e);
            }
        })
    }

    /// Lists and normalizes the routes of a source.
    pub fn collect(&self, source: &dyn RouteSource) -> Vec<RouteDescriptor> {
        let routes = source.list_routes();
        debug!(
            "Collected {} raw routes from {:?}",
            routes.len(),
            source.framework()
        );
        self.normalizer.normalize(routes)
    }

    /// Builds the registration payload for a source
    pub fn batch(&self, source: &dyn RouteSource) -> RouteBatch {
        RouteBatch::new(self.collect(source), self.app_port)
    }

    /// Collects routes and submits them on a background task.
    pub fn register(&self, source: &dyn RouteSource) -> RegistrationHandle {
        self.registration.submit(self.batch(source))
    }

    /// Stops pending registrations and the launched service.
    pub async fn shutdown(&self) {
        self.service.shutdown().await;
    }
}
