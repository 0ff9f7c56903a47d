//! Route registration with the documentation service.
//!
//! A registration sends the complete route set of one application, scoped by the port it
//! listens on, to `POST /api/register`. The service replaces whatever it held for that port,
//! so duplicate or out-of-order submissions are harmless.

use crate::config::RetryPolicy;
use crate::error::{Error, Result};
use crate::extractor::RouteBatch;
use crate::service::{ServiceHandle, ServiceState};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Path of the registration endpoint on the documentation service
pub const REGISTER_PATH: &str = "/api/register";

/// How a background registration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered { attempts: u32 },
    /// The service answered with a non-success status; not retried
    Rejected { status: u16 },
    /// The retry policy ran out before the service accepted the routes
    GaveUp { attempts: u32 },
    Cancelled,
}

/// Handle to a registration running in the background.
///
/// Dropping the handle does not stop the registration.
pub struct RegistrationHandle {
    task: JoinHandle<RegistrationOutcome>,
    cancel: CancellationToken,
}

impl RegistrationHandle {
    /// Stops pending retries. An in-flight request runs to completion or failure.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the registration to finish.
    pub async fn wait(self) -> RegistrationOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("AtomicDocs registration task failed: {}", e);
                RegistrationOutcome::Cancelled
            }
        }
    }
}

/// Client for the registration endpoint.
pub struct RegistrationClient {
    service: Arc<ServiceHandle>,
    policy: RetryPolicy,
}

impl RegistrationClient {
    pub fn new(service: Arc<ServiceHandle>, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    /// Sends a batch once, without waiting for readiness or retrying.
    ///
    /// # Errors
    ///
    /// Returns `Error::HttpError` when the service cannot be reached and
    /// `Error::UpstreamStatus` when it answers with a non-success status.
    pub async fn register_now(&self, batch: &RouteBatch) -> Result<()> {
        send(&self.service, batch).await
    }

    /// Submits a batch on a background task and returns immediately.
    ///
    /// The task waits for the service to become ready and retries transport failures according
    /// to the retry policy. Failures are logged, never returned to the caller.
    pub fn submit(&self, batch: RouteBatch) -> RegistrationHandle {
        if batch.routes.is_empty() {
            warn!("AtomicDocs: No routes found. Make sure routes are defined before registering");
        }

        let cancel = self.service.shutdown_token();
        let task = tokio::spawn(run(
            Arc::clone(&self.service),
            self.policy.clone(),
            batch,
            cancel.clone(),
        ));

        RegistrationHandle { task, cancel }
    }
}

async fn send(service: &ServiceHandle, batch: &RouteBatch) -> Result<()> {
    let url = format!("{}{}", service.base_url(), REGISTER_PATH);
    debug!("Registering {} routes for port {} at {}", batch.routes.len(), batch.port, url);

    let response = service.http().post(&url).json(batch).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::UpstreamStatus(status.as_u16()));
    }
    Ok(())
}

async fn run(
    service: Arc<ServiceHandle>,
    policy: RetryPolicy,
    batch: RouteBatch,
    cancel: CancellationToken,
) -> RegistrationOutcome {
    let started = Instant::now();
    let mut attempts = 0;
    let mut state = service.subscribe();

    loop {
        if cancel.is_cancelled() {
            debug!("AtomicDocs registration cancelled");
            return RegistrationOutcome::Cancelled;
        }

        attempts += 1;
        let current = *state.borrow_and_update();
        if current == ServiceState::Ready {
            match send(&service, &batch).await {
                Ok(()) => {
                    info!("AtomicDocs: Registered {} routes", batch.routes.len());
                    return RegistrationOutcome::Registered { attempts };
                }
                Err(Error::UpstreamStatus(status)) => {
                    warn!("AtomicDocs: Registration rejected with status {}", status);
                    return RegistrationOutcome::Rejected { status };
                }
                Err(e) => debug!("AtomicDocs registration attempt {} failed: {}", attempts, e),
            }
        } else {
            debug!("AtomicDocs service is {:?}, deferring registration", current);
        }

        if !policy.allows(attempts, started.elapsed()) {
            warn!(
                "AtomicDocs: Giving up on registration after {} attempts",
                attempts
            );
            return RegistrationOutcome::GaveUp { attempts };
        }

        // A state transition (usually to Ready) cuts the wait short
        tokio::select! {
            _ = tokio::time::sleep(policy.delay_for(attempts)) => {}
            Ok(()) = state.changed() => {}
            _ = cancel.cancelled() => {
                debug!("AtomicDocs registration cancelled");
                return RegistrationOutcome::Cancelled;
            }
        }
    }
}
