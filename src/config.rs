//! Configuration for the collector, registration client, docs proxy and service handle.
//!
//! Every field has a default matching the stock AtomicDocs setup (service on
//! `127.0.0.1:6174`, docs under `/docs`), so an empty file or no file at all is valid.
//! Values are layered: defaults, then a YAML or JSON file, then environment variables, then
//! command-line flags.

use crate::error::{Error, Result};
use crate::normalizer::{DEFAULT_DOCS_PREFIX, DEFAULT_HANDLER_SOURCE_LIMIT};
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default loopback port of the documentation service
pub const DEFAULT_SERVICE_PORT: u16 = 6174;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub docs: DocsConfig,
    pub probe: ProbeConfig,
    pub retry: RetryPolicy,
}

/// Where the documentation service lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Package installation directory; the binary is looked up under `<install_dir>/bin`
    pub install_dir: Option<PathBuf>,
    /// Whether to launch the service binary when it is not already running
    pub spawn: bool,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_SERVICE_PORT,
            install_dir: None,
            spawn: true,
            connect_timeout_ms: 2_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl ServiceConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Reserved documentation paths and the limits applied to them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    pub page_path: String,
    pub json_path: String,
    /// Routes under this prefix are never collected
    pub prefix: String,
    /// Largest upstream body the proxy relays
    pub max_body_bytes: usize,
    pub handler_source_limit: usize,
}

impl DocsConfig {
    /// Paths the docs proxy intercepts
    pub fn paths(&self) -> [&str; 2] {
        [self.page_path.as_str(), self.json_path.as_str()]
    }
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            page_path: "/docs".to_string(),
            json_path: "/docs/json".to_string(),
            prefix: DEFAULT_DOCS_PREFIX.to_string(),
            max_body_bytes: 8 * 1024 * 1024,
            handler_source_limit: DEFAULT_HANDLER_SOURCE_LIMIT,
        }
    }
}

/// Readiness probe schedule used after the service is launched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub path: String,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Total time to wait for the service before giving up
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            initial_delay_ms: 50,
            max_delay_ms: 1_000,
            timeout_ms: 10_000,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before probe number `attempt` (zero-based), doubling up to the cap.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay_ms
            .saturating_mul(1u64 << attempt.min(20));
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Retry schedule for route registration.
///
/// With both `max_attempts` and `max_elapsed_ms` unset, registration retries until it succeeds
/// or the service handle shuts down.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub max_attempts: Option<u32>,
    pub max_elapsed_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            multiplier: 2.0,
            max_delay_ms: 2_000,
            max_attempts: None,
            max_elapsed_ms: Some(30_000),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (one-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }

    /// Whether another attempt is allowed after `attempts` attempts and `elapsed` time.
    pub fn allows(&self, attempts: u32, elapsed: Duration) -> bool {
        if let Some(max_attempts) = self.max_attempts {
            if attempts >= max_attempts {
                return false;
            }
        }
        if let Some(max_elapsed_ms) = self.max_elapsed_ms {
            if elapsed >= Duration::from_millis(max_elapsed_ms) {
                return false;
            }
        }
        true
    }
}

impl Config {
    /// Loads a config file, YAML for `.yaml`/`.yml` and JSON otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        );
        let config = if is_yaml {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        Ok(config)
    }

    /// Applies `ATOMICDOCS_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies `ATOMICDOCS_*` overrides from an arbitrary lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(home) = lookup("ATOMICDOCS_HOME") {
            self.service.install_dir = Some(PathBuf::from(home));
        }
        if let Some(host) = lookup("ATOMICDOCS_SERVICE_HOST") {
            self.service.host = host;
        }
        if let Some(port) = lookup("ATOMICDOCS_SERVICE_PORT") {
            self.service.port = port.parse().map_err(|_| {
                Error::InvalidArgument(format!("ATOMICDOCS_SERVICE_PORT is not a port: {}", port))
            })?;
        }
        Ok(())
    }
}
