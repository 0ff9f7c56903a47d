//! Lifecycle of the external AtomicDocs documentation service.
//!
//! The service is a separate precompiled binary shipped per platform. A [`ServiceHandle`] owns
//! the one launch attempt a host process makes, tracks readiness through an explicit probe,
//! and stops the child on [`ServiceHandle::shutdown`]. The registration client and the docs
//! proxy share a handle through an `Arc`.

use crate::config::{Config, ProbeConfig, ServiceConfig};
use crate::error::{Error, Result};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle of the documentation service as seen from this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    NotStarted,
    /// Launched (or expected), not answering yet
    Starting,
    Ready,
    /// Launch failed, the probe timed out, the process exited, or the handle shut down
    Unavailable,
}

/// Maps an OS/architecture pair to the key used in release binary names.
///
/// # Example
///
/// ```
/// use atomicdocs::service::platform_key;
///
/// assert_eq!(platform_key("macos", "aarch64").unwrap(), "darwin-arm64");
/// ```
pub fn platform_key(os: &str, arch: &str) -> Result<String> {
    let os_key = match os {
        "windows" => Some("win"),
        "macos" => Some("darwin"),
        "linux" => Some("linux"),
        _ => None,
    };
    let arch_key = match arch {
        "x86_64" => Some("x64"),
        "aarch64" => Some("arm64"),
        _ => None,
    };

    match (os_key, arch_key) {
        (Some(os_key), Some(arch_key)) => Ok(format!("{}-{}", os_key, arch_key)),
        _ => Err(Error::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        }),
    }
}

/// File name of the service binary for an OS/architecture pair.
pub fn binary_name(os: &str, arch: &str) -> Result<String> {
    let ext = if os == "windows" { ".exe" } else { "" };
    Ok(format!("atomicdocs-{}{}", platform_key(os, arch)?, ext))
}

/// Locates the service binary for the running platform under `<install_dir>/bin`.
pub fn resolve_binary(install_dir: &Path) -> Result<PathBuf> {
    let name = binary_name(std::env::consts::OS, std::env::consts::ARCH)?;
    let path = install_dir.join("bin").join(name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::BinaryNotFound(path))
    }
}

/// Installation directory: the configured one, or the directory of the running executable.
pub fn install_dir(config: &ServiceConfig) -> Result<PathBuf> {
    match &config.install_dir {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_exe()?
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                Error::InvalidArgument("cannot determine installation directory".to_string())
            }),
    }
}

/// Owner of the documentation service process and its readiness state.
pub struct ServiceHandle {
    config: ServiceConfig,
    probe: ProbeConfig,
    http: reqwest::Client,
    state: Arc<watch::Sender<ServiceState>>,
    spawn_attempted: AtomicBool,
    shutdown: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ServiceHandle {
    /// Creates a handle. Nothing is launched until [`ServiceHandle::ensure_started`].
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.service.connect_timeout())
            .timeout(config.service.request_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let (state, _) = watch::channel(ServiceState::NotStarted);

        Ok(Self {
            config: config.service.clone(),
            probe: config.probe.clone(),
            http,
            state: Arc::new(state),
            spawn_attempted: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            supervisor: Mutex::new(None),
        })
    }

    pub fn state(&self) -> ServiceState {
        *self.state.borrow()
    }

    /// Receives every state transition
    pub fn subscribe(&self) -> watch::Receiver<ServiceState> {
        self.state.subscribe()
    }

    pub fn base_url(&self) -> String {
        self.config.base_url()
    }

    /// HTTP client configured with the service timeouts
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Token cancelled when the handle shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    fn set_state(&self, state: ServiceState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("AtomicDocs service state {:?} -> {:?}", previous, state);
        }
    }

    /// Sends one readiness probe. Any HTTP response means the service is listening.
    pub async fn probe(&self) -> bool {
        let url = format!("{}{}", self.base_url(), self.probe.path);
        match self.http.get(&url).send().await {
            Ok(response) => {
                debug!("Probe {} answered {}", url, response.status());
                true
            }
            Err(e) => {
                debug!("Probe {} failed: {}", url, e);
                false
            }
        }
    }

    /// Makes sure the service is running, launching the binary at most once per handle.
    ///
    /// Repeated or concurrent calls after the first are no-ops. If the service already answers
    /// (another host application launched it), no process is spawned.
    ///
    /// # Errors
    ///
    /// Returns the launch or readiness failure of the first call. Callers are expected to log
    /// it and keep serving; the docs proxy degrades to an unavailable response.
    pub async fn ensure_started(&self) -> Result<()> {
        if self.spawn_attempted.swap(true, Ordering::SeqCst) {
            debug!("AtomicDocs service launch already attempted");
            return Ok(());
        }

        if self.probe().await {
            info!("AtomicDocs service already running at {}", self.base_url());
            self.set_state(ServiceState::Ready);
            return Ok(());
        }

        self.set_state(ServiceState::Starting);

        if !self.config.spawn {
            info!("Waiting for externally managed AtomicDocs service at {}", self.base_url());
            return self.wait_until_ready().await;
        }

        let binary = match self.resolve_binary() {
            Ok(binary) => binary,
            Err(e) => {
                error!("AtomicDocs: {}", e);
                self.set_state(ServiceState::Unavailable);
                return Err(e);
            }
        };

        let child = Command::new(&binary)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                error!("AtomicDocs: Failed to start server: {}", e);
                self.set_state(ServiceState::Unavailable);
                return Err(e.into());
            }
        };

        info!(
            "Started AtomicDocs service {} (pid {:?})",
            binary.display(),
            child.id()
        );
        let task = tokio::spawn(supervise(
            child,
            Arc::clone(&self.state),
            self.shutdown.clone(),
        ));
        *self.supervisor.lock().await = Some(task);

        self.wait_until_ready().await
    }

    /// Polls the readiness probe with exponential backoff until it answers or the probe
    /// timeout elapses.
    pub async fn wait_until_ready(&self) -> Result<()> {
        let started = Instant::now();
        let timeout = self.probe.timeout();
        let mut attempt = 0;

        loop {
            if self.shutdown.is_cancelled() || self.state() == ServiceState::Unavailable {
                return Err(Error::ServiceUnavailable {
                    waited: started.elapsed(),
                });
            }

            if self.probe().await {
                info!("AtomicDocs service ready at {}", self.base_url());
                self.set_state(ServiceState::Ready);
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                warn!(
                    "AtomicDocs service did not answer within {}ms",
                    elapsed.as_millis()
                );
                self.set_state(ServiceState::Unavailable);
                return Err(Error::ServiceUnavailable { waited: elapsed });
            }

            let delay = self.probe.delay_for(attempt).min(timeout - elapsed);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.cancelled() => {}
            }
            attempt += 1;
        }
    }

    /// Cancels pending registrations and stops the launched process, if any.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(task) = self.supervisor.lock().await.take() {
            if let Err(e) = task.await {
                warn!("AtomicDocs supervisor task failed: {}", e);
            }
        }
        self.set_state(ServiceState::Unavailable);
    }

    fn resolve_binary(&self) -> Result<PathBuf> {
        resolve_binary(&install_dir(&self.config)?)
    }
}

async fn supervise(
    mut child: Child,
    state: Arc<watch::Sender<ServiceState>>,
    shutdown: CancellationToken,
) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_output(stdout, "stdout"));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_output(stderr, "stderr"));
    }

    tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => info!("AtomicDocs service exited"),
            Ok(status) => error!("AtomicDocs: Server exited with {}", status),
            Err(e) => error!("AtomicDocs: Failed to wait on server: {}", e),
        },
        _ = shutdown.cancelled() => match child.kill().await {
            Ok(()) => info!("Stopped AtomicDocs service"),
            Err(e) => warn!("AtomicDocs: Failed to stop server: {}", e),
        },
    }

    state.send_replace(ServiceState::Unavailable);
}

async fn forward_output<R>(reader: R, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    drain_lines(reader, |line| debug!("atomicdocs {}: {}", stream, line)).await;
}

/// Reads `reader` to end of stream, passing each line to `on_line` with invalid UTF-8 replaced.
/// Transient read errors do not stop the drain.
async fn drain_lines<R, F>(reader: R, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut errors = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_line(line.trim_end_matches(&['\r', '\n'][..]));
            }
            Err(e) => {
                errors += 1;
                if errors > 16 {
                    warn!("AtomicDocs: Giving up on service output after {}", e);
                    break;
                }
            }
        }
    }
}
