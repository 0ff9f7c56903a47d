use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the crate
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    HttpError(reqwest::Error),
    SerializationError(String),
    InvalidArgument(String),
    FrameworkNotDetected,
    UnsupportedPlatform { os: String, arch: String },
    BinaryNotFound(PathBuf),
    ServiceUnavailable { waited: Duration },
    UpstreamStatus(u16),
    UpstreamTooLarge { limit: usize },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::HttpError(e) => write!(f, "HTTP error: {}", e),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::FrameworkNotDetected => write!(f, "No supported web framework detected"),
            Error::UnsupportedPlatform { os, arch } => {
                write!(f, "Unsupported platform: {}-{}", os, arch)
            }
            Error::BinaryNotFound(path) => {
                write!(f, "AtomicDocs binary not found at {}", path.display())
            }
            Error::ServiceUnavailable { waited } => write!(
                f,
                "AtomicDocs service did not become ready within {}ms",
                waited.as_millis()
            ),
            Error::UpstreamStatus(status) => {
                write!(f, "AtomicDocs service responded with status {}", status)
            }
            Error::UpstreamTooLarge { limit } => {
                write!(f, "AtomicDocs response exceeded {} bytes", limit)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::HttpError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::HttpError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML error: {}", err))
    }
}
