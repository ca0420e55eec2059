use std::path::PathBuf;
use thiserror::Error;

/// Failures inside the telemetry core.
///
/// None of these ever cross into host code: the observer boundary in
/// `adapter::context` turns every variant into a dropped event.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("i/o failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("payload encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("malformed upstream event: {0}")]
    MalformedEvent(&'static str),

    #[error("session is not accepting events")]
    SessionClosed,

    #[error("handler panicked: {0}")]
    HandlerPanicked(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TelemetryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TelemetryError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("unterminated quoted field")]
    UnterminatedQuote,

    #[error("malformed payload at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },
}

pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;
