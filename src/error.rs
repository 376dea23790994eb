//! Unified error types for Prospector.
//!
//! Every failure that crosses a collaborator boundary is classified into one
//! of three kinds (see [`ErrorKind`]). The scheduler, dispatcher, and circuit
//! breakers match on that closed type; nothing in the core inspects error text.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Classification of a failure, produced at the data-source boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Upstream quota or 429. Absorbed by the cooldown governor.
    RateLimited,
    /// Timeouts, 5xx, connection resets. Retried with backoff, then escalated.
    Transient,
    /// Bad credentials, unrecoverable responses, local failures. Never retried.
    Fatal,
}

impl ErrorKind {
    /// Whether the hybrid dispatcher should retry this kind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::RateLimited | ErrorKind::Transient)
    }
}

/// The main error type for Prospector operations.
#[derive(Error, Debug)]
pub enum ProspectorError {
    /// Upstream signalled a rate limit or quota condition.
    #[error("rate limited by {source_name}: {message}")]
    RateLimited {
        source_name: String,
        message: String,
    },

    /// Recoverable upstream failure.
    #[error("transient failure in {source_name}: {message}")]
    Transient {
        source_name: String,
        message: String,
    },

    /// Unrecoverable upstream failure.
    #[error("fatal failure in {source_name}: {message}")]
    Fatal {
        source_name: String,
        message: String,
    },

    /// Retry budget exhausted and no fallback provider is configured.
    #[error("quota exhausted for {operation} after {attempts} attempts")]
    QuotaExhausted { operation: String, attempts: u32 },

    /// A circuit breaker refused the call without invoking it.
    #[error("circuit '{key}' is open (retry in {retry_in_secs}s)")]
    CircuitOpen { key: String, retry_in_secs: u64 },

    /// I/O errors from store operations.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML parsing/serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// State machine violations (invalid transitions, bad input).
    #[error("invalid state: {message}")]
    InvalidState { message: String },
}

/// A specialized Result type for Prospector operations.
pub type Result<T> = std::result::Result<T, ProspectorError>;

impl ProspectorError {
    /// Create a rate-limited error.
    pub fn rate_limited(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RateLimited {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a transient error.
    pub fn transient(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a fatal error.
    pub fn fatal(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fatal {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a quota exhausted error.
    pub fn quota_exhausted(operation: impl Into<String>, attempts: u32) -> Self {
        Self::QuotaExhausted {
            operation: operation.into(),
            attempts,
        }
    }

    /// Create a circuit open error.
    pub fn circuit_open(key: impl Into<String>, retry_in_secs: u64) -> Self {
        Self::CircuitOpen {
            key: key.into(),
            retry_in_secs,
        }
    }

    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Classify this error.
    ///
    /// An exhausted quota is still a quota condition, so it maps to
    /// `RateLimited` and engages the cooldown instead of the failure counter.
    /// An open circuit is expected to heal on its own and maps to `Transient`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited { .. } | Self::QuotaExhausted { .. } => ErrorKind::RateLimited,
            Self::Transient { .. } | Self::CircuitOpen { .. } => ErrorKind::Transient,
            Self::Fatal { .. }
            | Self::Storage { .. }
            | Self::Serde { .. }
            | Self::Config { .. }
            | Self::InvalidState { .. } => ErrorKind::Fatal,
        }
    }

    /// Shorthand for `kind() == ErrorKind::RateLimited`.
    pub fn is_rate_limited(&self) -> bool {
        self.kind() == ErrorKind::RateLimited
    }
}

impl From<io::Error> for ProspectorError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for ProspectorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Trait for fail-open error handling on non-critical paths.
///
/// Log the error and return a safe default. Used for reads whose failure
/// should degrade a view rather than abort a command.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }
}

/// Exit codes for the Prospector CLI.
pub mod exit_codes {
    /// Command completed.
    pub const OK: i32 = 0;

    /// Command failed.
    pub const ERROR: i32 = 1;

    /// The growth cycle tripped and disabled itself.
    pub const TRIPPED: i32 = 2;

    /// The process panicked.
    pub const CRASH: i32 = 3;
}
