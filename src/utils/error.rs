// src/utils/error.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub type CacheEngineResult<T> = Result<T, CacheEngineError>;

/// Custom error details for additional context
pub type ErrorDetails = HashMap<String, serde_json::Value>;

/// Main error type for the cache engine
/// Details are boxed to keep the happy path small
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEngineError {
    pub message: String,
    pub details: Option<Box<ErrorDetails>>,
    pub subsystem: Option<String>,
    pub error_code: Option<String>,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    #[default]
    Internal,
    /// Fault on a single key's read or write
    TransientReadWrite,
    /// A registered store failed while being queried or invalidated
    SubsystemUnavailable,
    /// A queued optimization action failed
    OptimizationActionFailure,
    ConfigurationError,
    RegistrationError,
    SerializationError,
    CompressionError,
    /// A caller-supplied factory or loader failed
    ProducerError,
    NotFound,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Internal => "internal",
            ErrorKind::TransientReadWrite => "transient_read_write",
            ErrorKind::SubsystemUnavailable => "subsystem_unavailable",
            ErrorKind::OptimizationActionFailure => "optimization_action_failure",
            ErrorKind::ConfigurationError => "configuration_error",
            ErrorKind::RegistrationError => "registration_error",
            ErrorKind::SerializationError => "serialization_error",
            ErrorKind::CompressionError => "compression_error",
            ErrorKind::ProducerError => "producer_error",
            ErrorKind::NotFound => "not_found",
        }
    }
}

impl fmt::Display for CacheEngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subsystem {
            Some(subsystem) => write!(f, "[{}] {}", subsystem, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for CacheEngineError {}

impl CacheEngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
            subsystem: None,
            error_code: None,
            kind,
        }
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = Some(Box::new(details));
        self
    }

    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    pub fn with_code(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = Some(error_code.into());
        self
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    // Convenience constructors for common error types
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientReadWrite, message).with_code("TRANSIENT_READ_WRITE")
    }

    pub fn subsystem_unavailable(subsystem: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SubsystemUnavailable, message)
            .with_subsystem(subsystem)
            .with_code("SUBSYSTEM_UNAVAILABLE")
    }

    pub fn optimization_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OptimizationActionFailure, message).with_code("OPTIMIZATION_FAILED")
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigurationError, message).with_code("CONFIG_ERROR")
    }

    pub fn registration_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RegistrationError, message).with_code("REGISTRATION_ERROR")
    }

    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationError, message).with_code("SERIALIZATION_ERROR")
    }

    pub fn compression_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CompressionError, message).with_code("COMPRESSION_ERROR")
    }

    pub fn producer_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProducerError, message).with_code("PRODUCER_ERROR")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message).with_code("NOT_FOUND")
    }
}

/// Errors raised by a compression codec
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("Payload was written by codec '{found}', expected '{expected}'")]
    CodecMismatch { expected: String, found: String },
}

impl From<CodecError> for CacheEngineError {
    fn from(err: CodecError) -> Self {
        CacheEngineError::compression_error(format!("Codec failure: {}", err))
    }
}

impl From<serde_json::Error> for CacheEngineError {
    fn from(err: serde_json::Error) -> Self {
        CacheEngineError::serialization_error(format!("JSON error: {}", err))
    }
}

impl From<regex::Error> for CacheEngineError {
    fn from(err: regex::Error) -> Self {
        CacheEngineError::config_error(format!("Invalid key pattern: {}", err))
    }
}

impl From<anyhow::Error> for CacheEngineError {
    fn from(err: anyhow::Error) -> Self {
        CacheEngineError::producer_error(format!("Producer failed: {:#}", err))
    }
}

// Helper macro for creating errors with context
#[macro_export]
macro_rules! cache_error {
    ($kind:expr, $msg:expr) => {
        $crate::utils::error::CacheEngineError::new($kind, $msg)
    };
    ($kind:expr, $msg:expr, $($key:expr => $value:expr),+) => {{
        let mut details = std::collections::HashMap::new();
        $(
            details.insert($key.to_string(), serde_json::json!($value));
        )+
        $crate::utils::error::CacheEngineError::new($kind, $msg).with_details(details)
    }};
}
