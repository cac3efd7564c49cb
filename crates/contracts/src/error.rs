//! Layered error definitions
//!
//! Categorized by source: config / sink / scope

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Sink Errors =====
    /// Destination unreachable when the run loop starts
    #[error("sink '{sink_name}' connection error: {message}")]
    Connect { sink_name: String, message: String },

    /// Outbound delivery failure inside a running sink
    #[error("sink '{sink_name}' delivery error: {message}")]
    Delivery { sink_name: String, message: String },

    /// Sink handoff closed
    #[error("sink '{sink_name}' is closed")]
    SinkClosed { sink_name: String },

    /// Event could not be serialized for delivery
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    // ===== Scope Errors =====
    /// Per-request deadline elapsed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Cancellation scope fired
    #[error("operation cancelled")]
    Cancelled,

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create connection error
    pub fn connect(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create delivery error
    pub fn delivery(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink closed error
    pub fn sink_closed(sink_name: impl Into<String>) -> Self {
        Self::SinkClosed {
            sink_name: sink_name.into(),
        }
    }

    /// Whether this error came from a cancellation scope
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::DeadlineExceeded | Self::Cancelled)
    }
}
