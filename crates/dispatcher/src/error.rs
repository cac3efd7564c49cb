//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Malformed payload
    #[error("decode error: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Missing credential or unresolved project
    #[error("auth error: {message}")]
    Auth { message: String },

    /// A sink's accept failed; remaining fan-out was aborted
    #[error("sink '{sink_name}' rejected event: {source}")]
    Sink {
        sink_name: String,
        #[source]
        source: contracts::ContractError,
    },

    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },
}

impl DispatcherError {
    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            source: None,
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Response class for the transport layer
    pub fn status(&self) -> ResponseStatus {
        match self {
            Self::Decode { .. } => ResponseStatus::BadRequest,
            Self::Auth { .. } => ResponseStatus::Unauthorized,
            Self::Sink { .. } | Self::SinkCreation { .. } => ResponseStatus::Internal,
        }
    }
}

impl From<serde_json::Error> for DispatcherError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode {
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

/// Outcome class translated into protocol status codes by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    BadRequest,
    Unauthorized,
    Internal,
}

impl ResponseStatus {
    /// Equivalent HTTP status code
    pub fn code(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Internal => 500,
        }
    }

    /// JSON response body
    pub fn body(&self) -> &'static str {
        match self {
            Self::Ok => r#"{ "success": true }"#,
            _ => r#"{ "success": false }"#,
        }
    }
}

impl<T> From<&Result<T, DispatcherError>> for ResponseStatus {
    fn from(result: &Result<T, DispatcherError>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => e.status(),
        }
    }
}
