//! Ingress - transport-neutral ingestion boundary
//!
//! Decodes payloads, derives the request deadline and hands off to the
//! [`Dispatcher`]. The HTTP layer maps the result with
//! [`DispatcherError::status`].

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use tracing::{debug, instrument, warn};

use contracts::{Batch, CancellationToken, Deadline, Event, EventKind};

use crate::dispatcher::Dispatcher;
use crate::error::DispatcherError;

/// Single-event payload encodings
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// JSON request body
    Json(&'a [u8]),
    /// Base64 JSON, as sent in a `data` query parameter
    Base64(&'a str),
}

/// Ingestion boundary over a shared dispatcher
#[derive(Clone)]
pub struct Ingress {
    dispatcher: Arc<Dispatcher>,
    scope: CancellationToken,
}

impl Ingress {
    /// `scope` bounds requests without a timeout (usually the process token)
    pub fn new(dispatcher: Arc<Dispatcher>, scope: CancellationToken) -> Self {
        Self { dispatcher, scope }
    }

    /// Submit one event
    #[instrument(name = "ingress_submit_single", skip(self, write_key, payload, timeout))]
    pub async fn submit_single(
        &self,
        write_key: Option<&str>,
        kind_hint: &str,
        payload: Payload<'_>,
        timeout: Option<&str>,
    ) -> Result<Arc<Event>, DispatcherError> {
        let hint = parse_hint(kind_hint)?;
        let event = decode_event(payload)?;
        let deadline = self.deadline(timeout);
        self.dispatcher
            .accept_single(write_key, hint, event, &deadline)
            .await
    }

    /// Submit a batch, returning the number of events sent
    #[instrument(name = "ingress_submit_batch", skip_all)]
    pub async fn submit_batch(
        &self,
        write_key: Option<&str>,
        payload: &[u8],
        timeout: Option<&str>,
    ) -> Result<usize, DispatcherError> {
        let batch: Batch = serde_json::from_slice(payload)?;
        let deadline = self.deadline(timeout);
        self.dispatcher
            .accept_batch(write_key, batch, &deadline)
            .await
    }

    fn deadline(&self, timeout: Option<&str>) -> Deadline {
        Deadline::from_timeout(timeout.and_then(parse_timeout), self.scope.clone())
    }
}

/// Parse a request timeout; absent or unparsable means no deadline
pub fn parse_timeout(raw: &str) -> Option<Duration> {
    match humantime::parse_duration(raw.trim()) {
        Ok(timeout) => Some(timeout),
        Err(e) => {
            debug!(timeout = raw, error = %e, "Ignoring unparsable request timeout");
            None
        }
    }
}

fn parse_hint(raw: &str) -> Result<Option<EventKind>, DispatcherError> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|e| DispatcherError::decode(format!("{e}")))
}

fn decode_event(payload: Payload<'_>) -> Result<Event, DispatcherError> {
    match payload {
        Payload::Json(body) => Ok(serde_json::from_slice(body)?),
        Payload::Base64(data) => {
            let body = base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|e| {
                    warn!(error = %e, "Expected base64 payload");
                    DispatcherError::Decode {
                        message: format!("invalid base64 payload: {e}"),
                        source: Some(Box::new(e)),
                    }
                })?;
            Ok(serde_json::from_slice(&body)?)
        }
    }
}
