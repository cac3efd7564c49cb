//! Dispatcher - normalization and fan-out to sinks

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use contracts::{Batch, Deadline, Event, EventKind, ProjectResolver, Sink};

use crate::error::DispatcherError;

/// Normalizes events and fans them out to every sink in registration order
pub struct Dispatcher {
    resolver: ProjectResolver,
    sinks: Vec<Arc<dyn Sink>>,
}

impl Dispatcher {
    /// Create a dispatcher over `sinks`, invoked in the given order
    pub fn new(resolver: ProjectResolver, sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self { resolver, sinks }
    }

    /// Registered sinks
    pub fn sinks(&self) -> &[Arc<dyn Sink>] {
        &self.sinks
    }

    /// Accept one event
    ///
    /// A write key carried in the payload wins over the request credential.
    #[instrument(name = "dispatcher_accept_single", skip_all)]
    pub async fn accept_single(
        &self,
        write_key: Option<&str>,
        kind_hint: Option<EventKind>,
        mut event: Event,
        deadline: &Deadline,
    ) -> Result<Arc<Event>, DispatcherError> {
        if event.write_key.is_empty() {
            event.write_key = write_key.unwrap_or_default().to_string();
        }
        if event.write_key.is_empty() {
            return Err(DispatcherError::auth("missing write key"));
        }

        if event.kind.is_none() {
            event.kind = kind_hint;
        }
        if event.kind.is_none() {
            return Err(DispatcherError::decode("missing event type"));
        }

        event.project_id = self.resolve(&event.write_key)?;
        self.send(event, deadline).await
    }

    /// Accept a batch, aborting the remainder on the first sink failure
    ///
    /// Every item must carry its own type; one untyped item rejects the whole
    /// batch before any sink is invoked. Events sent before a sink failure
    /// stay delivered. Returns the number of events sent.
    #[instrument(
        name = "dispatcher_accept_batch",
        skip_all,
        fields(events = batch.messages.len())
    )]
    pub async fn accept_batch(
        &self,
        write_key: Option<&str>,
        batch: Batch,
        deadline: &Deadline,
    ) -> Result<usize, DispatcherError> {
        if let Some(idx) = batch.messages.iter().position(|m| m.kind.is_none()) {
            return Err(DispatcherError::decode(format!(
                "batch[{idx}] is missing event type"
            )));
        }
        let write_key = match write_key {
            Some(key) if !key.is_empty() => key,
            _ => return Err(DispatcherError::auth("missing write key")),
        };
        let project_id = self.resolve(write_key)?;

        let Batch {
            context, messages, ..
        } = batch;

        let mut sent = 0;
        for mut event in messages {
            event.write_key = write_key.to_string();
            event.project_id = project_id.clone();
            if let Some(shared) = &context {
                event.context = Some(shared.clone());
            }
            if let Err(e) = self.send(event, deadline).await {
                warn!(sent, error = %e, "Batch aborted on sink failure");
                return Err(e);
            }
            sent += 1;
        }
        Ok(sent)
    }

    /// Stamp identifiers and offer the event to each sink in order
    ///
    /// The first sink failure is returned as-is; later sinks are not invoked.
    async fn send(
        &self,
        mut event: Event,
        deadline: &Deadline,
    ) -> Result<Arc<Event>, DispatcherError> {
        let now = Utc::now();
        if event.timestamp.is_none() {
            event.timestamp = Some(now);
        }
        event.sent_at = Some(now);
        if event.message_id.is_empty() {
            event.message_id = Uuid::new_v4().to_string();
        }

        let event = Arc::new(event);
        for sink in &self.sinks {
            sink.accept(deadline, Arc::clone(&event))
                .await
                .map_err(|source| DispatcherError::Sink {
                    sink_name: sink.name().to_string(),
                    source,
                })?;
        }

        debug!(message_id = %event.message_id, sinks = self.sinks.len(), "Event dispatched");
        Ok(event)
    }

    fn resolve(&self, write_key: &str) -> Result<String, DispatcherError> {
        let project_id = (self.resolver)(write_key);
        if project_id.is_empty() {
            return Err(DispatcherError::auth(format!(
                "unable to resolve project for write key '{write_key}'"
            )));
        }
        Ok(project_id)
    }
}
