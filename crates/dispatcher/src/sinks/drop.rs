//! DropSink - single-slot forwarder that sheds load under congestion

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use contracts::{
    Batch, CancellationToken, ContractError, Deadline, DeliveryRecorder, Event, ForwardTransport,
    Sink,
};

/// Best-effort forwarding sink
///
/// `accept` never blocks: when the one-slot cell is occupied the event is
/// counted as skipped and the call still succeeds. Each event is forwarded
/// once as a one-element batch envelope; failures are counted, never retried.
pub struct DropSink<T> {
    name: String,
    transport: T,
    recorder: Arc<dyn DeliveryRecorder>,
    tx: mpsc::Sender<Arc<Event>>,
    rx: Mutex<mpsc::Receiver<Arc<Event>>>,
}

impl<T: ForwardTransport + Sync> DropSink<T> {
    /// Create a new DropSink
    pub fn new(name: impl Into<String>, transport: T, recorder: Arc<dyn DeliveryRecorder>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            name: name.into(),
            transport,
            recorder,
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Whether the holding cell is occupied
    pub fn is_occupied(&self) -> bool {
        self.tx.capacity() == 0
    }

    fn encode(event: &Event) -> Result<Bytes, ContractError> {
        let envelope = Batch::envelope(event);
        Ok(Bytes::from(serde_json::to_vec(&envelope)?))
    }

    /// Forward one event, aborting if `cancel` fires mid-call
    async fn forward(
        &self,
        event: &Event,
        cancel: &CancellationToken,
    ) -> Result<(), ContractError> {
        let body = match Self::encode(event) {
            Ok(body) => body,
            Err(e) => {
                self.recorder.record_failed(1);
                warn!(
                    sink = %self.name,
                    message_id = %event.message_id,
                    error = %e,
                    "Encode failed"
                );
                return Ok(());
            }
        };

        let started = Instant::now();
        let result = tokio::select! {
            result = self.transport.forward(&event.write_key, body) => result,
            _ = cancel.cancelled() => {
                warn!(
                    sink = %self.name,
                    message_id = %event.message_id,
                    "Forward aborted by shutdown"
                );
                return Err(ContractError::Cancelled);
            }
        };

        match result {
            Ok(()) => {
                let latency = started.elapsed();
                self.recorder.record_delivered(1);
                self.recorder.record_latency(latency);
                debug!(sink = %self.name, latency_us = latency.as_micros() as u64, "Forwarded");
            }
            Err(e) => {
                self.recorder.record_failed(1);
                warn!(
                    sink = %self.name,
                    message_id = %event.message_id,
                    error = %e,
                    "Forward failed"
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T> Sink for DropSink<T>
where
    T: ForwardTransport + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn accept(&self, _deadline: &Deadline, event: Arc<Event>) -> Result<(), ContractError> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.recorder.record_skipped(1);
                debug!(
                    sink = %self.name,
                    message_id = %event.message_id,
                    "Cell occupied, event skipped"
                );
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(ContractError::sink_closed(&self.name))
            }
        }
    }

    #[instrument(name = "drop_sink_run", skip_all, fields(sink = %self.name))]
    async fn run(&self, cancel: CancellationToken) -> Result<(), ContractError> {
        let mut rx = self.rx.lock().await;
        info!(sink = %self.name, "Started forwarder processing");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = rx.recv() => {
                    let Some(event) = received else { break };
                    self.forward(&event, &cancel).await?;
                }
            }
        }

        // best-effort: whatever is still in the cell is shed
        if let Ok(event) = rx.try_recv() {
            self.recorder.record_skipped(1);
            debug!(sink = %self.name, message_id = %event.message_id, "Discarded on shutdown");
        }
        info!(sink = %self.name, "Ending forwarder processing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SinkMetrics;
    use contracts::EventKind;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct RecordingTransport {
        bodies: Arc<StdMutex<Vec<(String, Bytes)>>>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl ForwardTransport for RecordingTransport {
        async fn forward(&self, write_key: &str, body: Bytes) -> Result<(), ContractError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.bodies
                .lock()
                .unwrap()
                .push((write_key.to_string(), body));
            if self.fail {
                return Err(ContractError::delivery("recording", "503 Service Unavailable"));
            }
            Ok(())
        }
    }

    fn event(id: &str) -> Arc<Event> {
        let mut event = Event::new(EventKind::Track);
        event.message_id = id.to_string();
        event.write_key = "wk".into();
        Arc::new(event)
    }

    fn deadline() -> Deadline {
        Deadline::none(CancellationToken::new())
    }

    async fn wait_for(metrics: &SinkMetrics, delivered_or_failed: u64) {
        for _ in 0..100 {
            if metrics.delivered_count() + metrics.failure_count() >= delivered_or_failed {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_second_immediate_event_skipped() {
        let transport = RecordingTransport::default();
        let metrics = Arc::new(SinkMetrics::new());
        let sink = Arc::new(DropSink::new("mirror", transport.clone(), metrics.clone()));

        sink.accept(&deadline(), event("a")).await.unwrap();
        sink.accept(&deadline(), event("b")).await.unwrap();
        assert!(sink.is_occupied());
        assert_eq!(metrics.skipped_count(), 1);

        let cancel = CancellationToken::new();
        let runner = {
            let sink = Arc::clone(&sink);
            let cancel = cancel.clone();
            tokio::spawn(async move { sink.run(cancel).await })
        };
        wait_for(&metrics, 1).await;
        cancel.cancel();
        runner.await.unwrap().unwrap();

        assert_eq!(metrics.delivered_count(), 1);
        assert_eq!(metrics.skipped_count(), 1);
        let bodies = transport.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].0, "wk");
        let envelope: Batch = serde_json::from_slice(&bodies[0].1).unwrap();
        assert_eq!(envelope.message_id, "a");
        assert_eq!(envelope.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_counted_loop_continues() {
        let transport = RecordingTransport {
            fail: true,
            ..Default::default()
        };
        let metrics = Arc::new(SinkMetrics::new());
        let sink = Arc::new(DropSink::new("mirror", transport.clone(), metrics.clone()));
        let cancel = CancellationToken::new();
        let runner = {
            let sink = Arc::clone(&sink);
            let cancel = cancel.clone();
            tokio::spawn(async move { sink.run(cancel).await })
        };

        sink.accept(&deadline(), event("a")).await.unwrap();
        wait_for(&metrics, 1).await;
        sink.accept(&deadline(), event("b")).await.unwrap();
        wait_for(&metrics, 2).await;

        cancel.cancel();
        runner.await.unwrap().unwrap();
        assert_eq!(metrics.failure_count(), 2);
        assert_eq!(transport.bodies.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_mid_call_propagates() {
        let transport = RecordingTransport {
            delay: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        let metrics = Arc::new(SinkMetrics::new());
        let sink = Arc::new(DropSink::new("mirror", transport, metrics.clone()));
        let cancel = CancellationToken::new();

        sink.accept(&deadline(), event("slow")).await.unwrap();
        let runner = {
            let sink = Arc::clone(&sink);
            let cancel = cancel.clone();
            tokio::spawn(async move { sink.run(cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();

        let err = runner.await.unwrap().unwrap_err();
        assert!(matches!(err, ContractError::Cancelled));
        assert_eq!(metrics.delivered_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_with_empty_cell_returns_ok() {
        let sink = DropSink::new(
            "mirror",
            RecordingTransport::default(),
            Arc::new(SinkMetrics::new()),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(sink.run(cancel).await.is_ok());
    }
}
