//! BatchingSink - size/time windowed accumulate-and-flush

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    BatchDestination, CancellationToken, ContractError, Deadline, DeliveryRecorder,
    DestinationStatus, Event, Sink, MAX_FLUSH_INTERVAL,
};

/// Upper bound for one outbound batch
pub const MAX_BATCH_SIZE: usize = 500;

/// Flush interval when none is configured
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for BatchingSink, always normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchingConfig {
    batch_size: usize,
    flush_interval: Duration,
}

impl BatchingConfig {
    /// Normalize raw settings: sizes outside [1, 500] become 500, a missing
    /// or zero interval becomes 30s, longer intervals are capped at 24h
    pub fn new(batch_size: i64, flush_interval: Option<Duration>) -> Self {
        let batch_size = match usize::try_from(batch_size) {
            Ok(size) if (1..=MAX_BATCH_SIZE).contains(&size) => size,
            _ => MAX_BATCH_SIZE,
        };
        let flush_interval = flush_interval
            .filter(|interval| !interval.is_zero())
            .unwrap_or(DEFAULT_FLUSH_INTERVAL)
            .min(MAX_FLUSH_INTERVAL);
        Self {
            batch_size,
            flush_interval,
        }
    }

    /// Records per flush, within [1, 500]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Time-based flush period
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self::new(0, None)
    }
}

/// Lifecycle of one `run` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SinkState {
    Idle = 0,
    Connecting = 1,
    Running = 2,
    Draining = 3,
    Stopped = 4,
}

impl SinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Running,
            3 => Self::Draining,
            4 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

/// Sink that accumulates events and delivers them in windowed batches
///
/// `accept` blocks while the handoff queue (2 x batch size) is full, bounded
/// by the request deadline. Each flush is attempted once; failures are
/// counted and the batch is discarded.
pub struct BatchingSink<D> {
    name: String,
    destination: D,
    config: BatchingConfig,
    recorder: Arc<dyn DeliveryRecorder>,
    tx: mpsc::Sender<Arc<Event>>,
    rx: Mutex<mpsc::Receiver<Arc<Event>>>,
    state: AtomicU8,
}

impl<D: BatchDestination + Sync> BatchingSink<D> {
    /// Create a new BatchingSink
    pub fn new(
        name: impl Into<String>,
        destination: D,
        config: BatchingConfig,
        recorder: Arc<dyn DeliveryRecorder>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.batch_size * 2);
        Self {
            name: name.into(),
            destination,
            config,
            recorder,
            tx,
            rx: Mutex::new(rx),
            state: AtomicU8::new(SinkState::Idle as u8),
        }
    }

    /// Effective configuration
    pub fn config(&self) -> BatchingConfig {
        self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> SinkState {
        SinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Events waiting in the handoff queue
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    fn set_state(&self, state: SinkState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Describe the destination, creating it when absent
    #[instrument(name = "batching_sink_connect", skip(self), fields(sink = %self.name))]
    async fn connect(&self) -> Result<(), ContractError> {
        info!(sink = %self.name, "Connecting to destination");
        match self.destination.describe().await {
            Ok(DestinationStatus::Found(id)) => {
                info!(sink = %self.name, destination = %id, "Found destination");
                Ok(())
            }
            Ok(DestinationStatus::Missing) => match self.destination.create().await {
                Ok(id) => {
                    info!(sink = %self.name, destination = %id, "Created destination");
                    Ok(())
                }
                Err(e) => Err(ContractError::connect(&self.name, e.to_string())),
            },
            Err(e) => Err(ContractError::connect(&self.name, e.to_string())),
        }
    }

    /// Serialize one event as a JSON line into the buffer
    fn buffer_event(&self, buffer: &mut Vec<Bytes>, event: &Event) {
        match serde_json::to_vec(event) {
            Ok(mut line) => {
                line.push(b'\n');
                buffer.push(Bytes::from(line));
            }
            Err(e) => {
                self.recorder.record_failed(1);
                error!(
                    sink = %self.name,
                    message_id = %event.message_id,
                    error = %e,
                    "Encode failed"
                );
            }
        }
    }

    /// Deliver the buffer as one batch and clear it
    async fn flush(&self, buffer: &mut Vec<Bytes>) {
        if buffer.is_empty() {
            debug!(sink = %self.name, "Nothing to send");
            return;
        }

        let count = buffer.len();
        let started = Instant::now();
        match self.destination.put_batch(buffer).await {
            Ok(outcome) => {
                let latency = started.elapsed();
                let failed = outcome.failed.min(count);
                self.recorder.record_failed(failed as u64);
                self.recorder.record_delivered((count - failed) as u64);
                self.recorder.record_latency(latency);
                info!(
                    sink = %self.name,
                    sent = count,
                    failed,
                    latency_ms = latency.as_millis() as u64,
                    "Batch delivered"
                );
            }
            Err(e) => {
                self.recorder.record_failed(count as u64);
                error!(sink = %self.name, count, error = %e, "Batch delivery failed");
            }
        }
        buffer.clear();
    }
}

#[async_trait]
impl<D> Sink for BatchingSink<D>
where
    D: BatchDestination + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn accept(&self, deadline: &Deadline, event: Arc<Event>) -> Result<(), ContractError> {
        tokio::select! {
            biased;
            sent = self.tx.send(event) => sent.map_err(|_| ContractError::sink_closed(&self.name)),
            err = deadline.expired() => {
                warn!(sink = %self.name, error = %err, "Accept abandoned, queue full");
                Err(err)
            }
        }
    }

    #[instrument(name = "batching_sink_run", skip_all, fields(sink = %self.name))]
    async fn run(&self, cancel: CancellationToken) -> Result<(), ContractError> {
        let mut rx = self.rx.lock().await;

        self.set_state(SinkState::Connecting);
        if let Err(e) = self.connect().await {
            self.set_state(SinkState::Stopped);
            return Err(e);
        }

        self.set_state(SinkState::Running);
        info!(
            sink = %self.name,
            batch_size = self.config.batch_size,
            flush_interval_ms = self.config.flush_interval.as_millis() as u64,
            "Starting delivery processing"
        );

        let period = self.config.flush_interval;
        let now = Instant::now();
        let first_tick = now
            .checked_add(period)
            .unwrap_or_else(|| now + DEFAULT_FLUSH_INTERVAL);
        let mut ticker = interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut buffer = Vec::with_capacity(self.config.batch_size);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = rx.recv() => {
                    let Some(event) = received else { break };
                    self.buffer_event(&mut buffer, &event);
                    if buffer.len() >= self.config.batch_size {
                        self.flush(&mut buffer).await;
                        ticker.reset();
                    }
                }
                _ = ticker.tick() => {
                    if !buffer.is_empty() {
                        debug!(sink = %self.name, pending = buffer.len(), "Flush after interval");
                        self.flush(&mut buffer).await;
                    }
                }
            }
        }

        self.set_state(SinkState::Draining);
        info!(sink = %self.name, "Ending delivery processing");
        while let Ok(event) = rx.try_recv() {
            self.buffer_event(&mut buffer, &event);
            if buffer.len() >= self.config.batch_size {
                self.flush(&mut buffer).await;
            }
        }
        self.flush(&mut buffer).await;

        self.set_state(SinkState::Stopped);
        Ok(())
    }
}
