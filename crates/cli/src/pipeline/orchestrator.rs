//! Relay orchestrator - wires config, sinks and supervisor, then replays input.
//!
//! Each non-empty input line is one submission: an object with a `batch`
//! array goes through the batch route, anything else through the single
//! event route with the kind taken from its `type` field.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{CancellationToken, DeliveryRecorder, RelayBlueprint};
use dispatcher::{DispatcherBuilder, Ingress, Payload, ResponseStatus};
use observability::{record_submission, PrometheusRecorder};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use super::stats::SinkOutcome;
use super::RelayStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The relay blueprint configuration
    pub blueprint: RelayBlueprint,

    /// NDJSON input (None = stdin)
    pub input: Option<PathBuf>,

    /// Request credential applied to every submission
    pub write_key: Option<String>,

    /// Raw per-submission timeout
    pub timeout: Option<String>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main relay orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Replay the configured input, then drain every sink
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<RelayStats> {
        let reader = open_input(self.config.input.as_ref()).await?;
        self.run_with_reader(reader, shutdown).await
    }

    /// Replay `reader`; stops early on `shutdown` or when a sink dies
    pub async fn run_with_reader<R>(
        self,
        reader: R,
        shutdown: impl Future<Output = ()>,
    ) -> Result<RelayStats>
    where
        R: AsyncBufRead + Unpin,
    {
        let start_time = Instant::now();

        // Initialize Metrics (optional)
        let mut builder = DispatcherBuilder::from_blueprint(&self.config.blueprint);
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
            builder = builder.with_recorder_factory(Arc::new(|sink: &str| {
                Arc::new(PrometheusRecorder::new(sink)) as Arc<dyn DeliveryRecorder>
            }));
        }

        let relay = builder.build().await.context("Failed to build relay")?;
        let cancel = CancellationToken::new();
        let mut supervisor = relay.supervisor.start(cancel.clone());
        let ingress = relay.ingress(cancel.clone());

        let mut stats = RelayStats::default();
        let mut early_exits = Vec::new();

        let replayed = tokio::select! {
            result = self.replay(&ingress, reader, &mut stats) => result,
            Some(exit) = supervisor.next_exit() => {
                error!(
                    sink = %exit.sink,
                    attempts = exit.attempts,
                    "Sink stopped during replay, shutting down"
                );
                early_exits.push(exit);
                Ok(())
            }
            _ = shutdown => {
                warn!("Received shutdown signal, stopping replay...");
                Ok(())
            }
        };

        info!(submissions = stats.submissions, "Replay finished, draining sinks");
        cancel.cancel();
        early_exits.extend(supervisor.join().await);

        stats.outcomes = early_exits.into_iter().map(SinkOutcome::from).collect();
        stats.sinks = relay.metrics();
        stats.duration = start_time.elapsed();

        replayed.map(|()| stats)
    }

    async fn replay<R>(&self, ingress: &Ingress, reader: R, stats: &mut RelayStats) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| CliError::input(self.config.input.as_ref(), e))?
        {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            stats.submissions += 1;

            let (route, status, sent) = self.submit(ingress, line.as_bytes()).await;
            record_submission(route, status.code());
            stats.record(status, sent);
        }
        Ok(())
    }

    async fn submit(
        &self,
        ingress: &Ingress,
        line: &[u8],
    ) -> (&'static str, ResponseStatus, usize) {
        let write_key = self.config.write_key.as_deref();
        let timeout = self.config.timeout.as_deref();

        let (route, outcome) = if is_batch(line) {
            ("batch", ingress.submit_batch(write_key, line, timeout).await)
        } else {
            let single = ingress
                .submit_single(write_key, "", Payload::Json(line), timeout)
                .await;
            ("single", single.map(|_| 1))
        };

        let status = ResponseStatus::from(&outcome);
        match outcome {
            Ok(sent) => {
                debug!(route, sent, "Submission accepted");
                (route, status, sent)
            }
            Err(e) => {
                warn!(route, status = status.code(), error = %e, "Submission rejected");
                (route, status, 0)
            }
        }
    }
}

/// Whether a line is a batch submission
fn is_batch(line: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(line)
        .map(|value| value.get("batch").is_some_and(serde_json::Value::is_array))
        .unwrap_or(false)
}

async fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| CliError::input(Some(path), e))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}
