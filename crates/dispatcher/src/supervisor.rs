//! Supervisor - runs every sink loop with bounded exponential backoff

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use contracts::{CancellationToken, ContractError, Sink, SupervisorConfig};

/// Highest doubling step before the delay is pinned to `max`
const BACKOFF_CAP_EXPONENT: u32 = 20;

/// Retry policy for sink run loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    /// Total `run` invocations, including the first
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (1-based): `min(base * 2^(retry-1), max)`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(BACKOFF_CAP_EXPONENT);
        self.base.saturating_mul(1u32 << shift).min(self.max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        SupervisorConfig::default().into()
    }
}

impl From<SupervisorConfig> for BackoffPolicy {
    fn from(config: SupervisorConfig) -> Self {
        Self {
            base: config.backoff_base,
            max: config.backoff_max,
            max_attempts: config.max_attempts.max(1),
        }
    }
}

/// Final report of one supervised sink
#[derive(Debug)]
pub struct SinkExit {
    pub sink: String,
    /// `run` invocations made
    pub attempts: u32,
    /// Last `run` result
    pub result: Result<(), ContractError>,
}

/// Starts one long-lived task per sink
pub struct Supervisor {
    sinks: Vec<Arc<dyn Sink>>,
    policy: BackoffPolicy,
}

impl Supervisor {
    pub fn new(sinks: Vec<Arc<dyn Sink>>, policy: BackoffPolicy) -> Self {
        Self { sinks, policy }
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    /// Spawn every sink loop under `cancel`
    #[instrument(name = "supervisor_start", skip_all, fields(sink_count = self.sinks.len()))]
    pub fn start(&self, cancel: CancellationToken) -> SupervisorHandle {
        let (tx, rx) = mpsc::channel(self.sinks.len().max(1));

        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let tx = tx.clone();
            let cancel = cancel.clone();
            let policy = self.policy;
            tokio::spawn(async move {
                let exit = supervise(sink, policy, cancel).await;
                // receiver gone means nobody is waiting for the report
                let _ = tx.send(exit).await;
            });
        }

        info!(sink_count = self.sinks.len(), "Supervisor started");
        SupervisorHandle { rx }
    }
}

/// Completion channel of a started supervisor
pub struct SupervisorHandle {
    rx: mpsc::Receiver<SinkExit>,
}

impl SupervisorHandle {
    /// Next sink to finish, `None` once every task has reported
    pub async fn next_exit(&mut self) -> Option<SinkExit> {
        self.rx.recv().await
    }

    /// Wait for every sink task to finish
    pub async fn join(mut self) -> Vec<SinkExit> {
        let mut exits = Vec::new();
        while let Some(exit) = self.next_exit().await {
            exits.push(exit);
        }
        exits
    }
}

/// One `run` invocation on its own task; a panic becomes a failed attempt
async fn run_once(sink: &Arc<dyn Sink>, cancel: &CancellationToken) -> Result<(), ContractError> {
    let task = {
        let sink = Arc::clone(sink);
        let cancel = cancel.clone();
        tokio::spawn(async move { sink.run(cancel).await })
    };
    match task.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(ContractError::Other(format!(
            "sink '{}' run loop panicked",
            sink.name()
        ))),
        Err(e) => Err(ContractError::Other(format!(
            "sink '{}' run loop aborted: {e}",
            sink.name()
        ))),
    }
}

#[instrument(name = "supervise_sink", skip_all, fields(sink = %sink.name()))]
async fn supervise(
    sink: Arc<dyn Sink>,
    policy: BackoffPolicy,
    cancel: CancellationToken,
) -> SinkExit {
    let name = sink.name().to_string();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let result = run_once(&sink, &cancel).await;

        let err = match result {
            Ok(()) => {
                info!(sink = %name, attempts, "Sink loop finished");
                return SinkExit {
                    sink: name,
                    attempts,
                    result: Ok(()),
                };
            }
            Err(e) => e,
        };

        if cancel.is_cancelled() {
            warn!(sink = %name, attempts, error = %err, "Sink loop failed during shutdown");
            return SinkExit {
                sink: name,
                attempts,
                result: Err(err),
            };
        }

        if attempts >= policy.max_attempts {
            error!(sink = %name, attempts, error = %err, "Sink retries exhausted");
            return SinkExit {
                sink: name,
                attempts,
                result: Err(err),
            };
        }

        let delay = policy.delay_for(attempts);
        warn!(
            sink = %name,
            attempts,
            error = %err,
            retry_in_ms = delay.as_millis() as u64,
            "Sink loop failed, backing off"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(sink = %name, attempts, "Backoff interrupted by shutdown");
                return SinkExit {
                    sink: name,
                    attempts,
                    result: Err(err),
                };
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use contracts::{Deadline, Event};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Fails `failures` times, then returns Ok
    struct FlakySink {
        failures: u32,
        runs: AtomicU32,
        started: Mutex<Vec<Instant>>,
    }

    impl FlakySink {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                runs: AtomicU32::new(0),
                started: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Sink for FlakySink {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn accept(
            &self,
            _deadline: &Deadline,
            _event: Arc<Event>,
        ) -> Result<(), ContractError> {
            Ok(())
        }

        async fn run(&self, _cancel: CancellationToken) -> Result<(), ContractError> {
            self.started.lock().unwrap().push(Instant::now());
            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if run <= self.failures {
                return Err(ContractError::connect("flaky", "stream unavailable"));
            }
            Ok(())
        }
    }

    /// Panics on every run
    #[derive(Default)]
    struct PanickingSink {
        runs: AtomicU32,
    }

    #[async_trait]
    impl Sink for PanickingSink {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn accept(
            &self,
            _deadline: &Deadline,
            _event: Arc<Event>,
        ) -> Result<(), ContractError> {
            Ok(())
        }

        async fn run(&self, _cancel: CancellationToken) -> Result<(), ContractError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            panic!("run loop bug");
        }
    }

    fn policy(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(2),
            max: Duration::from_millis(8),
            max_attempts,
        }
    }

    #[test]
    fn test_delay_for_doubles_and_caps() {
        let policy = BackoffPolicy {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
            max_attempts: 10,
        };
        let delays: Vec<_> = (1..=6).map(|n| policy.delay_for(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
                Duration::from_secs(1),
                Duration::from_secs(1),
            ]
        );
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base, Duration::from_millis(100));
        assert_eq!(policy.max, Duration::from_secs(10));
        assert_eq!(policy.max_attempts, 10);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let sink = Arc::new(FlakySink::new(3));
        let supervisor = Supervisor::new(vec![sink.clone()], policy(10));

        let exits = supervisor.start(CancellationToken::new()).join().await;
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].attempts, 4);
        assert!(exits[0].result.is_ok());

        let started = sink.started.lock().unwrap();
        let gaps: Vec<_> = started.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(gaps.len(), 3);
        assert!(gaps[0] >= Duration::from_millis(2));
        assert!(gaps[2] >= Duration::from_millis(8));
    }

    #[tokio::test]
    async fn test_exhaustion_reported() {
        let sink = Arc::new(FlakySink::new(u32::MAX));
        let supervisor = Supervisor::new(vec![sink.clone()], policy(3));

        let mut handle = supervisor.start(CancellationToken::new());
        let exit = handle.next_exit().await.unwrap();
        assert_eq!(exit.sink, "flaky");
        assert_eq!(exit.attempts, 3);
        assert!(matches!(exit.result, Err(ContractError::Connect { .. })));
        assert!(handle.next_exit().await.is_none());
        assert_eq!(sink.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_panicking_run_is_reported() {
        let panicking = Arc::new(PanickingSink::default());
        let flaky = Arc::new(FlakySink::new(0));
        let sinks: Vec<Arc<dyn Sink>> = vec![panicking.clone(), flaky];
        let supervisor = Supervisor::new(sinks, policy(2));

        let mut exits = supervisor.start(CancellationToken::new()).join().await;
        exits.sort_by(|a, b| a.sink.cmp(&b.sink));
        assert_eq!(exits.len(), 2);

        assert_eq!(exits[0].sink, "flaky");
        assert!(exits[0].result.is_ok());

        assert_eq!(exits[1].sink, "panicking");
        assert_eq!(exits[1].attempts, 2);
        match &exits[1].result {
            Err(ContractError::Other(message)) => assert!(message.contains("panicked")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(panicking.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let sink = Arc::new(FlakySink::new(u32::MAX));
        let slow = BackoffPolicy {
            base: Duration::from_secs(60),
            max: Duration::from_secs(60),
            max_attempts: 10,
        };
        let supervisor = Supervisor::new(vec![sink.clone()], slow);
        let cancel = CancellationToken::new();
        let handle = supervisor.start(cancel.clone());

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let exits = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap();
        assert_eq!(exits[0].attempts, 1);
        assert!(exits[0].result.is_err());
        assert_eq!(sink.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_sinks_closes_immediately() {
        let supervisor = Supervisor::new(Vec::new(), BackoffPolicy::default());
        assert!(supervisor.start(CancellationToken::new()).join().await.is_empty());
    }
}
