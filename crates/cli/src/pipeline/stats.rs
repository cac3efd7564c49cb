//! Relay run statistics.

use std::time::Duration;

use dispatcher::{MetricsSnapshot, ResponseStatus, SinkExit};

/// Final state of one supervised sink
#[derive(Debug, Clone)]
pub struct SinkOutcome {
    pub name: String,
    pub attempts: u32,
    /// Last run error, if the loop did not end cleanly
    pub error: Option<String>,
    /// Whether the error came from shutdown
    pub cancelled: bool,
}

impl From<SinkExit> for SinkOutcome {
    fn from(exit: SinkExit) -> Self {
        let (error, cancelled) = match &exit.result {
            Ok(()) => (None, false),
            Err(e) => (Some(e.to_string()), e.is_cancellation()),
        };
        Self {
            name: exit.sink,
            attempts: exit.attempts,
            error,
            cancelled,
        }
    }
}

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    /// Non-empty input lines read
    pub submissions: u64,

    /// Events handed to every sink
    pub events_sent: u64,

    /// Submissions rejected as malformed (400)
    pub rejected_decode: u64,

    /// Submissions rejected for credentials (401)
    pub rejected_auth: u64,

    /// Submissions failed by a sink (500)
    pub rejected_sink: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Delivery counters per sink
    pub sinks: Vec<(String, MetricsSnapshot)>,

    /// Supervisor reports per sink
    pub outcomes: Vec<SinkOutcome>,
}

impl RelayStats {
    /// Count one submission outcome
    pub fn record(&mut self, status: ResponseStatus, events: usize) {
        match status {
            ResponseStatus::Ok => self.events_sent += events as u64,
            ResponseStatus::BadRequest => self.rejected_decode += 1,
            ResponseStatus::Unauthorized => self.rejected_auth += 1,
            ResponseStatus::Internal => self.rejected_sink += 1,
        }
    }

    /// Sinks that stopped with a non-shutdown error
    pub fn failed_sinks(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.error.is_some() && !o.cancelled)
            .count()
    }

    /// Events per second throughput
    pub fn events_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.events_sent as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Relay Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Submissions: {}", self.submissions);
        println!("   ├─ Events sent: {}", self.events_sent);
        println!("   ├─ Events/s: {:.2}", self.events_per_sec());
        println!(
            "   └─ Rejected: {} decode, {} auth, {} sink",
            self.rejected_decode, self.rejected_auth, self.rejected_sink
        );

        println!("\nSinks");
        for (name, snapshot) in &self.sinks {
            let latency = snapshot
                .mean_latency
                .map(|l| format!("{:.2}ms", l.as_secs_f64() * 1000.0))
                .unwrap_or_else(|| "N/A".to_string());
            println!(
                "   ├─ {}: delivered={} failed={} skipped={} mean_latency={}",
                name,
                snapshot.delivered_count,
                snapshot.failure_count,
                snapshot.skipped_count,
                latency
            );
        }

        for outcome in &self.outcomes {
            if let Some(ref error) = outcome.error {
                println!(
                    "   ⚠ {} stopped after {} attempt(s): {}",
                    outcome.name, outcome.attempts, error
                );
            }
        }

        println!();
    }
}
