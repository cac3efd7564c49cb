//! Outbound destination traits
//!
//! Remote protocol glue lives behind these traits so the sinks only own
//! buffering and backpressure policy.

use bytes::Bytes;

use crate::ContractError;

/// Result of an idempotent existence check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationStatus {
    /// Destination exists (identifier for logging)
    Found(String),
    /// Destination absent, may be created
    Missing,
}

/// Result of one batch delivery call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutBatchOutcome {
    /// Records the destination reported as failed
    pub failed: usize,
}

/// Stream-style destination used by the batching sink
#[trait_variant::make(BatchDestination: Send)]
pub trait LocalBatchDestination {
    /// Check whether the destination exists
    async fn describe(&self) -> Result<DestinationStatus, ContractError>;

    /// Create the destination, returning its identifier
    async fn create(&self) -> Result<String, ContractError>;

    /// Deliver one batch of serialized records
    ///
    /// # Errors
    /// Whole-batch failure; per-item failures go in the outcome
    async fn put_batch(&self, records: &[Bytes]) -> Result<PutBatchOutcome, ContractError>;
}

/// Request-style transport used by the drop sink
#[trait_variant::make(ForwardTransport: Send)]
pub trait LocalForwardTransport {
    /// Deliver one serialized envelope on behalf of `write_key`
    async fn forward(&self, write_key: &str, body: Bytes) -> Result<(), ContractError>;
}
