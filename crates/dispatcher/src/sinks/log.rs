//! LogDestination - logs delivery summaries via tracing

use bytes::Bytes;
use contracts::{
    BatchDestination, ContractError, DestinationStatus, ForwardTransport, PutBatchOutcome,
};
use tracing::{info, instrument};

/// Destination that only logs what it receives, for debugging
#[derive(Debug, Clone)]
pub struct LogDestination {
    name: String,
}

impl LogDestination {
    /// Create a new LogDestination with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl BatchDestination for LogDestination {
    async fn describe(&self) -> Result<DestinationStatus, ContractError> {
        Ok(DestinationStatus::Found(format!("log:{}", self.name)))
    }

    async fn create(&self) -> Result<String, ContractError> {
        Ok(format!("log:{}", self.name))
    }

    #[instrument(name = "log_destination_put_batch", skip_all, fields(sink = %self.name))]
    async fn put_batch(&self, records: &[Bytes]) -> Result<PutBatchOutcome, ContractError> {
        let bytes: usize = records.iter().map(Bytes::len).sum();
        info!(sink = %self.name, records = records.len(), bytes, "Batch received");
        Ok(PutBatchOutcome::default())
    }
}

impl ForwardTransport for LogDestination {
    #[instrument(name = "log_destination_forward", skip_all, fields(sink = %self.name))]
    async fn forward(&self, write_key: &str, body: Bytes) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            write_key_len = write_key.len(),
            bytes = body.len(),
            "Envelope received"
        );
        Ok(())
    }
}
