//! Sink trait - Dispatcher output interface
//!
//! Defines the capability every destination implements.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{ContractError, Deadline, Event};

/// Event sink
///
/// `accept` is called concurrently by request tasks; `run` is driven by
/// exactly one supervisor task at a time and may be invoked again after it
/// returns an error.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Submit one event for eventual delivery
    ///
    /// Blocking behavior is variant-specific; callers treat `Ok` as
    /// "submitted", not "delivered".
    ///
    /// # Errors
    /// Returns the deadline error when the scope ends first
    async fn accept(&self, deadline: &Deadline, event: Arc<Event>) -> Result<(), ContractError>;

    /// Drain the internal queue until `cancel` fires
    ///
    /// # Errors
    /// Returns conditions the supervisor should retry (e.g. connect failure)
    async fn run(&self, cancel: CancellationToken) -> Result<(), ContractError>;
}
