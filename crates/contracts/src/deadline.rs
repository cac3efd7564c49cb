//! Deadline - per-request cancellation scope

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::ContractError;

/// Bounds dispatcher fan-out and sink `accept` calls for one request.
///
/// Without an instant the scope ends only when `cancel` fires, which is
/// usually the process-lifetime token.
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Option<Instant>,
    cancel: CancellationToken,
}

impl Deadline {
    /// Scope bounded only by the token
    pub fn none(cancel: CancellationToken) -> Self {
        Self { at: None, cancel }
    }

    /// Scope expiring `timeout` from now
    ///
    /// A timeout too large to represent as an instant leaves the scope open.
    pub fn after(timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
            cancel,
        }
    }

    /// Scope with an optional timeout
    pub fn from_timeout(timeout: Option<Duration>, cancel: CancellationToken) -> Self {
        match timeout {
            Some(timeout) => Self::after(timeout, cancel),
            None => Self::none(cancel),
        }
    }

    /// Expiry instant, if any
    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// Underlying cancellation token
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Already expired or cancelled
    pub fn is_expired(&self) -> bool {
        self.cancel.is_cancelled() || self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Resolves with the cancellation error once the scope ends
    pub async fn expired(&self) -> ContractError {
        match self.at {
            Some(at) => tokio::select! {
                _ = sleep_until(at) => ContractError::DeadlineExceeded,
                _ = self.cancel.cancelled() => ContractError::Cancelled,
            },
            None => {
                self.cancel.cancelled().await;
                ContractError::Cancelled
            }
        }
    }
}
