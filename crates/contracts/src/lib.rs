//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Event timestamps are wall-clock UTC (`chrono::DateTime<Utc>`)
//! - Deadlines and flush timers use the tokio monotonic clock

mod blueprint;
mod deadline;
mod destination;
mod error;
mod event;
mod recorder;
mod sink;

pub use blueprint::*;
pub use deadline::Deadline;
pub use destination::*;
pub use error::*;
pub use event::*;
pub use recorder::*;
pub use sink::*;

pub use tokio_util::sync::CancellationToken;
