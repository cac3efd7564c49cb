//! Sink implementations
//!
//! BatchingSink and DropSink own backpressure policy; LogDestination,
//! FileDestination and UdpTransport are the backends they deliver to.

mod batching;
mod drop;
mod file;
mod log;
mod network;

pub use self::batching::{
    BatchingConfig, BatchingSink, SinkState, DEFAULT_FLUSH_INTERVAL, MAX_BATCH_SIZE,
};
pub use self::drop::DropSink;
pub use self::file::{FileDestination, FileDestinationConfig};
pub use self::log::LogDestination;
pub use self::network::{UdpTransport, UdpTransportConfig};
