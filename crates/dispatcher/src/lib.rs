//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - 规范化入站事件 (message id / 时间戳 / project id)
//! - 按注册顺序 fan-out 到多个 sinks，首个失败即中止
//! - 每个 sink 自带缓冲与背压策略 (batching / drop)
//! - Supervisor 以指数退避重启 sink 处理循环

pub mod builder;
pub mod dispatcher;
pub mod error;
pub mod ingress;
pub mod metrics;
pub mod sinks;
pub mod supervisor;

pub use builder::{create_sink, resolver_from_projects, DispatcherBuilder, RecorderFactory, Relay};
pub use contracts::{Event, Sink};
pub use dispatcher::Dispatcher;
pub use error::{DispatcherError, ResponseStatus};
pub use ingress::{parse_timeout, Ingress, Payload};
pub use metrics::{CompositeRecorder, MetricsSnapshot, SinkMetrics};
pub use sinks::{
    BatchingConfig, BatchingSink, DropSink, FileDestination, FileDestinationConfig, LogDestination,
    SinkState, UdpTransport, UdpTransportConfig, DEFAULT_FLUSH_INTERVAL, MAX_BATCH_SIZE,
};
pub use supervisor::{BackoffPolicy, SinkExit, Supervisor, SupervisorHandle};
