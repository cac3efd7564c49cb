//! RelayBlueprint - Config Loader 输出
//!
//! 描述完整的中继配置：项目映射、监督重试策略、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的中继配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// write key -> project id
    #[serde(default)]
    pub projects: HashMap<String, String>,

    /// 监督重试策略
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// 输出路由配置 (顺序即分发顺序)
    pub sinks: Vec<SinkConfig>,
}

/// Run-loop retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// First retry delay
    #[serde(default = "default_backoff_base", with = "humantime_serde")]
    pub backoff_base: Duration,

    /// Retry delay cap
    #[serde(default = "default_backoff_max", with = "humantime_serde")]
    pub backoff_max: Duration,

    /// Total `run` invocations before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_backoff_base() -> Duration {
    Duration::from_millis(100)
}

fn default_backoff_max() -> Duration {
    Duration::from_secs(10)
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            backoff_base: default_backoff_base(),
            backoff_max: default_backoff_max(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Longest accepted batching flush interval
pub const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型 (背压策略)
    pub sink_type: SinkType,

    /// 投递后端
    pub destination: DestinationType,

    /// Batching only; clamped to [1, 500]
    #[serde(default)]
    pub batch_size: i64,

    /// Batching only; defaults to 30s, at most [`MAX_FLUSH_INTERVAL`]
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub flush_interval: Option<Duration>,

    /// 后端特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Windowed accumulate-and-flush, blocks with deadline
    Batching,
    /// Single-slot forwarder, drops under congestion
    Drop,
}

/// 投递后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationType {
    /// 日志输出
    Log,
    /// NDJSON 文件
    File,
    /// UDP 数据报
    Udp,
}

impl SinkType {
    /// Whether this sink type can drive the destination
    pub fn supports(&self, destination: DestinationType) -> bool {
        match self {
            Self::Batching => matches!(destination, DestinationType::Log | DestinationType::File),
            Self::Drop => matches!(destination, DestinationType::Log | DestinationType::Udp),
        }
    }
}
