//! 配置校验模块
//!
//! 校验规则：
//! - 至少一个 sink
//! - sink name 非空且唯一
//! - sink 类型与投递后端匹配
//! - udp 后端必须配置 addr
//! - flush_interval 不超过 24h
//! - max_attempts >= 1, backoff_base <= backoff_max
//! - project id 非空

use std::collections::HashSet;

use contracts::{ContractError, DestinationType, RelayBlueprint, MAX_FLUSH_INTERVAL};

/// 校验 RelayBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    validate_sinks(blueprint)?;
    validate_supervisor(blueprint)?;
    validate_projects(blueprint)?;
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    if blueprint.sinks.is_empty() {
        return Err(ContractError::config_validation(
            "sinks",
            "at least one sink is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(&sink.name) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if !sink.sink_type.supports(sink.destination) {
            return Err(ContractError::config_validation(
                format!("sinks[{}].destination", sink.name),
                format!(
                    "{:?} sink cannot deliver to {:?} destination",
                    sink.sink_type, sink.destination
                ),
            ));
        }
        if sink.destination == DestinationType::Udp && !sink.params.contains_key("addr") {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params.addr", sink.name),
                "udp destination requires 'addr'",
            ));
        }
        if let Some(interval) = sink.flush_interval {
            if interval > MAX_FLUSH_INTERVAL {
                return Err(ContractError::config_validation(
                    format!("sinks[{}].flush_interval", sink.name),
                    format!(
                        "flush_interval ({:?}) must be <= {:?}",
                        interval, MAX_FLUSH_INTERVAL
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// 校验监督重试策略
fn validate_supervisor(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    let supervisor = &blueprint.supervisor;

    if supervisor.max_attempts == 0 {
        return Err(ContractError::config_validation(
            "supervisor.max_attempts",
            "max_attempts must be >= 1",
        ));
    }

    if supervisor.backoff_base > supervisor.backoff_max {
        return Err(ContractError::config_validation(
            "supervisor.backoff_base / supervisor.backoff_max",
            format!(
                "backoff_base ({:?}) must be <= backoff_max ({:?})",
                supervisor.backoff_base, supervisor.backoff_max
            ),
        ));
    }

    Ok(())
}

/// 校验项目映射
fn validate_projects(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    for (write_key, project_id) in &blueprint.projects {
        if project_id.is_empty() {
            return Err(ContractError::config_validation(
                format!("projects[{}]", write_key),
                "project id cannot be empty",
            ));
        }
    }
    Ok(())
}
