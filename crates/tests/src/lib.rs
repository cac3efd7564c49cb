//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 配置 -> 构建 -> 入口 -> sink 的端到端流程
//! - 关闭时的排空语义

#[cfg(test)]
mod contract_tests {
    use contracts::{Batch, Event, EventKind};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_event_wire_shape() {
        let mut event = Event::new(EventKind::Track);
        event.message_id = "m-1".into();
        event.write_key = "key-1".into();
        event.event = "Signed Up".into();

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "track");
        assert_eq!(value["messageId"], "m-1");
        assert_eq!(value["event"], "Signed Up");

        let envelope = serde_json::to_value(Batch::envelope(&event)).unwrap();
        assert_eq!(envelope["messageId"], "m-1");
        assert_eq!(envelope["batch"].as_array().unwrap().len(), 1);
        assert!(envelope["batch"][0].get("writeKey").is_none());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{CancellationToken, DeliveryRecorder, Event, EventKind};
    use dispatcher::{DispatcherBuilder, Payload, ResponseStatus};
    use observability::PrometheusRecorder;

    fn relay_toml(base_path: &str, batch_size: usize) -> String {
        format!(
            r#"
version = "V1"

[projects]
"key-1" = "project-a"
"key-2" = "project-b"

[supervisor]
backoff_base = "5ms"
backoff_max = "20ms"
max_attempts = 3

[[sinks]]
name = "primary"
sink_type = "batching"
destination = "file"
batch_size = {batch_size}
flush_interval = "1h"
params = {{ base_path = "{base_path}", stream = "events" }}

[[sinks]]
name = "mirror"
sink_type = "drop"
destination = "log"
"#
        )
    }

    fn read_events(path: &std::path::Path) -> Vec<Event> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// End-to-end test: config -> builder -> ingress -> sinks -> drain
    ///
    /// 验证完整的数据流：
    /// 1. TOML 配置加载并校验
    /// 2. Supervisor 启动所有 sink
    /// 3. 单条与批量提交经 Ingress 分发
    /// 4. 取消后 batching sink 排空并落盘
    #[tokio::test]
    async fn test_e2e_file_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let base_path = dir.path().join("out");
        let blueprint = ConfigLoader::load_from_str(
            &relay_toml(&base_path.display().to_string(), 3),
            ConfigFormat::Toml,
        )
        .unwrap();

        let relay = DispatcherBuilder::from_blueprint(&blueprint)
            .with_recorder_factory(Arc::new(|sink: &str| {
                Arc::new(PrometheusRecorder::new(sink)) as Arc<dyn DeliveryRecorder>
            }))
            .build()
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let supervisor = relay.supervisor.start(cancel.clone());
        let ingress = relay.ingress(cancel.clone());

        for i in 0..4 {
            let body = format!(r#"{{"event":"Clicked {i}","userId":"u-{i}"}}"#);
            let sent = ingress
                .submit_single(Some("key-1"), "t", Payload::Json(body.as_bytes()), Some("5s"))
                .await
                .unwrap();
            assert_eq!(sent.project_id, "project-a");
        }

        let batch = br#"{
            "context": { "library": { "name": "analytics.js" } },
            "batch": [
                { "type": "identify", "userId": "u-9", "context": { "ip": "1.2.3.4" } },
                { "type": "page", "name": "Home" },
                { "type": "group", "writeKey": "key-2" }
            ]
        }"#;
        let sent = ingress.submit_batch(Some("key-2"), batch, None).await.unwrap();
        assert_eq!(sent, 3);

        cancel.cancel();
        let exits = supervisor.join().await;
        assert_eq!(exits.len(), 2);
        for exit in &exits {
            assert!(exit.result.is_ok(), "{} exited with {:?}", exit.sink, exit.result);
            assert_eq!(exit.attempts, 1);
        }

        let events = read_events(&base_path.join("events.ndjson"));
        assert_eq!(events.len(), 7);
        for event in &events {
            assert!(!event.message_id.is_empty());
            assert!(event.sent_at.is_some());
            assert!(event.timestamp.is_some());
        }
        assert_eq!(events[0].kind, Some(EventKind::Track));
        assert_eq!(events[4].kind, Some(EventKind::Identify));
        assert_eq!(events[4].project_id, "project-b");
        let context = events[4].context.as_ref().unwrap();
        assert!(context.get("ip").is_none());
        assert_eq!(context["library"]["name"], "analytics.js");

        let metrics = relay.metrics();
        assert_eq!(metrics[0].0, "primary");
        assert_eq!(metrics[0].1.delivered_count, 7);
        assert_eq!(metrics[0].1.failure_count, 0);
        let mirror = &metrics[1].1;
        assert_eq!(mirror.delivered_count + mirror.skipped_count, 7);
    }

    #[tokio::test]
    async fn test_e2e_rejections_touch_no_sink() {
        let dir = tempfile::tempdir().unwrap();
        let base_path = dir.path().join("out");
        let blueprint = ConfigLoader::load_from_str(
            &relay_toml(&base_path.display().to_string(), 10),
            ConfigFormat::Toml,
        )
        .unwrap();
        let relay = DispatcherBuilder::from_blueprint(&blueprint)
            .build()
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let supervisor = relay.supervisor.start(cancel.clone());
        let ingress = relay.ingress(cancel.clone());

        let unknown = ingress
            .submit_single(Some("nope"), "t", Payload::Json(b"{}"), None)
            .await;
        assert_eq!(ResponseStatus::from(&unknown), ResponseStatus::Unauthorized);

        let missing_key = ingress
            .submit_single(None, "t", Payload::Json(b"{}"), None)
            .await;
        assert_eq!(ResponseStatus::from(&missing_key).code(), 401);

        let malformed = ingress
            .submit_batch(Some("key-1"), b"{\"batch\": [", None)
            .await;
        assert_eq!(ResponseStatus::from(&malformed).code(), 400);

        cancel.cancel();
        supervisor.join().await;

        for (_, snapshot) in relay.metrics() {
            assert_eq!(snapshot.delivered_count, 0);
            assert_eq!(snapshot.skipped_count, 0);
        }
        // 目录在 connect 时创建，无事件则不产生文件
        assert!(!base_path.join("events.ndjson").exists());
    }

    #[tokio::test]
    async fn test_e2e_unreachable_destination_gives_up() {
        // base_path 指向普通文件: describe 必然失败
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let toml = format!(
            r#"
[projects]
"key-1" = "project-a"

[supervisor]
backoff_base = "1ms"
backoff_max = "4ms"
max_attempts = 3

[[sinks]]
name = "primary"
sink_type = "batching"
destination = "file"
params = {{ base_path = "{}" }}
"#,
            blocker.display()
        );
        let blueprint = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        let relay = DispatcherBuilder::from_blueprint(&blueprint)
            .build()
            .await
            .unwrap();

        let exits = tokio::time::timeout(
            Duration::from_secs(5),
            relay.supervisor.start(CancellationToken::new()).join(),
        )
        .await
        .unwrap();

        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].attempts, 3);
        assert!(matches!(
            exits[0].result,
            Err(contracts::ContractError::Connect { .. })
        ));
    }
}
