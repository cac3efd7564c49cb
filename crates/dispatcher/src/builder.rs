//! DispatcherBuilder - assembles sinks, dispatcher and supervisor from config

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use contracts::{
    CancellationToken, DeliveryRecorder, DestinationType, ProjectResolver, RelayBlueprint, Sink,
    SinkConfig, SinkType,
};

use crate::dispatcher::Dispatcher;
use crate::error::DispatcherError;
use crate::ingress::Ingress;
use crate::metrics::{CompositeRecorder, MetricsSnapshot, SinkMetrics};
use crate::sinks::{
    BatchingConfig, BatchingSink, DropSink, FileDestination, LogDestination, UdpTransport,
};
use crate::supervisor::{BackoffPolicy, Supervisor};

/// Builds an extra recorder for the named sink
pub type RecorderFactory = Arc<dyn Fn(&str) -> Arc<dyn DeliveryRecorder> + Send + Sync>;

/// A fully wired relay, ready to start
pub struct Relay {
    pub dispatcher: Arc<Dispatcher>,
    pub supervisor: Supervisor,
    /// In-process counters per sink, in registration order
    pub metrics: Vec<(String, Arc<SinkMetrics>)>,
}

impl Relay {
    /// Ingestion boundary over this relay's dispatcher
    pub fn ingress(&self, scope: CancellationToken) -> Ingress {
        Ingress::new(Arc::clone(&self.dispatcher), scope)
    }

    /// Get metrics snapshot for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.metrics
            .iter()
            .map(|(name, metrics)| (name.clone(), metrics.snapshot()))
            .collect()
    }
}

/// Builder for creating a Relay
pub struct DispatcherBuilder {
    sinks: Vec<SinkConfig>,
    resolver: ProjectResolver,
    policy: BackoffPolicy,
    recorder_factory: Option<RecorderFactory>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(sinks: Vec<SinkConfig>, resolver: ProjectResolver) -> Self {
        Self {
            sinks,
            resolver,
            policy: BackoffPolicy::default(),
            recorder_factory: None,
        }
    }

    /// Builder resolving write keys through the blueprint's project table
    pub fn from_blueprint(blueprint: &RelayBlueprint) -> Self {
        Self::new(
            blueprint.sinks.clone(),
            resolver_from_projects(blueprint.projects.clone()),
        )
        .with_policy(blueprint.supervisor.into())
    }

    pub fn with_resolver(mut self, resolver: ProjectResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attach an additional recorder (e.g. Prometheus) to every sink
    pub fn with_recorder_factory(mut self, factory: RecorderFactory) -> Self {
        self.recorder_factory = Some(factory);
        self
    }

    /// Create every sink and wire the dispatcher and supervisor
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(sink_count = self.sinks.len())
    )]
    pub async fn build(self) -> Result<Relay, DispatcherError> {
        let mut sinks = Vec::with_capacity(self.sinks.len());
        let mut metrics = Vec::with_capacity(self.sinks.len());

        for config in &self.sinks {
            let local = Arc::new(SinkMetrics::new());
            let mut recorder =
                CompositeRecorder::new(vec![local.clone() as Arc<dyn DeliveryRecorder>]);
            if let Some(factory) = &self.recorder_factory {
                recorder.push(factory(&config.name));
            }
            sinks.push(create_sink(config, Arc::new(recorder)).await?);
            metrics.push((config.name.clone(), local));
        }

        info!(sink_count = sinks.len(), "Relay assembled");
        Ok(Relay {
            dispatcher: Arc::new(Dispatcher::new(self.resolver, sinks.clone())),
            supervisor: Supervisor::new(sinks, self.policy),
            metrics,
        })
    }
}

/// Create a sink from configuration
#[instrument(name = "create_sink", skip(config, recorder), fields(sink = %config.name))]
pub async fn create_sink(
    config: &SinkConfig,
    recorder: Arc<dyn DeliveryRecorder>,
) -> Result<Arc<dyn Sink>, DispatcherError> {
    let name = config.name.as_str();
    debug!(sink_type = ?config.sink_type, destination = ?config.destination, "Creating sink");

    match (config.sink_type, config.destination) {
        (SinkType::Batching, DestinationType::Log) => Ok(Arc::new(BatchingSink::new(
            name,
            LogDestination::new(name),
            batching_config(config),
            recorder,
        ))),
        (SinkType::Batching, DestinationType::File) => {
            let mut params = config.params.clone();
            params
                .entry("stream".to_string())
                .or_insert_with(|| name.to_string());
            Ok(Arc::new(BatchingSink::new(
                name,
                FileDestination::from_params(name, &params),
                batching_config(config),
                recorder,
            )))
        }
        (SinkType::Drop, DestinationType::Log) => Ok(Arc::new(DropSink::new(
            name,
            LogDestination::new(name),
            recorder,
        ))),
        (SinkType::Drop, DestinationType::Udp) => {
            let transport = UdpTransport::from_params(name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(name, e.to_string()))?;
            Ok(Arc::new(DropSink::new(name, transport, recorder)))
        }
        (sink_type, destination) => Err(DispatcherError::sink_creation(
            name,
            format!("{sink_type:?} sink cannot deliver to {destination:?}"),
        )),
    }
}

fn batching_config(config: &SinkConfig) -> BatchingConfig {
    BatchingConfig::new(config.batch_size, config.flush_interval)
}

/// Resolver backed by a static write key -> project id table
pub fn resolver_from_projects(projects: HashMap<String, String>) -> ProjectResolver {
    Arc::new(move |write_key: &str| projects.get(write_key).cloned().unwrap_or_default())
}
