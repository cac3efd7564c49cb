//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        projects = blueprint.projects.len(),
        sinks = blueprint.sinks.len(),
        max_attempts = blueprint.supervisor.max_attempts,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        input: args.input.clone(),
        write_key: args.write_key.clone(),
        timeout: args.timeout.clone(),
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
    });

    info!("Starting relay...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Relay execution failed")?;

    info!(
        submissions = stats.submissions,
        events_sent = stats.events_sent,
        duration_secs = stats.duration.as_secs_f64(),
        "Relay completed"
    );
    stats.print_summary();

    let failed = stats.failed_sinks();
    if failed > 0 {
        return Err(CliError::SinkFailures { count: failed }.into());
    }

    info!("Segment Relay finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::RelayBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Projects: {}", blueprint.projects.len());
    println!(
        "Supervisor: backoff {:?}..{:?}, {} attempts",
        blueprint.supervisor.backoff_base,
        blueprint.supervisor.backoff_max,
        blueprint.supervisor.max_attempts
    );

    println!("\nSinks ({}):", blueprint.sinks.len());
    for sink in &blueprint.sinks {
        println!(
            "  - {} ({:?} -> {:?})",
            sink.name, sink.sink_type, sink.destination
        );
    }

    println!();
}
