//! vigil Binary Entry Point
//!
//! Runs the monitoring scheduler until Ctrl+C or SIGTERM.
//! Core functionality is provided by the `vigil` library crate.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil::{
    AgentRegistry, ChannelBroadcaster, InfluxSink, MemoryStore, PointSink, SchedulerBuilder,
    StorageBuilder, Store, TransportRegistry,
    config::{AppConfig, DatabaseDriver, SinkDriver, parse_duration},
};

/// vigil - monitoring agent
#[derive(Parser, Debug)]
#[command(name = "vigil", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, env = "VIGIL_CONFIG")]
    config: Option<String>,

    /// Database driver: sqlite or memory (overrides config file)
    #[arg(long, env = "VIGIL_DB_DRIVER")]
    db_driver: Option<DatabaseDriver>,

    /// Database directory or sqlite URL (overrides config file)
    #[arg(long, env = "VIGIL_DB_DSN")]
    db_dsn: Option<String>,

    /// Logical database name (overrides config file)
    #[arg(long, env = "VIGIL_DB_NAME")]
    db_name: Option<String>,

    /// Scheduler tick, e.g. 100ms (overrides config file)
    #[arg(long, env = "VIGIL_TICK", value_parser = parse_duration)]
    tick: Option<std::time::Duration>,

    /// Print the registered agents and their measurements, then exit
    #[arg(long)]
    list_agents: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vigil=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let agents = AgentRegistry::with_builtins();

    if cli.list_agents {
        for (key, doc) in agents.docs() {
            println!("{key}\n{doc}");
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!(path = %path, "Loading configuration");
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };

    // CLI > ENV > config file
    if let Some(driver) = cli.db_driver {
        config.database.driver = driver;
    }
    if let Some(dsn) = cli.db_dsn {
        config.database.dsn = dsn;
    }
    if let Some(name) = cli.db_name {
        config.database.name = name;
    }
    if let Some(tick) = cli.tick {
        config.scheduler.tick = tick;
    }
    config.validate()?;

    tracing::info!(
        driver = %config.database.driver,
        url = %config.database.url(),
        sink = %config.sink.driver,
        tick = ?config.scheduler.tick,
        "vigil starting"
    );

    // An unreachable store is fatal here and only here.
    let storage = StorageBuilder::new(config.points_url())
        .channel_capacity(config.sink.channel_capacity)
        .batch_size(config.sink.batch_size)
        .batch_flush_interval(config.sink.flush_interval)
        .build()
        .await?;

    let store: Arc<dyn Store> = match config.database.driver {
        DatabaseDriver::Sqlite => storage.store.clone(),
        DatabaseDriver::Memory => Arc::new(MemoryStore::new()),
    };

    let sink: Arc<dyn PointSink> = match config.sink.driver {
        SinkDriver::Sqlite => Arc::new(storage.writer.clone()),
        SinkDriver::Influxdb => {
            let influx = config
                .sink
                .influxdb
                .as_ref()
                .ok_or("sink driver 'influxdb' requires an influxdb section")?;
            let sink = InfluxSink::new(
                &influx.parsed_url()?,
                &influx.database,
                influx.credentials(),
                influx.timeout,
            )?;
            tracing::info!(url = %sink.write_url(), "Writing points to InfluxDB");
            Arc::new(sink)
        }
    };

    let broadcaster = Arc::new(ChannelBroadcaster::default());
    let mut events = broadcaster.subscribe();
    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match events.recv().await {
                Ok(event) => {
                    tracing::trace!(event = event.name(), monitor = %event.monitor_id(), "Monitor event");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event log lagging");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let scheduler = SchedulerBuilder::new(store, sink)
        .broadcaster(broadcaster)
        .agents(agents)
        .transports(TransportRegistry::with_builtins())
        .options(config.scheduler.options())
        .build();

    scheduler.ensure_local_host().await?;
    let report = scheduler
        .seed_monitors(config.monitors.iter().map(|seed| seed.to_monitor()))
        .await?;
    tracing::info!(added = report.added, existing = report.existing, "Seed monitors checked");

    tracing::info!("Press Ctrl+C to shutdown");
    scheduler.run(shutdown_signal()).await;

    tracing::info!("Shutting down storage...");
    if let Err(e) = storage.shutdown().await {
        tracing::error!(error = %e, "Failed to shutdown storage");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
