//! Facegate CLI
//!
//! Runs the access controller against the built-in demo feed, writes a
//! default configuration, or prints the access log.

use clap::{Parser, Subcommand};
use facegate::{
    audit::{read_log, EventLog},
    config::FileConfig,
    control::{AccessStateMachine, AccessWorker, SessionSummary, StatusUpdate, WorkerHandle},
    error::CoreError,
    notify::{LogNotifier, NotificationSink},
    perception::DemoSource,
    relay::RelayChannel,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "facegate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller on the synthetic visitor feed
    Run {
        /// Configuration file (created with defaults if missing)
        #[arg(short, long, default_value = "facegate.toml")]
        config: PathBuf,

        /// Metrics port, overriding the config file (0 disables)
        #[arg(long)]
        port: Option<u16>,

        /// Do not open the relay port
        #[arg(long = "virtual")]
        virtual_relay: bool,

        /// How long the demo feed runs
        #[arg(long, default_value_t = 60)]
        script_seconds: u64,
    },

    /// Write a default configuration file
    InitConfig {
        /// Destination path
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the access log
    Audit {
        /// Configuration file naming the log
        #[arg(short, long, default_value = "facegate.toml")]
        config: PathBuf,

        /// Only the last N rows
        #[arg(long)]
        tail: Option<usize>,
    },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            config,
            port,
            virtual_relay,
            script_seconds,
        } => run(config, port, virtual_relay, Duration::from_secs(script_seconds)),
        Commands::InitConfig { path, force } => init_config(path, force),
        Commands::Audit { config, tail } => audit(config, tail),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(
    config_path: PathBuf,
    port: Option<u16>,
    virtual_relay: bool,
    duration: Duration,
) -> Result<(), CoreError> {
    info!("Facegate v{}", facegate::VERSION);

    let mut config = FileConfig::load_or_create(&config_path)?;
    if let Some(port) = port {
        config.worker.metrics_port = port;
    }

    let relay = if virtual_relay {
        info!("Relay disabled on the command line, running in virtual mode");
        RelayChannel::virtual_mode(&config.relay)
    } else {
        RelayChannel::open(&config.relay)?
    };
    let relay_virtual = relay.is_virtual();

    let audit = EventLog::new(&config.storage);
    info!(log = %audit.path().display(), snapshots = %audit.snapshot_dir().display(), "Audit log ready");
    let notifier = NotificationSink::from_config(&config.notify, LogNotifier)?;

    let frame_interval = Duration::from_millis(config.worker.frame_interval_ms);
    let source = DemoSource::new(&config.access, frame_interval, duration);
    info!(
        cycle_frames = source.cycle_len(),
        seconds = duration.as_secs(),
        "Playing demo visitor feed"
    );

    let machine = AccessStateMachine::new(config.access.clone(), relay, Box::new(audit), notifier);
    let (worker, commands, status) = AccessWorker::new(machine, source, &config.worker);

    ctrlc::set_handler(move || {
        if let Err(e) = commands.shutdown() {
            warn!(error = %e, "Failed to request shutdown");
        }
    })
    .map_err(|e| CoreError::Setup(format!("failed to install Ctrl-C handler: {e}")))?;

    let metrics = start_metrics(config.worker.metrics_port);
    let handle = worker.spawn()?;
    monitor(&handle, status, metrics.as_ref(), relay_virtual);

    let summary = handle.join()?;
    if let Some(metrics) = &metrics {
        metrics.stop();
    }
    print_summary(&summary);
    Ok(())
}

/// Logs every display change until the worker exits.
fn monitor(
    handle: &WorkerHandle,
    mut status: watch::Receiver<StatusUpdate>,
    metrics: Option<&Metrics>,
    relay_virtual: bool,
) {
    let mut last_label = String::new();
    while !handle.is_finished() {
        if status.has_changed().unwrap_or(false) {
            let update = status.borrow_and_update().clone();
            if update.status.label != last_label {
                info!(
                    state = update.lock_state.name(),
                    color = update.status.color.hex(),
                    "{}",
                    update.status
                );
                last_label = update.status.label.clone();
            }
            if let Some(metrics) = metrics {
                metrics.update(&update, relay_virtual);
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn print_summary(summary: &SessionSummary) {
    let stats = &summary.report.stats;
    println!("Session ended: {:?} after {} frames", summary.reason, summary.frames);
    println!(
        "  blinks {}  liveness {}  unlocks {} (face {}, manual {})",
        stats.blinks,
        stats.liveness_confirmations,
        stats.unlocks(),
        stats.unlocks_face,
        stats.unlocks_manual
    );
    println!(
        "  locks {}  unknown alerts {}  door ajar {}",
        stats.locks(),
        stats.unknown_alerts,
        stats.door_ajar_alerts
    );
    println!(
        "  faults: gaps {}  relay {}  audit {}  prompts rejected {}",
        stats.perception_gaps, stats.relay_errors, stats.audit_failures, stats.prompts_rejected
    );
    println!(
        "  relay commands {}  prompts delivered {}  final state {}",
        summary.report.relay_history.len(),
        summary.report.prompts_delivered,
        summary.report.final_state
    );
}

fn init_config(path: PathBuf, force: bool) -> Result<(), CoreError> {
    if path.exists() && !force {
        return Err(CoreError::Setup(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    FileConfig::default().save(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn audit(config_path: PathBuf, tail: Option<usize>) -> Result<(), CoreError> {
    let config = if config_path.exists() {
        FileConfig::from_file(&config_path)?
    } else {
        FileConfig::default()
    };

    let records = read_log(&config.storage.access_log)?;
    let skip = tail.map_or(0, |n| records.len().saturating_sub(n));
    for record in records.iter().skip(skip) {
        println!(
            "{}  {:<18} {}",
            record.timestamp_column(),
            record.kind.as_str(),
            record.subject
        );
    }
    info!(rows = records.len(), path = %config.storage.access_log.display(), "Access log read");
    Ok(())
}

#[cfg(feature = "metrics")]
struct Metrics {
    state: std::sync::Arc<tokio::sync::RwLock<facegate::metrics::MetricsState>>,
}

#[cfg(feature = "metrics")]
impl Metrics {
    fn update(&self, update: &StatusUpdate, relay_virtual: bool) {
        let snapshot = facegate::metrics::MetricsSnapshot::from_status(update, relay_virtual);
        self.state.blocking_read().update(&snapshot);
    }

    fn stop(&self) {
        self.state.blocking_write().mark_stopped();
    }
}

#[cfg(feature = "metrics")]
fn start_metrics(port: u16) -> Option<Metrics> {
    use facegate::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};

    if port == 0 {
        return None;
    }
    let registry = match MetricsRegistry::new() {
        Ok(registry) => registry,
        Err(e) => {
            warn!(error = %e, "Failed to create metrics registry");
            return None;
        }
    };
    let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
    let state = server.state();

    let spawned = std::thread::Builder::new()
        .name("facegate-metrics".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!(error = %e, "Failed to start metrics runtime");
                    return;
                }
            };
            if let Err(e) = runtime.block_on(server.run()) {
                warn!(error = %e, "Metrics server stopped");
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to start metrics thread");
        return None;
    }
    Some(Metrics { state })
}

#[cfg(not(feature = "metrics"))]
struct Metrics;

#[cfg(not(feature = "metrics"))]
impl Metrics {
    fn update(&self, _update: &StatusUpdate, _relay_virtual: bool) {}

    fn stop(&self) {}
}

#[cfg(not(feature = "metrics"))]
fn start_metrics(port: u16) -> Option<Metrics> {
    if port != 0 {
        info!(port, "Built without the metrics feature, exporter disabled");
    }
    None
}
