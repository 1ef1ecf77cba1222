use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use topic_watchdog::{
    config::{Config, ConfigOverrides},
    error::Result,
    escalation::{ActionDispatcher, EscalationEngine, EscalationTable},
    messaging::NatsEventSource,
    notifications::{EmailSender, Notifier},
    remediation::SystemdRemediator,
    watchdog::{spawn_shutdown_listener, Watchdog, WatchdogSettings},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "topic-watchdog", version)]
#[command(about = "Watch message-bus topics for silence and escalate", long_about = None)]
struct Cli {
    /// Configuration file (default: ./topic-watchdog.toml if present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref(), &cli.overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config);
    tracing::info!("Starting Topic Watchdog v{}", env!("CARGO_PKG_VERSION"));

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.error_code(), error = %e, "Watchdog terminated");
            eprintln!("topic-watchdog: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &Config) {
    let default_directive = if config.debug {
        "topic_watchdog=debug"
    } else {
        "topic_watchdog=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn run(config: Config) -> Result<()> {
    let table = EscalationTable::register(config.stream_specs(), Utc::now())?;
    let dispatch_timeout = config.watchdog.dispatch_timeout();

    let notifier = EmailSender::from_config(&config.email, dispatch_timeout)?
        .map(|sender| Arc::new(sender) as Arc<dyn Notifier>);
    match &notifier {
        Some(_) => tracing::info!(to = %config.email.to, smtp = %config.email.smtp, "Email notifications enabled"),
        None => tracing::warn!("No email recipient configured, notifications disabled"),
    }

    let remediator = Arc::new(SystemdRemediator::from_config(&config.remediation));
    let dispatcher = ActionDispatcher::new(notifier, remediator).with_timeout(dispatch_timeout);

    let source = NatsEventSource::new(config.bus.clone());
    let mut watchdog = Watchdog::new(
        Box::new(source),
        EscalationEngine::new(table, dispatcher),
        WatchdogSettings::from(&config.watchdog),
    );

    tracing::info!("Press Ctrl+C to shutdown");
    watchdog.run(spawn_shutdown_listener()).await
}
