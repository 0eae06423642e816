use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

use autoscaler::cluster::{ClusterClient, KubeClusterClient};
use autoscaler::config::GlobalConfig;
use autoscaler::notification::{slack::SlackNotifier, Notifier};
use autoscaler::supervisor::{Supervisor, CONFIG_MAP_NAME};

/// Autoscaler — probe-driven replica scaling for Kubernetes deployments
#[derive(Parser)]
#[command(name = "autoscaler", about)]
struct Cli {
    /// Debug mode
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Prints version number
    #[arg(long)]
    version: bool,

    /// Environment name
    #[arg(long, default_value = "")]
    environment: String,

    /// Namespace of autoscaler to run within
    #[arg(long, default_value = "")]
    namespace: String,

    /// Slack webhook URL to use
    #[arg(long = "slack_url", default_value = "")]
    slack_url: String,

    /// Slack channel to send messages to
    #[arg(long = "slack_channel", default_value = "")]
    slack_channel: String,

    /// Name of cluster
    #[arg(long = "cluster_name", default_value = "")]
    cluster_name: String,
}

impl Cli {
    fn global_config(&self) -> GlobalConfig {
        GlobalConfig {
            environment: self.environment.clone(),
            namespace: self.namespace.clone(),
            slack_webhook_url: self.slack_url.clone(),
            slack_channel: self.slack_channel.clone(),
            cluster_name: self.cluster_name.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("autoscaler version: {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let root_span = tracing::info_span!(
        "autoscaler",
        namespace = %cli.namespace,
        environment = %cli.environment,
    );

    run(cli).instrument(root_span).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "autoscaler starting");

    if cli.verbose {
        tracing::info!("running in verbose logging mode");
    }

    let shutdown = spawn_signal_listener()?;

    tracing::debug!("initializing cluster client");
    let cluster = Arc::new(
        KubeClusterClient::new(&cli.namespace)
            .await
            .context("failed to initialize cluster client")?,
    );
    tracing::debug!("successfully initialized cluster client");

    let entries = cluster
        .get_config_map(CONFIG_MAP_NAME)
        .await
        .context("failed to fetch autoscaler configmap")?;

    let global = cli.global_config();

    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if !global.slack_webhook_url.is_empty() {
        tracing::debug!("initializing slack notifier");
        notifiers.push(Arc::new(SlackNotifier::new(
            &global.slack_webhook_url,
            &global.slack_channel,
            &global.cluster_name,
        )?));
        tracing::debug!("slack notifier initialized successfully");
    }

    let cluster: Arc<dyn ClusterClient> = cluster;
    let supervisor = Supervisor::new(entries, cluster, notifiers, global);
    supervisor.run(shutdown).await;

    tracing::info!("received shutdown, shutting down");
    Ok(())
}

/// Register INT/TERM/QUIT handlers and return the root cancellation
/// token they trigger
fn spawn_signal_listener() -> anyhow::Result<tokio_util::sync::CancellationToken> {
    use tokio::signal::unix::{signal, SignalKind};

    let shutdown = tokio_util::sync::CancellationToken::new();

    let mut interrupt = signal(SignalKind::interrupt()).context("failed to register SIGINT")?;
    let mut terminate = signal(SignalKind::terminate()).context("failed to register SIGTERM")?;
    let mut quit = signal(SignalKind::quit()).context("failed to register SIGQUIT")?;

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
            _ = quit.recv() => {}
        }
        tracing::info!("received shutdown signal");
        trigger.cancel();
    });

    Ok(shutdown)
}
