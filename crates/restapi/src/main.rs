mod adapters;
mod cli;
mod config;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use restapi_catalog::{fetch_catalog, Catalog, RouteTable};
use restapi_client::HttpTransport;
use restapi_common::CommandTransport;
use restapi_dispatch::Dispatcher;

use cli::Cli;
use config::Config;

/// Maximum time to wait for orderly shutdown before forcing exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(20);

/// Brief pause after cancellation to let in-flight requests complete.
const SHUTDOWN_DRAIN: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli)?;

    let level = match cli.verbose {
        0 => config.log_level,
        1 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    // Hold the non-blocking guards for the lifetime of main so logs flush on exit.
    let _log_guards = init_logging(env_filter, config.log_file.as_deref())?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async_main(config))
}

async fn async_main(config: Config) -> anyhow::Result<()> {
    startup_diagnostics(&config);

    let transport: Arc<dyn CommandTransport> = Arc::new(HttpTransport::new(&config.backends));
    let catalog = match load_catalog(transport.clone(), config.timeout).await {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!(
                error = %e,
                conf = ?config.conf_path,
                name = %config.name,
                backends = ?config.backends,
                "Can't build the command catalog"
            );
            return Err(e);
        }
    };

    let table = RouteTable::build(config.base_url.clone(), &catalog);
    tracing::info!(
        "{} commands on {} routes under {}",
        catalog.len(),
        table.route_count(),
        if table.base().is_root() { "/" } else { table.base().as_str() }
    );
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(table), transport, config.timeout));

    let listener = match adapters::http::bind(&config.public_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.public_addr, "Can't bind HTTP listener");
            return Err(e);
        }
    };

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = adapters::http::serve(listener, dispatcher, token).await {
            tracing::error!(error = %e, "HTTP adapter failed");
        }
    });

    tracing::info!("Ready.");

    shutdown_signal().await;
    tracing::info!("Shutting down...");

    let shutdown = async {
        cancel.cancel();
        tokio::time::sleep(SHUTDOWN_DRAIN).await;
        let _ = server.await;
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, shutdown)
        .await
        .is_err()
    {
        tracing::warn!("Shutdown timed out after {:?}, forcing exit", SHUTDOWN_TIMEOUT);
    }

    Ok(())
}

/// Fetch every backend role's descriptors. Runs on a blocking thread
/// since the transport is synchronous.
async fn load_catalog(
    transport: Arc<dyn CommandTransport>,
    timeout: Duration,
) -> anyhow::Result<Catalog> {
    let catalog =
        tokio::task::spawn_blocking(move || fetch_catalog(transport.as_ref(), timeout)).await??;
    Ok(catalog)
}

/// Wait for Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

fn startup_diagnostics(config: &Config) {
    tracing::info!("restapi v{} starting", env!("CARGO_PKG_VERSION"));
    match &config.conf_path {
        Some(path) => tracing::info!("Configuration: {}", path.display()),
        None => tracing::warn!("No configuration file found, using defaults"),
    }
    tracing::info!("Client name: {}", config.name);
    if config.backends.is_empty() {
        tracing::warn!("No backend endpoints configured");
    } else {
        tracing::info!("Backends: {}", config.backends.join(", "));
    }
    tracing::debug!("Backend call timeout: {:?}", config.timeout);
}

// ── Logging setup ───────────────────────────────────────────────────

/// Initialize tracing with stderr + optional file output.
/// Returns guards that must be held for the lifetime of the program
/// to ensure the non-blocking writers flush on shutdown.
fn init_logging(
    env_filter: tracing_subscriber::EnvFilter,
    log_file: Option<&std::path::Path>,
) -> anyhow::Result<Vec<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::prelude::*;

    let (nb_stderr, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(nb_stderr);

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let (nb_file, file_guard) = tracing_appender::non_blocking(file);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(nb_file);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();

        Ok(vec![stderr_guard, file_guard])
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();

        Ok(vec![stderr_guard])
    }
}
