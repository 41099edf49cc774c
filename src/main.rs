//! App service unit (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────┐
//!                  ▼
//!     ┌──────────────────────┐     ┌──────────────────────────────────────────┐
//!     │ net::ListenerSet     │────▶│ http::PipelineBuilder output              │
//!     │ plain + optional TLS │     │ compression → X-Frame-Options → CORS →    │
//!     └──────────────────────┘     │ access log → URL parse → cookies →        │
//!                ▲                 │ [profiler] → senders → connect errors →   │
//!                │                 │ application router                        │
//!     ┌──────────┴───────────┐     └──────────────────────────────────────────┘
//!     │ lifecycle::Service-  │
//!     │ Lifecycle            │────▶ apps::ManagedApps (start before bind,
//!     └──────────────────────┘                         stop after close)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use app_service::apps::{ManagedApps, NoManagedApps, ProcessManager};
use app_service::config::load_config;
use app_service::http::routes::status_router;
use app_service::lifecycle::{shutdown_signal, LogHooks, ServiceUnit};
use app_service::observability;

#[derive(Parser)]
#[command(name = "app-service")]
#[command(about = "Webida app service unit", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "app-service.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Arc::new(load_config(&cli.config)?);

    observability::init_logging(&config.logging)?;
    tracing::info!(
        config = %cli.config.display(),
        unit = %config.unit.name,
        svc_type = %config.unit.svc_type,
        "app-service v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if let Some(address) = &config.profiler.metrics_address {
        let addr: SocketAddr = address.parse()?;
        observability::metrics::init_metrics(addr)?;
    }

    let apps: Arc<dyn ManagedApps> = if config.apps.processes.is_empty() {
        Arc::new(NoManagedApps)
    } else {
        Arc::new(ProcessManager::new(config.apps.processes.clone()))
    };

    let mut unit = ServiceUnit::new(Arc::clone(&config), apps, status_router(Arc::clone(&config)))
        .with_hooks(Arc::new(LogHooks));

    unit.start().await?;
    shutdown_signal().await?;
    unit.stop().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
