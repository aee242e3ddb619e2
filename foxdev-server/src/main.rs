//! foxdev server
//!
//! Local daemon that starts one dev server per scaffolded project, detects the
//! URL it announces, and serves start/stop/status over HTTP for the preview
//! pane.

mod api;
mod config;
mod defaults;
mod launcher;
mod lifecycle;
mod process;
mod projects;
mod registry;
mod sniff;

use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::lifecycle::LifecycleController;
use crate::process::OsProcessControl;
use crate::registry::DevServerRegistry;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.dev_server_config();

    tracing::info!("foxdev server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Projects directory: {}", config.projects_dir.display());
    match &config.install_command {
        Some(command) => tracing::info!("Install command: {}", command),
        None => tracing::info!("Dependency install disabled"),
    }
    tracing::info!("Run command: {}", config.run_command);
    if !config.projects_dir.is_dir() {
        tracing::warn!(
            "Projects directory {} does not exist yet",
            config.projects_dir.display()
        );
    }

    let controller = Arc::new(LifecycleController::new(
        config,
        Arc::new(DevServerRegistry::new()),
        Arc::new(OsProcessControl),
    ));

    let listener = TcpListener::bind(args.listen).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, api::router(controller.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if args.stop_on_exit {
        let stopped = controller.stop_all();
        tracing::info!(stopped, "Stopped running dev servers");
    } else {
        let running = controller.list().len();
        if running > 0 {
            tracing::info!(running, "Leaving dev servers running");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Received shutdown signal");
}
