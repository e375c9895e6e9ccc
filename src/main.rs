//! Exporter Binary Entry Point
//!
//! This binary runs the GitHub billing exporter.
//! Core functionality is provided by the `billing_exporter` library crate.

use std::sync::Arc;

use billing_exporter::{
    collector::{BillingCollector, BillingContext, CollectorRegistry, register_builtin},
    config::{AppConfig, cli},
    server::{AppState, create_router},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,billing_exporter=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("GitHub Billing Exporter");

    // Collectors must be registered before parsing: each one adds CLI toggles
    let mut registry = CollectorRegistry::new();
    register_builtin(&mut registry)?;

    // Parse CLI arguments
    let (cli, cli_overrides) = match cli::parse_from(&registry, std::env::args_os()) {
        Ok(parsed) => parsed,
        Err(e) => e.exit(),
    };

    // Load configuration (CLI > ENV > config file > defaults)
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };
    cli.apply(&mut config);
    config.collectors.extend(cli_overrides);
    config.validate()?;

    registry.apply_overrides(&config.collectors)?;
    for (name, state) in registry.enablement() {
        tracing::debug!(
            collector = %name,
            enabled = state.enabled,
            default_enabled = state.default_enabled,
            overridden = state.overridden,
            "Collector enablement"
        );
    }

    tracing::info!(
        "GitHub API: {}, organizations: {:?}",
        config.github.api_url,
        config.github.orgs,
    );

    // Build the active collector set; constructor failures abort startup
    let context = BillingContext::new(&config.github_settings())?;
    let collector = BillingCollector::build(&registry, &context, &tracing::Span::current())?;
    for desc in collector.describe() {
        tracing::debug!(metric = %desc.fq_name, help = %desc.help, "Describing metric");
    }

    let app = create_router(AppState {
        collector: Arc::new(collector),
        telemetry_path: config.server.telemetry_path.clone(),
    });

    let addr = config.listen_addr()?;
    tracing::info!(
        "Web server listening on: http://{}{}",
        addr,
        config.server.telemetry_path
    );
    tracing::info!("Press Ctrl+C to shutdown");

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
