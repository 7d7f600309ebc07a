//! Serve command implementation

use crate::cli::ServeArgs;
use crate::config::{CorrelogConfig, LogFormat, LoggingConfig};
use crate::logger::Logger;
use crate::middleware::RequestLoggerLayer;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(args: &ServeArgs) -> anyhow::Result<CorrelogConfig> {
    let mut config = if args.config.exists() {
        CorrelogConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        CorrelogConfig::default()
    };

    config = config.with_env_overrides();

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if let Some(kind) = args.exporter {
        config.exporter.kind = kind;
    }
    if args.no_color {
        config.exporter.no_color = true;
    }

    Ok(config)
}

/// Initialize tracing based on configuration
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter_str = crate::logging::build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    // Diagnostics go to stderr; stdout belongs to the stream and cloud exporters.
    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct WorkParams {
    #[serde(default = "default_items")]
    items: u32,
}

fn default_items() -> u32 {
    3
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn demo_work(log: Logger, Query(params): Query<WorkParams>) -> Json<Value> {
    log.add_request_attribute("demo.items", params.items);
    log.infof(format_args!("processing {} items", params.items));

    for item in 0..params.items {
        let scoped = log.with_attribute("item", item).logger();
        scoped.debug("item processed");
    }
    if params.items > 10 {
        log.warn("large batch");
    }

    Json(json!({ "processed": params.items }))
}

async fn demo_fail(log: Logger) -> (StatusCode, Json<Value>) {
    log.with_attribute("dependency", "inventory")
        .logger()
        .warn("upstream unavailable");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "inventory unavailable" })),
    )
}

/// Demo router wrapped in the request logger.
pub fn build_router(config: &CorrelogConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/demo/work", get(demo_work))
        .route("/demo/fail", get(demo_fail))
        .layer(RequestBodyLimitLayer::new(config.server.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_seconds,
        )))
        .layer(RequestLoggerLayer::from_config(&config.exporter))
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for CTRL+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
        _ = cancel_token.cancelled() => {}
    }

    cancel_token.cancel();
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    init_tracing(&config.logging)?;

    tracing::info!(exporter = ?config.exporter.kind, "Starting correlog demo server");
    tracing::debug!(?config, "Loaded configuration");

    let app = build_router(&config);
    let cancel_token = CancellationToken::new();

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "correlog demo server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
    .await?;

    tracing::info!("correlog demo server stopped");
    Ok(())
}
