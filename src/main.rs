// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use climate_charts::application::batch_service::BatchService;
use climate_charts::application::chart_service::ChartService;
use climate_charts::application::pipeline::ChartPipeline;
use climate_charts::infrastructure::config::{load_server_config, load_sources_config};
use climate_charts::infrastructure::http_source::HttpBatchSource;
use climate_charts::infrastructure::json_rows::JsonRowRepository;
use climate_charts::presentation::app_state::AppState;
use climate_charts::presentation::handlers::{get_batch, get_charts, get_progress, health_check};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let server_config = load_server_config()?;
    let sources_config = load_sources_config()?;
    tracing::info!("Loaded {} sources", sources_config.sources.len());

    // Create collaborators (infrastructure layer)
    let batch_source = Arc::new(HttpBatchSource::new(reqwest::Client::new()));

    // Create services (application layer)
    let pipeline = ChartPipeline::new(batch_source, sources_config.sources);
    let chart_service = ChartService::new(pipeline, server_config.range_format.clone());
    let batch_service = match (&server_config.rows_path, &server_config.classifier) {
        (Some(path), Some(classifier)) => Some(BatchService::new(
            Arc::new(JsonRowRepository::new(path)),
            classifier.clone(),
        )),
        (Some(_), None) => {
            tracing::warn!("rows_path is set but no classifier is configured; /api disabled");
            None
        }
        _ => None,
    };

    // Create application state
    let state = Arc::new(AppState {
        chart_service,
        batch_service,
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/api", get(get_batch))
        .route("/charts", get(get_charts))
        .route("/progress", get(get_progress))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = server_config
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", server_config.bind))?;
    tracing::info!("Starting climate-charts service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
