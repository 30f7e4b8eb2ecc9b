//! Axum server setup and startup

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use shapescan::ScanConfig;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::{ServerConfig, ServerSettings};
use crate::error::ServerError;
use crate::routes::{create_router, AppState};

/// CORS policy for the configured origins; an empty list allows any origin.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, ServerError> {
    let allow = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let values = origins
            .iter()
            .map(|o| HeaderValue::from_str(o).map_err(|_| ServerError::InvalidOrigin(o.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(values)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any))
}

/// Router with state and CORS applied, ready to serve.
pub fn build_app(settings: ServerSettings, config: ScanConfig) -> Result<Router, ServerError> {
    let cors = cors_layer(&settings.allowed_origins)?;
    std::fs::create_dir_all(&settings.output_dir)?;
    let state = Arc::new(AppState::new(settings, config)?);
    Ok(create_router(state).layer(cors))
}

/// Run the API server until Ctrl-C.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let scan_config = match &config.scan_config {
        Some(path) => ScanConfig::load_json(path)?,
        None => ScanConfig::default(),
    };
    let settings = config.settings();
    log::info!(
        "serving outputs from {} with {} workers, {:?} scan timeout",
        settings.output_dir.display(),
        settings.workers,
        settings.scan_timeout
    );
    let app = build_app(settings, scan_config)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    log::info!("API server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("API server shutting down gracefully");
        })
        .await?;
    Ok(())
}
