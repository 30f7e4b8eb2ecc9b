//! HTTP route definitions and handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use shapescan::{
    output_file_name, write_outputs, ConfigError, ScanConfig, ScanContext, ScanError,
    ScanPipeline, Stage, VectorFormat,
};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::config::ServerSettings;
use crate::error::ApiError;

/// Multipart field carrying the photo.
pub const FILE_FIELD: &str = "file";

/// Extra time granted to a worker past the scan deadline before the request
/// is answered with a timeout anyway.
const DEADLINE_GRACE: Duration = Duration::from_secs(2);

/// Headroom over the image size limit for multipart framing.
const MULTIPART_SLACK: usize = 64 * 1024;

/// State shared by every handler.
pub struct AppState {
    pub pipeline: ScanPipeline,
    pub settings: ServerSettings,
    workers: Arc<Semaphore>,
}

/// Thread-safe handle to the application state.
pub type AppStateHandle = Arc<AppState>;

impl AppState {
    pub fn new(settings: ServerSettings, config: ScanConfig) -> Result<Self, ConfigError> {
        let pipeline = ScanPipeline::new(config)?;
        let workers = Arc::new(Semaphore::new(settings.workers.max(1)));
        Ok(Self {
            pipeline,
            settings,
            workers,
        })
    }

    fn upload_limit(&self) -> usize {
        self.pipeline.config().load.max_upload_bytes
    }
}

/// Create the API router with all routes.
pub fn create_router(state: AppStateHandle) -> Router {
    let body_limit = state.upload_limit() + MULTIPART_SLACK;
    let outputs = ServeDir::new(&state.settings.output_dir);
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .nest_service("/output", outputs)
        .with_state(state)
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

/// GET /health - liveness probe; never touches the pipeline
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "shapescan",
    })
}

/// GET / - service banner
async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "shapescan",
        "version": env!("CARGO_PKG_VERSION"),
        "message": "Shapescan API is running. Check /health for status.",
    }))
}

// ============================================================================
// Upload
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub request_id: String,
    /// Density of the rectified canvas, px/mm.
    pub scale: f64,
    pub contours_count: usize,
    pub svg_url: String,
    pub dxf_url: String,
}

/// POST /upload - scan the multipart `file` field
async fn upload(
    State(state): State<AppStateHandle>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let mut multipart = multipart.map_err(ApiError::from_rejection)?;
    let bytes = read_file_field(&mut multipart, state.upload_limit()).await?;
    tracing::info!(%request_id, bytes = bytes.len(), "upload received");

    let dir = state.settings.output_dir.join(&request_id);
    match scan(&state, &request_id, bytes, &dir).await {
        Ok(response) => {
            tracing::info!(
                %request_id,
                contours = response.contours_count,
                "scan finished"
            );
            Ok(Json(response))
        }
        Err(err) => {
            if err.status.is_server_error() {
                tracing::error!(%request_id, kind = err.body.kind, "{}", err.body.detail);
            } else {
                tracing::warn!(%request_id, kind = err.body.kind, "{}", err.body.detail);
            }
            remove_request_dir(&dir).await;
            Err(err)
        }
    }
}

async fn read_file_field(multipart: &mut Multipart, limit: usize) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from_multipart(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::from_multipart(e, limit))?;
        if bytes.len() > limit {
            return Err(ApiError::too_large(limit));
        }
        return Ok(bytes.to_vec());
    }
    Err(ApiError::bad_request(format!(
        "missing multipart field `{FILE_FIELD}`"
    )))
}

async fn scan(
    state: &AppStateHandle,
    request_id: &str,
    bytes: Vec<u8>,
    dir: &Path,
) -> Result<UploadResponse, ApiError> {
    let permit = state
        .workers
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| ApiError::internal(format!("worker pool closed: {e}")))?;

    let limit = state.settings.scan_timeout;
    let ctx = ScanContext::new(request_id).with_timeout(limit);
    let worker_state = Arc::clone(state);
    let worker_dir = dir.to_path_buf();
    let started = Instant::now();
    let mut job = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let output = worker_state.pipeline.run(&bytes, &ctx)?;
        ctx.check(Stage::Export)?;
        write_outputs(&output, &worker_dir)?;
        Ok::<_, ScanError>(output)
    });

    let output = match tokio::time::timeout(limit + DEADLINE_GRACE, &mut job).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join)) => return Err(ApiError::internal(format!("scan worker failed: {join}"))),
        Err(_) => {
            // the worker cannot be cancelled; clean up once it lets go
            tokio::spawn(reap_late_worker(job, dir.to_path_buf()));
            return Err(ApiError::timeout(started.elapsed()));
        }
    };

    let settings = &state.settings;
    Ok(UploadResponse {
        status: "success",
        request_id: request_id.to_string(),
        scale: output.px_per_mm(),
        contours_count: output.contours_count(),
        svg_url: settings.asset_url(request_id, &output_file_name(VectorFormat::Svg)),
        dxf_url: settings.asset_url(request_id, &output_file_name(VectorFormat::Dxf)),
    })
}

/// Wait for a worker whose request already timed out, then drop its outputs.
async fn reap_late_worker<T>(job: JoinHandle<Result<T, ScanError>>, dir: PathBuf) {
    match job.await {
        Ok(Ok(_)) => tracing::debug!(dir = %dir.display(), "late scan finished"),
        Ok(Err(e)) => tracing::debug!(dir = %dir.display(), "late scan failed: {e}"),
        Err(e) => tracing::warn!(dir = %dir.display(), "scan worker failed after timeout: {e}"),
    }
    remove_request_dir(&dir).await;
}

async fn remove_request_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => tracing::debug!(dir = %dir.display(), "removed request directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(dir = %dir.display(), "cannot remove request directory: {e}"),
    }
}
