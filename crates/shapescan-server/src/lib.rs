//! HTTP front end of the shapescan pipeline.
//!
//! Routes:
//! - `GET /health`: liveness probe, `{"status":"ok","service":"shapescan"}`.
//! - `GET /`: service banner.
//! - `POST /upload`: multipart field `file` holding a JPEG or PNG photo.
//!   Answers `{status, request_id, scale, contours_count, svg_url, dxf_url}`
//!   or `{detail, kind}` with 400, 413, 504 or 500.
//! - `GET /output/<id>/output.{svg,dxf}`: the produced documents.

mod config;
mod error;
mod routes;
mod server;

pub use config::{parse_origins, ServerConfig, ServerSettings};
pub use error::{ApiError, ErrorBody, ServerError};
pub use routes::{
    create_router, AppState, AppStateHandle, HealthResponse, UploadResponse, FILE_FIELD,
};
pub use server::{build_app, cors_layer, run_server};
