use std::time::Duration;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use shapescan::{ConfigError, ErrorKind, ScanError};

/// Failure body returned to clients: `{ "detail": ..., "kind": ... }`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBody {
    pub detail: String,
    pub kind: &'static str,
}

/// A failed request: status code plus the JSON body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, detail: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                detail: detail.into(),
                kind,
            },
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorKind::InvalidImage.code(),
            detail,
        )
    }

    pub fn too_large(limit: usize) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::InvalidImage.code(),
            format!("upload exceeds the {limit} byte limit"),
        )
    }

    pub fn timeout(elapsed: Duration) -> Self {
        Self::new(
            StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Timeout.code(),
            format!("processing did not finish within {elapsed:?}"),
        )
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Internal.code(),
            detail,
        )
    }

    pub(crate) fn from_multipart(err: MultipartError, limit: usize) -> Self {
        match err.status() {
            StatusCode::PAYLOAD_TOO_LARGE => Self::too_large(limit),
            status => Self::new(status, ErrorKind::InvalidImage.code(), err.body_text()),
        }
    }

    pub(crate) fn from_rejection(err: MultipartRejection) -> Self {
        Self::new(err.status(), ErrorKind::InvalidImage.code(), err.body_text())
    }
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            k if k.is_user_correctable() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, kind.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Startup failures of the server binary.
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("scan config: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid CORS origin {0:?}")]
    InvalidOrigin(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapescan::segment::NoObjectReason;
    use shapescan::Stage;

    #[test]
    fn scan_errors_map_to_status_codes() {
        let user = ApiError::from(ScanError::MarkerDetectionFailed { found: 2 });
        assert_eq!(user.status, StatusCode::BAD_REQUEST);
        assert_eq!(user.body.kind, "marker_detection_failed");
        assert!(user.body.detail.contains("2 of 4"));

        let reason = NoObjectReason::NoRegion { candidates: 0 };
        let empty = ApiError::from(ScanError::NoObjectDetected(reason));
        assert_eq!(empty.status, StatusCode::BAD_REQUEST);

        let slow = ApiError::from(ScanError::Timeout {
            stage: Stage::Segment,
            elapsed: Duration::from_secs(61),
        });
        assert_eq!(slow.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(slow.body.kind, "timeout");

        let scale = ApiError::from(ScanError::ImplausibleScale("ratio".into()));
        assert_eq!(scale.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(scale.body.kind, "implausible_scale");
    }
}
