//! Error responses shared by the REST and WebSocket surfaces

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use depgraph_core::ManifestError;
use depgraph_discovery::DiscoveryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root package is not on the registry
pub const NOT_FOUND: i32 = 404;
/// Malformed request input
pub const BAD_REQUEST: i32 = 400;
/// Uploaded manifest could not be used
pub const FILE_READ_ERROR: i32 = -1;

const CANCELLED: i32 = 503;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl ApiError {
    /// Client-facing error code
    pub fn code(&self) -> i32 {
        match self {
            ApiError::Discovery(DiscoveryError::NotFound(_)) => NOT_FOUND,
            ApiError::Discovery(DiscoveryError::InvalidName(_)) => BAD_REQUEST,
            ApiError::Discovery(DiscoveryError::Cancelled) => CANCELLED,
            ApiError::Manifest(_) => FILE_READ_ERROR,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Discovery(DiscoveryError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Discovery(DiscoveryError::InvalidName(_)) | ApiError::Manifest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Discovery(DiscoveryError::Cancelled) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
