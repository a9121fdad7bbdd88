use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::telemetry::StatsError;

/// Errors surfaced to HTTP callers as `{"detail": "..."}`.
///
/// Upstream messages are forwarded verbatim, which helps debugging but can
/// leak details of the hosted service to clients.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Supabase not configured")]
    Unconfigured,

    #[error("{source}")]
    Upstream {
        status: StatusCode,
        source: StoreError,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("No {0} data available")]
    NoData(&'static str),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Rejected(String),
}

impl ApiError {
    pub fn upstream(status: StatusCode, source: StoreError) -> Self {
        ApiError::Upstream { status, source }
    }

    /// Upstream failure on a data route.
    pub fn data(source: StoreError) -> Self {
        Self::upstream(StatusCode::INTERNAL_SERVER_ERROR, source)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unconfigured | ApiError::NoData(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream { status, .. } => *status,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) | ApiError::Rejected(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<StatsError> for ApiError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StatsError::NoData(field) => ApiError::NoData(field),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::debug!("{} {}", status.as_u16(), self);
        }

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
