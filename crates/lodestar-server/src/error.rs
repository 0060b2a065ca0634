//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lodestar_core::{LodestarError, ReconcileReport};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementFailure {
    pub engagement_uuid: String,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "<[EngagementFailure]>::is_empty")]
    failures: &'a [EngagementFailure],
}

/// Error returned by handlers
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub failures: Vec<EngagementFailure>,
}

pub fn status_for(error: &LodestarError) -> StatusCode {
    match error {
        LodestarError::Validation(_) => StatusCode::BAD_REQUEST,
        LodestarError::ProjectNotFound(_) | LodestarError::AmbiguousProject { .. } => {
            StatusCode::NOT_FOUND
        }
        LodestarError::UuidConflict { .. } => StatusCode::CONFLICT,
        LodestarError::Transport(_)
        | LodestarError::Status { .. }
        | LodestarError::RefreshAborted(_) => StatusCode::BAD_GATEWAY,
        LodestarError::MalformedContent { .. }
        | LodestarError::Storage(_)
        | LodestarError::Serialization(_)
        | LodestarError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<LodestarError> for ApiError {
    fn from(error: LodestarError) -> Self {
        Self {
            status: status_for(&error),
            code: error.code(),
            message: error.to_string(),
            failures: Vec::new(),
        }
    }
}

impl ApiError {
    /// Error for a partially failed reconcile; the status follows the first
    /// failure and the body lists every failed engagement.
    pub fn from_report(report: &ReconcileReport) -> Option<Self> {
        let failures: Vec<EngagementFailure> = report
            .failures()
            .map(|(engagement_uuid, error)| EngagementFailure {
                engagement_uuid: engagement_uuid.to_string(),
                code: error.code(),
                message: error.to_string(),
            })
            .collect();

        let (_, first) = report.failures().next()?;
        Some(Self {
            status: status_for(first),
            code: first.code(),
            message: format!(
                "{} of {} engagement(s) failed",
                failures.len(),
                report.outcomes.len()
            ),
            failures,
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, "{}", self.message);
        }
        let body = Json(ErrorBody {
            error: self.code,
            message: &self.message,
            failures: &self.failures,
        });
        (self.status, body).into_response()
    }
}
