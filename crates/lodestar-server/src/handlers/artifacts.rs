//! Artifact handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use lodestar_core::{Artifact, ArtifactCount, AuthorOptions, CountOptions, ListOptions};
use serde::Deserialize;

use crate::error::ApiError;
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    Query(options): Query<ListOptions>,
) -> Result<Json<Vec<Artifact>>, ApiError> {
    let artifacts = state.engine.list_artifacts(&options).await?;
    Ok(Json(artifacts))
}

pub async fn count(
    State(state): State<AppState>,
    Query(options): Query<CountOptions>,
) -> Result<Json<ArtifactCount>, ApiError> {
    let count = state.engine.count_artifacts(&options).await?;
    Ok(Json(count))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessQuery {
    author_email: Option<String>,
    author_name: Option<String>,
    /// Reconcile exactly this engagement, even when the body is empty
    engagement_uuid: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn process(
    State(state): State<AppState>,
    Query(query): Query<ProcessQuery>,
    Json(artifacts): Json<Vec<Artifact>>,
) -> Result<StatusCode, ApiError> {
    tracing::debug!(artifacts = artifacts.len(), "Artifacts submitted");
    let author = AuthorOptions {
        author_email: non_blank(query.author_email),
        author_name: non_blank(query.author_name),
    };

    let report = match non_blank(query.engagement_uuid) {
        Some(engagement_uuid) => {
            state
                .engine
                .process_engagement(&engagement_uuid, artifacts, &author)
                .await?
        }
        None => state.engine.process_artifacts(artifacts, &author).await?,
    };

    match ApiError::from_report(&report) {
        Some(error) => Err(error),
        None => Ok(StatusCode::OK),
    }
}
