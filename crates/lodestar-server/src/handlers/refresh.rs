//! Bulk refresh trigger

use axum::{extract::State, Json};
use lodestar_core::RefreshReport;

use crate::error::ApiError;
use crate::AppState;

pub async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshReport>, ApiError> {
    tracing::info!("Refresh requested");
    let report = state.engine.refresh().await?;
    Ok(Json(report))
}
