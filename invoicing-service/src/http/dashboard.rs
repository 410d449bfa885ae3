//! Dashboard endpoint.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use service_core::error::AppError;

use crate::http::{tenant_id, AppState};

pub async fn summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let summary = state.invoices.dashboard(tenant).await?;
    Ok(Json(summary))
}
