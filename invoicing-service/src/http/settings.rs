//! Per-tenant settings endpoints.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use service_core::error::AppError;
use validator::Validate;

use crate::http::{tenant_id, AppState};
use crate::models::{SettingsForm, SettingsUpdate};

pub async fn fetch(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let settings = state.store.get_or_create_settings(tenant).await?;
    Ok(Json(settings))
}

pub async fn save(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(form): Json<SettingsForm>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    form.validate()?;
    let settings = state.store.save_settings(tenant, &form).await?;
    Ok(Json(settings))
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<SettingsUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    if let SettingsUpdate::DefaultSeriesPrefix(prefix) = &update {
        if prefix.is_empty() || prefix.len() > 10 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Series prefix must be 1-10 characters"
            )));
        }
    }
    let settings = state.store.apply_settings_update(tenant, &update).await?;
    Ok(Json(settings))
}

pub async fn reset(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let settings = state.store.reset_settings(tenant).await?;
    Ok(Json(settings))
}
