//! Numbering series endpoints.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::http::{tenant_id, AppState};
use crate::models::{CreateSeries, UpdateSeries};

#[derive(Debug, Deserialize)]
pub struct SeriesForm {
    pub prefix: String,
    pub name: String,
    pub description: Option<String>,
    pub number_digits: Option<i32>,
    pub is_active: Option<bool>,
    pub is_default: Option<bool>,
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let series = state.store.list_series(tenant).await?;
    Ok(Json(series))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(form): Json<SeriesForm>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let input = CreateSeries {
        tenant_id: tenant,
        prefix: form.prefix,
        name: form.name,
        description: form.description,
        number_digits: form.number_digits.unwrap_or(6),
        is_active: form.is_active.unwrap_or(true),
        is_default: form.is_default.unwrap_or(false),
    };
    input.validate()?;
    let series = state.store.create_series(&input).await?;
    Ok((StatusCode::CREATED, Json(series)))
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(series_id): Path<Uuid>,
    Json(input): Json<UpdateSeries>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    input.validate()?;
    let series = state
        .store
        .update_series(tenant, series_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Series not found")))?;
    Ok(Json(series))
}

pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(series_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let deleted = state.store.delete_series(tenant, series_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Series not found")));
    }
    Ok(Json(json!({ "ok": true })))
}

pub async fn set_default(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(series_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let series = state
        .store
        .set_default_series(tenant, series_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Series not found")))?;
    Ok(Json(series))
}

pub async fn toggle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(series_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let series = state
        .store
        .toggle_series(tenant, series_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Series not found")))?;
    Ok(Json(series))
}
