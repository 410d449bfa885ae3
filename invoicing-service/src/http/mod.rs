//! JSON HTTP API for invoicing-service.
//!
//! Thin command layer over the stores and the document workflow service.
//! Tenancy comes from the `x-tenant-id` header on every request; handlers
//! never touch a row outside that tenant.

pub mod dashboard;
pub mod invoices;
pub mod series;
pub mod settings;

use std::sync::Arc;

use anyhow::anyhow;
use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::Router;
use service_core::error::AppError;
use uuid::Uuid;

use crate::services::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION};
use crate::services::InvoiceService;
use crate::store::InvoicingStore;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InvoicingStore>,
    pub invoices: Arc<InvoiceService>,
}

/// Tenant scope of the request, from the `x-tenant-id` header.
pub fn tenant_id(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let value = headers
        .get(TENANT_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::BadRequest(anyhow!("Missing {} header", TENANT_HEADER)))?;
    Uuid::parse_str(value)
        .map_err(|_| AppError::BadRequest(anyhow!("Invalid {} header", TENANT_HEADER)))
}

/// Request counter + duration histogram for the Prometheus endpoint.
pub async fn prometheus_middleware(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let timer = HTTP_REQUEST_DURATION
        .with_label_values(&[&method])
        .start_timer();

    let response = next.run(req).await;

    timer.observe_duration();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, response.status().as_str()])
        .inc();

    response
}

/// The API routes. Health/readiness/metrics are wired by startup.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard", get(dashboard::summary))
        .route("/api/invoices", get(invoices::list).post(invoices::create))
        .route("/api/invoices/search", get(invoices::search))
        .route(
            "/api/invoices/:id",
            get(invoices::detail).delete(invoices::remove),
        )
        .route("/api/invoices/:id/issue", post(invoices::issue))
        .route("/api/invoices/:id/cancel", post(invoices::cancel))
        .route("/api/invoices/:id/pay", post(invoices::pay))
        .route("/api/invoices/:id/lines", post(invoices::add_line))
        .route(
            "/api/invoices/:id/lines/:line_id",
            put(invoices::update_line).delete(invoices::remove_line),
        )
        .route("/api/series", get(series::list).post(series::create))
        .route("/api/series/:id", put(series::update).delete(series::remove))
        .route("/api/series/:id/default", post(series::set_default))
        .route("/api/series/:id/toggle", post(series::toggle))
        .route("/api/settings", get(settings::fetch).put(settings::save))
        .route("/api/settings/update", post(settings::update))
        .route("/api/settings/reset", post(settings::reset))
}
