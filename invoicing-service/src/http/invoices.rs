//! Invoice document endpoints.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;

use crate::http::{tenant_id, AppState};
use crate::models::{
    CreateDocument, Invoice, InvoiceFilter, InvoiceLine, InvoiceSort, InvoiceStatus, InvoiceType,
    LineDraft, PaymentInput, SortDir, Transition, UpdateLine,
};

/// A document with its lines, as rendered on the detail screen.
#[derive(Debug, Serialize)]
pub struct DocumentView {
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLine>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    pub q: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub invoice_type: Option<String>,
    pub sort: Option<String>,
    pub dir: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ListParams {
    fn into_filter(self) -> InvoiceFilter {
        InvoiceFilter {
            search: self.q.filter(|q| !q.trim().is_empty()),
            status: self
                .status
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(InvoiceStatus::from_string),
            invoice_type: self
                .invoice_type
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(InvoiceType::from_string),
            sort: self
                .sort
                .as_deref()
                .map(InvoiceSort::from_key)
                .unwrap_or_default(),
            dir: self
                .dir
                .as_deref()
                .map(SortDir::from_key)
                .unwrap_or_default(),
            page: self.page.unwrap_or(1),
            per_page: self.per_page.unwrap_or(10),
        }
    }
}

/// Map a lifecycle transition onto the wire shape the screens expect.
fn transition_response(transition: Transition, rejected_reason: &str) -> Response {
    match transition {
        Transition::Applied(invoice) => {
            Json(json!({ "ok": true, "number": invoice.number, "status": invoice.status }))
                .into_response()
        }
        Transition::Rejected => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": rejected_reason })),
        )
            .into_response(),
        Transition::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "ok": false, "error": "Document not found" })),
        )
            .into_response(),
    }
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let page = state
        .invoices
        .list_documents(tenant, &params.into_filter())
        .await?;
    Ok(Json(page))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreateDocument>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let invoice = state.invoices.create_document(tenant, input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let (invoice, lines) = state
        .invoices
        .get_document(tenant, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document not found")))?;
    Ok(Json(DocumentView { invoice, lines }))
}

pub async fn issue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(invoice_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let tenant = tenant_id(&headers)?;
    let transition = state.invoices.issue_document(tenant, invoice_id).await?;
    Ok(transition_response(
        transition,
        "Only draft documents can be issued",
    ))
}

pub async fn cancel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(invoice_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let tenant = tenant_id(&headers)?;
    let transition = state.invoices.cancel_document(tenant, invoice_id).await?;
    Ok(transition_response(transition, "Cannot cancel this document"))
}

pub async fn pay(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(invoice_id): Path<Uuid>,
    payment: Option<Json<PaymentInput>>,
) -> Result<Response, AppError> {
    let tenant = tenant_id(&headers)?;
    let payment = payment.map(|Json(p)| p).unwrap_or_default();
    let transition = state
        .invoices
        .pay_document(tenant, invoice_id, payment)
        .await?;
    Ok(transition_response(
        transition,
        "Only issued documents can be marked paid",
    ))
}

pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(invoice_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let tenant = tenant_id(&headers)?;
    let transition = state.invoices.delete_document(tenant, invoice_id).await?;
    Ok(transition_response(
        transition,
        "Only draft documents can be deleted",
    ))
}

pub async fn add_line(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(invoice_id): Path<Uuid>,
    Json(draft): Json<LineDraft>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let line = state
        .invoices
        .add_line(tenant, invoice_id, draft)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document not found")))?;
    Ok((StatusCode::CREATED, Json(line)))
}

pub async fn update_line(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((invoice_id, line_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateLine>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let line = state
        .invoices
        .update_line(tenant, invoice_id, line_id, input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Line not found")))?;
    Ok(Json(line))
}

pub async fn remove_line(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((invoice_id, line_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let removed = state
        .invoices
        .remove_line(tenant, invoice_id, line_id)
        .await?;
    if !removed {
        return Err(AppError::NotFound(anyhow::anyhow!("Line not found")));
    }
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// Condensed hit for the rectifying-document picker.
#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub invoice_id: Uuid,
    pub number: Option<String>,
    pub customer_name: String,
    pub total: Decimal,
    pub issue_date: NaiveDate,
    pub status: String,
}

pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = tenant_id(&headers)?;
    let hits = state
        .invoices
        .search_documents(tenant, params.q.as_deref().unwrap_or(""))
        .await?;
    let results: Vec<SearchHit> = hits
        .into_iter()
        .map(|i| SearchHit {
            invoice_id: i.invoice_id,
            number: i.number,
            customer_name: i.customer_name,
            total: i.total,
            issue_date: i.issue_date,
            status: i.status,
        })
        .collect();
    Ok(Json(json!({ "results": results })))
}
