//! Invoice document model for invoicing-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::LineDraft;

/// Invoice type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    Standard,
    Simplified,
    Rectifying,
}

impl InvoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::Standard => "standard",
            InvoiceType::Simplified => "simplified",
            InvoiceType::Rectifying => "rectifying",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "simplified" => InvoiceType::Simplified,
            "rectifying" => InvoiceType::Rectifying,
            _ => InvoiceType::Standard,
        }
    }
}

/// Invoice lifecycle status.
///
/// draft -> issued -> paid, with cancellation allowed from draft and issued.
/// Paid and cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "issued" => InvoiceStatus::Issued,
            "paid" => InvoiceStatus::Paid,
            "cancelled" => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Draft,
        }
    }
}

/// Fiscal invoice document.
///
/// `number` stays NULL while the document is a draft and is immutable once
/// assigned. Customer fields are a snapshot taken at creation time and never
/// follow later edits of the source customer record. `subtotal`, `tax_amount`
/// and `total` are derived from the line set, never independent truth.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub tenant_id: Uuid,
    pub series_id: Uuid,
    pub number: Option<String>,
    pub invoice_type: String,
    pub status: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub customer_name: String,
    pub customer_tax_id: Option<String>,
    pub customer_address: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_id: Option<Uuid>,
    pub sale_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub payment_method: Option<String>,
    pub paid_amount: Decimal,
    pub paid_utc: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub rectified_invoice_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub deleted_utc: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn status_enum(&self) -> InvoiceStatus {
        InvoiceStatus::from_string(&self.status)
    }

    pub fn is_draft(&self) -> bool {
        self.status == InvoiceStatus::Draft.as_str()
    }
}

/// Customer data copied onto the document at creation time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CustomerSnapshot {
    #[validate(length(max = 255))]
    pub name: String,
    #[validate(length(max = 50))]
    pub tax_id: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 255))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
}

/// Command input for creating a draft document with its lines.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDocument {
    pub series_id: Uuid,
    #[serde(default = "default_invoice_type")]
    pub invoice_type: InvoiceType,
    pub due_date: Option<NaiveDate>,
    #[validate(nested)]
    pub customer: CustomerSnapshot,
    pub customer_id: Option<Uuid>,
    pub sale_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    /// Document tax rate; also the default for lines that do not set one.
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub rectified_invoice_id: Option<Uuid>,
    #[validate(nested)]
    pub lines: Vec<LineDraft>,
}

fn default_invoice_type() -> InvoiceType {
    InvoiceType::Standard
}

/// Fully resolved header row handed to the store. Totals are computed by the
/// caller before this exists.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub tenant_id: Uuid,
    pub series_id: Uuid,
    pub invoice_type: InvoiceType,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub customer: CustomerSnapshot,
    pub customer_id: Option<Uuid>,
    pub sale_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    pub tax_rate: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub rectified_invoice_id: Option<Uuid>,
}

/// Outcome of a lifecycle transition (issue, cancel, pay, delete).
///
/// `Rejected` is routine control flow, not an error: the document exists but
/// its current status does not admit the transition, and nothing was written.
#[derive(Debug, Clone)]
pub enum Transition {
    Applied(Invoice),
    Rejected,
    NotFound,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }

    pub fn applied(&self) -> Option<&Invoice> {
        match self {
            Transition::Applied(invoice) => Some(invoice),
            _ => None,
        }
    }
}

/// Payment details recorded when an issued document is marked paid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentInput {
    pub payment_method: Option<String>,
    /// Defaults to the document total when absent.
    pub amount: Option<Decimal>,
}

/// Sortable columns of the invoice listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvoiceSort {
    Number,
    IssueDate,
    Customer,
    Total,
    #[default]
    Created,
}

impl InvoiceSort {
    pub fn from_key(key: &str) -> Self {
        match key {
            "number" => InvoiceSort::Number,
            "date" => InvoiceSort::IssueDate,
            "customer" => InvoiceSort::Customer,
            "total" => InvoiceSort::Total,
            _ => InvoiceSort::Created,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub fn from_key(key: &str) -> Self {
        match key {
            "asc" => SortDir::Asc,
            _ => SortDir::Desc,
        }
    }
}

/// Filter/sort/pagination parameters for listing invoices.
#[derive(Debug, Clone)]
pub struct InvoiceFilter {
    /// Matches number, customer name or customer tax id (substring,
    /// case-insensitive).
    pub search: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub invoice_type: Option<InvoiceType>,
    pub sort: InvoiceSort,
    pub dir: SortDir,
    pub page: i64,
    pub per_page: i64,
}

impl Default for InvoiceFilter {
    fn default() -> Self {
        Self {
            search: None,
            status: None,
            invoice_type: None,
            sort: InvoiceSort::Created,
            dir: SortDir::Desc,
            page: 1,
            per_page: 10,
        }
    }
}

/// One page of the invoice listing.
#[derive(Debug, Clone, Serialize)]
pub struct InvoicePage {
    pub invoices: Vec<Invoice>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Aggregates for the dashboard screen.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    /// Issued + paid documents of the current month.
    pub monthly_total: Decimal,
    pub monthly_count: i64,
    pub monthly_paid_total: Decimal,
    pub draft_count: i64,
    pub issued_count: i64,
    pub paid_count: i64,
    pub recent: Vec<Invoice>,
}
