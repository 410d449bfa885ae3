//! Invoice line model for invoicing-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Line item on an invoice. Exclusively owned by its document; `total` is
/// recomputed from quantity/price/discount on every write.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceLine {
    pub line_id: Uuid,
    pub invoice_id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_sku: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub tax_rate: Decimal,
    pub total: Decimal,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub deleted_utc: Option<DateTime<Utc>>,
}

/// Caller-supplied line data, before totals are computed. This is also what
/// line-filter hooks receive and may rewrite.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LineDraft {
    pub product_id: Option<Uuid>,
    #[validate(length(max = 50))]
    pub product_sku: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount_percent: Decimal,
    /// Defaults to the document's tax rate when absent.
    pub tax_rate: Option<Decimal>,
    /// Defaults to the input position when absent.
    pub sort_order: Option<i32>,
}

fn default_quantity() -> Decimal {
    Decimal::ONE
}

/// Fully resolved line row handed to the store, total included.
#[derive(Debug, Clone)]
pub struct NewInvoiceLine {
    pub product_id: Option<Uuid>,
    pub product_sku: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub tax_rate: Decimal,
    pub total: Decimal,
    pub sort_order: i32,
}

/// Input for updating a line on a draft document.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateLine {
    #[validate(length(min = 1, max = 500))]
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub sort_order: Option<i32>,
}
