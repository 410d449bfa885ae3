//! Storage layer for invoicing-service.
//!
//! `InvoicingStore` is the repository boundary: every method is scoped to a
//! tenant and sees only non-deleted rows. Each mutating method is atomic —
//! either the whole operation persists or nothing does — and the
//! check-then-write sequences that carry invariants (number allocation,
//! default flag, line mutation + header totals) run inside one transaction
//! per implementation.

mod memory;
mod postgres;

pub use memory::MemStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    CreateSeries, DashboardSummary, Invoice, InvoiceFilter, InvoiceLine, InvoicePage,
    InvoiceSeries, InvoicingSettings, NewInvoice, NewInvoiceLine, PaymentInput, SeriesUsage,
    SettingsForm, SettingsUpdate, Transition, UpdateLine, UpdateSeries,
};

#[async_trait]
pub trait InvoicingStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    // -------------------------------------------------------------------------
    // Series
    // -------------------------------------------------------------------------

    /// Create a series. Clears the default flag on sibling series in the same
    /// write when the new series is marked default. Fails with `Conflict` if
    /// the tenant already has a live series with this prefix.
    async fn create_series(&self, input: &CreateSeries) -> Result<InvoiceSeries, AppError>;

    async fn get_series(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
    ) -> Result<Option<InvoiceSeries>, AppError>;

    /// All live series of the tenant, ordered by prefix, with their live
    /// document counts.
    async fn list_series(&self, tenant_id: Uuid) -> Result<Vec<SeriesUsage>, AppError>;

    async fn update_series(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
        input: &UpdateSeries,
    ) -> Result<Option<InvoiceSeries>, AppError>;

    /// Make this series the tenant's default. Clear-all-then-set runs as one
    /// atomic unit; at no observable point does the tenant have two defaults.
    async fn set_default_series(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
    ) -> Result<Option<InvoiceSeries>, AppError>;

    /// Flip the active flag.
    async fn toggle_series(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
    ) -> Result<Option<InvoiceSeries>, AppError>;

    /// Soft-delete a series. Fails with `Conflict` while any live document of
    /// any status still references it.
    async fn delete_series(&self, tenant_id: Uuid, series_id: Uuid) -> Result<bool, AppError>;

    /// Atomically read-increment-persist the series counter and return the
    /// formatted document number. Irreversible: never call for display.
    async fn allocate_number(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
    ) -> Result<Option<String>, AppError>;

    // -------------------------------------------------------------------------
    // Documents
    // -------------------------------------------------------------------------

    /// Persist a draft header and its lines in one transaction.
    async fn create_invoice(
        &self,
        header: &NewInvoice,
        lines: &[NewInvoiceLine],
    ) -> Result<Invoice, AppError>;

    async fn get_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError>;

    /// Live lines of a document, ordered by sort_order then creation time.
    async fn get_lines(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceLine>, AppError>;

    async fn list_invoices(
        &self,
        tenant_id: Uuid,
        filter: &InvoiceFilter,
    ) -> Result<InvoicePage, AppError>;

    /// Issued/paid documents matching a number or customer-name fragment, for
    /// the rectifying-document lookup.
    async fn search_issued(
        &self,
        tenant_id: Uuid,
        query: &str,
        limit: i64,
    ) -> Result<Vec<Invoice>, AppError>;

    /// draft -> issued: allocates the number from the document's series and
    /// stamps number/status/issue date, all in one transaction. Rejected when
    /// the document is not a draft.
    async fn issue_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        issue_date: NaiveDate,
    ) -> Result<Transition, AppError>;

    /// draft|issued -> cancelled. The assigned number, if any, is kept and
    /// never recycled.
    async fn cancel_invoice(&self, tenant_id: Uuid, invoice_id: Uuid)
        -> Result<Transition, AppError>;

    /// issued -> paid, recording payment method and amount.
    async fn mark_paid(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        payment: &PaymentInput,
    ) -> Result<Transition, AppError>;

    /// Soft-delete a draft document and its lines. Rejected for any other
    /// status.
    async fn delete_invoice(&self, tenant_id: Uuid, invoice_id: Uuid)
        -> Result<Transition, AppError>;

    /// Append a line to a draft document and recompute the header totals, in
    /// one transaction. `None` when the document does not exist.
    async fn add_line(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        line: &NewInvoiceLine,
    ) -> Result<Option<InvoiceLine>, AppError>;

    /// Update a line of a draft document, recomputing its total and the
    /// header totals in one transaction.
    async fn update_line(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        line_id: Uuid,
        input: &UpdateLine,
    ) -> Result<Option<InvoiceLine>, AppError>;

    /// Soft-delete a line of a draft document and recompute the header
    /// totals, in one transaction.
    async fn remove_line(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        line_id: Uuid,
    ) -> Result<bool, AppError>;

    async fn dashboard(
        &self,
        tenant_id: Uuid,
        month_start: NaiveDate,
    ) -> Result<DashboardSummary, AppError>;

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    /// The tenant's settings row, created with defaults on first access.
    async fn get_or_create_settings(&self, tenant_id: Uuid)
        -> Result<InvoicingSettings, AppError>;

    async fn save_settings(
        &self,
        tenant_id: Uuid,
        form: &SettingsForm,
    ) -> Result<InvoicingSettings, AppError>;

    async fn apply_settings_update(
        &self,
        tenant_id: Uuid,
        update: &SettingsUpdate,
    ) -> Result<InvoicingSettings, AppError>;

    async fn reset_settings(&self, tenant_id: Uuid) -> Result<InvoicingSettings, AppError>;
}
