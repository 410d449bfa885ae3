//! Document workflow service: creation with extension points, lifecycle
//! transitions, and the queries behind the screens.
//!
//! All persistence goes through `InvoicingStore`; this layer owns input
//! validation, the totals computation, the hook call order and outbound
//! events.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::{Datelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::events::{DocumentEvent, EventSink};
use crate::hooks::{CreateContext, InvoiceHooks};
use crate::models::{
    CreateDocument, DashboardSummary, Invoice, InvoiceFilter, InvoiceLine, InvoicePage,
    InvoiceType, LineDraft, NewInvoice, NewInvoiceLine, PaymentInput, Transition, UpdateLine,
};
use crate::services::metrics::{DOCUMENTS_TOTAL, ERRORS_TOTAL, ISSUED_AMOUNT_TOTAL};
use crate::store::InvoicingStore;
use crate::totals;

use tracing::{info, instrument};

/// Document tax rate applied when the caller does not set one.
pub fn default_tax_rate() -> Decimal {
    Decimal::new(2100, 2) // 21.00 %
}

pub struct InvoiceService {
    store: Arc<dyn InvoicingStore>,
    hooks: Arc<InvoiceHooks>,
    events: Arc<dyn EventSink>,
}

impl InvoiceService {
    pub fn new(
        store: Arc<dyn InvoicingStore>,
        hooks: Arc<InvoiceHooks>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            hooks,
            events,
        }
    }

    /// Create a draft document with its lines.
    ///
    /// Order of operations: validate -> resolve series and rectified
    /// reference -> guards (may veto) -> line filters -> line totals ->
    /// document totals -> totals filters -> persist (one transaction) ->
    /// event + observers. Nothing is written before every guard has passed.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id))]
    pub async fn create_document(
        &self,
        tenant_id: Uuid,
        input: CreateDocument,
    ) -> Result<Invoice, AppError> {
        input.validate()?;

        let settings = self.store.get_or_create_settings(tenant_id).await?;

        let series = self
            .store
            .get_series(tenant_id, input.series_id)
            .await?
            .ok_or_else(|| AppError::BadRequest(anyhow!("Invalid series")))?;
        if !series.is_active {
            return Err(AppError::BadRequest(anyhow!("Series is not active")));
        }

        // A rectifying reference must resolve within the same tenant. On any
        // other document type the field is ignored.
        let rectified_invoice_id = match (input.invoice_type, input.rectified_invoice_id) {
            (InvoiceType::Rectifying, Some(id)) => {
                self.store
                    .get_invoice(tenant_id, id)
                    .await?
                    .ok_or_else(|| AppError::BadRequest(anyhow!("Rectified document not found")))?;
                Some(id)
            }
            _ => None,
        };

        let ctx = CreateContext {
            tenant_id,
            invoice_type: input.invoice_type,
            customer: input.customer.clone(),
            sale_id: input.sale_id,
            employee_id: input.employee_id,
            require_customer: settings.require_customer,
        };

        self.hooks
            .check_guards(&ctx, &input.lines)
            .map_err(|reason| AppError::BadRequest(anyhow!(reason)))?;

        let drafts = self.hooks.filter_lines(input.lines, &ctx);

        let tax_rate = input.tax_rate.unwrap_or_else(default_tax_rate);
        let lines = resolve_lines(&drafts, tax_rate);

        let computed = totals::document_totals(lines.iter().map(|l| l.total), tax_rate);
        let computed = self.hooks.filter_totals(computed, &ctx);

        let header = NewInvoice {
            tenant_id,
            series_id: series.series_id,
            invoice_type: input.invoice_type,
            issue_date: Utc::now().date_naive(),
            due_date: input.due_date,
            customer: input.customer,
            customer_id: input.customer_id,
            sale_id: input.sale_id,
            employee_id: input.employee_id,
            tax_rate,
            subtotal: computed.subtotal,
            tax_amount: computed.tax_amount,
            total: computed.total,
            notes: input.notes,
            rectified_invoice_id,
        };

        let result = self.store.create_invoice(&header, &lines).await;
        if result.is_err() {
            ERRORS_TOTAL.with_label_values(&["create_document"]).inc();
        }
        let invoice = result?;

        DOCUMENTS_TOTAL.with_label_values(&["draft"]).inc();

        self.events.publish(&DocumentEvent::DocumentCreated {
            tenant_id,
            invoice_id: invoice.invoice_id,
        });
        self.hooks.notify_created(&invoice);

        Ok(invoice)
    }

    /// Issue a draft: allocate its permanent number and freeze it.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    pub async fn issue_document(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Transition, AppError> {
        let result = self
            .store
            .issue_invoice(tenant_id, invoice_id, Utc::now().date_naive())
            .await;
        if result.is_err() {
            ERRORS_TOTAL.with_label_values(&["issue_document"]).inc();
        }
        let transition = result?;

        if let Transition::Applied(invoice) = &transition {
            DOCUMENTS_TOTAL.with_label_values(&["issued"]).inc();
            ISSUED_AMOUNT_TOTAL
                .with_label_values(&[invoice.invoice_type.as_str()])
                .inc_by(invoice.total.to_f64().unwrap_or(0.0));

            if let Some(number) = &invoice.number {
                info!(invoice_id = %invoice_id, number = %number, "Document issued");
                self.events.publish(&DocumentEvent::DocumentIssued {
                    tenant_id,
                    invoice_id: invoice.invoice_id,
                    number: number.clone(),
                });
            }
        }

        Ok(transition)
    }

    /// Cancel a draft or issued document. The number, if assigned, stays.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    pub async fn cancel_document(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Transition, AppError> {
        let result = self.store.cancel_invoice(tenant_id, invoice_id).await;
        if result.is_err() {
            ERRORS_TOTAL.with_label_values(&["cancel_document"]).inc();
        }
        let transition = result?;

        if let Transition::Applied(invoice) = &transition {
            DOCUMENTS_TOTAL.with_label_values(&["cancelled"]).inc();
            self.events.publish(&DocumentEvent::DocumentCancelled {
                tenant_id,
                invoice_id: invoice.invoice_id,
                number: invoice.number.clone(),
            });
        }

        Ok(transition)
    }

    /// Record payment on an issued document.
    #[instrument(skip(self, payment), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    pub async fn pay_document(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        payment: PaymentInput,
    ) -> Result<Transition, AppError> {
        let transition = self.store.mark_paid(tenant_id, invoice_id, &payment).await?;

        if let Transition::Applied(invoice) = &transition {
            DOCUMENTS_TOTAL.with_label_values(&["paid"]).inc();
            self.events.publish(&DocumentEvent::DocumentPaid {
                tenant_id,
                invoice_id: invoice.invoice_id,
            });
        }

        Ok(transition)
    }

    /// Soft-delete a draft document.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    pub async fn delete_document(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Transition, AppError> {
        self.store.delete_invoice(tenant_id, invoice_id).await
    }

    /// A document with its lines.
    pub async fn get_document(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<(Invoice, Vec<InvoiceLine>)>, AppError> {
        let Some(invoice) = self.store.get_invoice(tenant_id, invoice_id).await? else {
            return Ok(None);
        };
        let lines = self.store.get_lines(tenant_id, invoice_id).await?;
        Ok(Some((invoice, lines)))
    }

    pub async fn list_documents(
        &self,
        tenant_id: Uuid,
        filter: &InvoiceFilter,
    ) -> Result<InvoicePage, AppError> {
        self.store.list_invoices(tenant_id, filter).await
    }

    /// Issued/paid documents matching a lookup query (rectifying reference
    /// picker). Queries under two characters return nothing.
    pub async fn search_documents(
        &self,
        tenant_id: Uuid,
        query: &str,
    ) -> Result<Vec<Invoice>, AppError> {
        let query = query.trim();
        if query.len() < 2 {
            return Ok(Vec::new());
        }
        self.store.search_issued(tenant_id, query, 20).await
    }

    pub async fn dashboard(&self, tenant_id: Uuid) -> Result<DashboardSummary, AppError> {
        let today = Utc::now().date_naive();
        let month_start = today.with_day(1).unwrap_or(today);
        self.store.dashboard(tenant_id, month_start).await
    }

    /// Append a line to a draft document. The line total and the header
    /// totals are recomputed before anything is considered consistent.
    #[instrument(skip(self, draft), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    pub async fn add_line(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        draft: LineDraft,
    ) -> Result<Option<InvoiceLine>, AppError> {
        draft.validate()?;

        let Some(invoice) = self.store.get_invoice(tenant_id, invoice_id).await? else {
            return Ok(None);
        };
        let existing = self.store.get_lines(tenant_id, invoice_id).await?;

        let line = NewInvoiceLine {
            product_id: draft.product_id,
            product_sku: draft.product_sku.clone(),
            description: draft.description.clone(),
            quantity: draft.quantity,
            unit_price: draft.unit_price,
            discount_percent: draft.discount_percent,
            tax_rate: draft.tax_rate.unwrap_or(invoice.tax_rate),
            total: totals::line_total(draft.quantity, draft.unit_price, draft.discount_percent),
            sort_order: draft.sort_order.unwrap_or(existing.len() as i32),
        };

        self.store.add_line(tenant_id, invoice_id, &line).await
    }

    /// Update a line of a draft document, recomputing all derived values.
    pub async fn update_line(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        line_id: Uuid,
        input: UpdateLine,
    ) -> Result<Option<InvoiceLine>, AppError> {
        input.validate()?;
        self.store
            .update_line(tenant_id, invoice_id, line_id, &input)
            .await
    }

    /// Remove a line of a draft document, recomputing the header totals.
    pub async fn remove_line(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        line_id: Uuid,
    ) -> Result<bool, AppError> {
        self.store.remove_line(tenant_id, invoice_id, line_id).await
    }
}

/// Resolve filtered drafts into persistable lines: per-line tax defaults to
/// the document rate, sort order to the input position, and every line total
/// is computed here, before persistence.
fn resolve_lines(drafts: &[LineDraft], document_tax_rate: Decimal) -> Vec<NewInvoiceLine> {
    drafts
        .iter()
        .enumerate()
        .map(|(idx, draft)| NewInvoiceLine {
            product_id: draft.product_id,
            product_sku: draft.product_sku.clone(),
            description: draft.description.clone(),
            quantity: draft.quantity,
            unit_price: draft.unit_price,
            discount_percent: draft.discount_percent,
            tax_rate: draft.tax_rate.unwrap_or(document_tax_rate),
            total: totals::line_total(draft.quantity, draft.unit_price, draft.discount_percent),
            sort_order: draft.sort_order.unwrap_or(idx as i32),
        })
        .collect()
}
