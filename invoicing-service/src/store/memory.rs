//! In-memory store for tests and local development.
//!
//! A single mutex over the whole state stands in for the database's
//! transactions: every operation holds the lock for its full
//! read-modify-write, so the atomicity contracts of `InvoicingStore`
//! (counter allocation, default flag, line + totals writes) hold trivially.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    CreateSeries, DashboardSummary, Invoice, InvoiceFilter, InvoiceLine, InvoicePage,
    InvoiceSeries, InvoiceSort, InvoiceStatus, InvoicingSettings, NewInvoice, NewInvoiceLine,
    PaymentInput, SeriesUsage, SettingsForm, SettingsUpdate, SortDir, Transition, UpdateLine,
    UpdateSeries,
};
use crate::store::InvoicingStore;
use crate::totals;

use anyhow::anyhow;

#[derive(Default)]
struct MemState {
    series: HashMap<Uuid, InvoiceSeries>,
    invoices: HashMap<Uuid, Invoice>,
    lines: HashMap<Uuid, InvoiceLine>,
    settings: HashMap<Uuid, InvoicingSettings>,
}

impl MemState {
    fn live_series(&self, tenant_id: Uuid, series_id: Uuid) -> Option<&InvoiceSeries> {
        self.series
            .get(&series_id)
            .filter(|s| s.tenant_id == tenant_id && s.deleted_utc.is_none())
    }

    fn live_invoice(&self, tenant_id: Uuid, invoice_id: Uuid) -> Option<&Invoice> {
        self.invoices
            .get(&invoice_id)
            .filter(|i| i.tenant_id == tenant_id && i.deleted_utc.is_none())
    }

    fn live_lines_of(&self, invoice_id: Uuid) -> Vec<InvoiceLine> {
        let mut lines: Vec<InvoiceLine> = self
            .lines
            .values()
            .filter(|l| l.invoice_id == invoice_id && l.deleted_utc.is_none())
            .cloned()
            .collect();
        lines.sort_by(|a, b| {
            (a.sort_order, a.created_utc).cmp(&(b.sort_order, b.created_utc))
        });
        lines
    }

    fn prefix_taken(&self, tenant_id: Uuid, prefix: &str, except: Option<Uuid>) -> bool {
        self.series.values().any(|s| {
            s.tenant_id == tenant_id
                && s.deleted_utc.is_none()
                && s.prefix == prefix
                && Some(s.series_id) != except
        })
    }

    fn clear_default(&mut self, tenant_id: Uuid, except: Option<Uuid>) {
        for s in self.series.values_mut() {
            if s.tenant_id == tenant_id && s.deleted_utc.is_none() && Some(s.series_id) != except {
                s.is_default = false;
            }
        }
    }

    /// Recompute and persist the header totals of a document from its live
    /// line set. Must be called inside the same lock scope as any line write.
    fn recalculate_totals(&mut self, invoice_id: Uuid) {
        let (line_totals, tax_rate) = match self.invoices.get(&invoice_id) {
            Some(invoice) => (
                self.live_lines_of(invoice_id)
                    .iter()
                    .map(|l| l.total)
                    .collect::<Vec<_>>(),
                invoice.tax_rate,
            ),
            None => return,
        };
        let computed = totals::document_totals(line_totals, tax_rate);
        if let Some(invoice) = self.invoices.get_mut(&invoice_id) {
            invoice.subtotal = computed.subtotal;
            invoice.tax_amount = computed.tax_amount;
            invoice.total = computed.total;
            invoice.updated_utc = Utc::now();
        }
    }
}

/// Mutex-guarded in-memory implementation of `InvoicingStore`.
#[derive(Default)]
pub struct MemStore {
    state: Mutex<MemState>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoicingStore for MemStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Series
    // -------------------------------------------------------------------------

    async fn create_series(&self, input: &CreateSeries) -> Result<InvoiceSeries, AppError> {
        let mut state = self.state.lock().await;

        if state.prefix_taken(input.tenant_id, &input.prefix, None) {
            return Err(AppError::Conflict(anyhow!(
                "Series with prefix '{}' already exists",
                input.prefix
            )));
        }

        if input.is_default {
            state.clear_default(input.tenant_id, None);
        }

        let now = Utc::now();
        let series = InvoiceSeries {
            series_id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            prefix: input.prefix.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            next_number: 1,
            number_digits: input.number_digits,
            is_active: input.is_active,
            is_default: input.is_default,
            created_utc: now,
            updated_utc: now,
            deleted_utc: None,
        };
        state.series.insert(series.series_id, series.clone());
        Ok(series)
    }

    async fn get_series(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
    ) -> Result<Option<InvoiceSeries>, AppError> {
        let state = self.state.lock().await;
        Ok(state.live_series(tenant_id, series_id).cloned())
    }

    async fn list_series(&self, tenant_id: Uuid) -> Result<Vec<SeriesUsage>, AppError> {
        let state = self.state.lock().await;
        let mut all: Vec<InvoiceSeries> = state
            .series
            .values()
            .filter(|s| s.tenant_id == tenant_id && s.deleted_utc.is_none())
            .cloned()
            .collect();
        all.sort_by(|a, b| a.prefix.cmp(&b.prefix));

        Ok(all
            .into_iter()
            .map(|series| {
                let document_count = state
                    .invoices
                    .values()
                    .filter(|i| i.series_id == series.series_id && i.deleted_utc.is_none())
                    .count() as i64;
                SeriesUsage {
                    series,
                    document_count,
                }
            })
            .collect())
    }

    async fn update_series(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
        input: &UpdateSeries,
    ) -> Result<Option<InvoiceSeries>, AppError> {
        let mut state = self.state.lock().await;

        if state.live_series(tenant_id, series_id).is_none() {
            return Ok(None);
        }

        if let Some(prefix) = &input.prefix {
            if state.prefix_taken(tenant_id, prefix, Some(series_id)) {
                return Err(AppError::Conflict(anyhow!(
                    "Series with prefix '{}' already exists",
                    prefix
                )));
            }
        }

        if input.is_default == Some(true) {
            state.clear_default(tenant_id, Some(series_id));
        }

        let Some(series) = state.series.get_mut(&series_id) else {
            return Ok(None);
        };
        if let Some(prefix) = &input.prefix {
            series.prefix = prefix.clone();
        }
        if let Some(name) = &input.name {
            series.name = name.clone();
        }
        if let Some(description) = &input.description {
            series.description = Some(description.clone());
        }
        if let Some(digits) = input.number_digits {
            series.number_digits = digits;
        }
        if let Some(active) = input.is_active {
            series.is_active = active;
        }
        if let Some(default) = input.is_default {
            series.is_default = default;
        }
        series.updated_utc = Utc::now();
        Ok(Some(series.clone()))
    }

    async fn set_default_series(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
    ) -> Result<Option<InvoiceSeries>, AppError> {
        let mut state = self.state.lock().await;

        if state.live_series(tenant_id, series_id).is_none() {
            return Ok(None);
        }
        state.clear_default(tenant_id, Some(series_id));
        let Some(series) = state.series.get_mut(&series_id) else {
            return Ok(None);
        };
        series.is_default = true;
        series.updated_utc = Utc::now();
        Ok(Some(series.clone()))
    }

    async fn toggle_series(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
    ) -> Result<Option<InvoiceSeries>, AppError> {
        let mut state = self.state.lock().await;

        if state.live_series(tenant_id, series_id).is_none() {
            return Ok(None);
        }
        let Some(series) = state.series.get_mut(&series_id) else {
            return Ok(None);
        };
        series.is_active = !series.is_active;
        series.updated_utc = Utc::now();
        Ok(Some(series.clone()))
    }

    async fn delete_series(&self, tenant_id: Uuid, series_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;

        if state.live_series(tenant_id, series_id).is_none() {
            return Ok(false);
        }
        let referenced = state
            .invoices
            .values()
            .any(|i| i.series_id == series_id && i.deleted_utc.is_none());
        if referenced {
            return Err(AppError::Conflict(anyhow!(
                "Cannot delete series with existing documents"
            )));
        }
        let Some(series) = state.series.get_mut(&series_id) else {
            return Ok(false);
        };
        series.deleted_utc = Some(Utc::now());
        series.updated_utc = Utc::now();
        Ok(true)
    }

    async fn allocate_number(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
    ) -> Result<Option<String>, AppError> {
        let mut state = self.state.lock().await;

        if state.live_series(tenant_id, series_id).is_none() {
            return Ok(None);
        }
        let Some(series) = state.series.get_mut(&series_id) else {
            return Ok(None);
        };
        let number = series.next_number;
        series.next_number += 1;
        series.updated_utc = Utc::now();
        Ok(Some(series.format_number(number)))
    }

    // -------------------------------------------------------------------------
    // Documents
    // -------------------------------------------------------------------------

    async fn create_invoice(
        &self,
        header: &NewInvoice,
        lines: &[NewInvoiceLine],
    ) -> Result<Invoice, AppError> {
        let mut state = self.state.lock().await;

        let now = Utc::now();
        let invoice = Invoice {
            invoice_id: Uuid::new_v4(),
            tenant_id: header.tenant_id,
            series_id: header.series_id,
            number: None,
            invoice_type: header.invoice_type.as_str().to_string(),
            status: InvoiceStatus::Draft.as_str().to_string(),
            issue_date: header.issue_date,
            due_date: header.due_date,
            customer_name: header.customer.name.clone(),
            customer_tax_id: header.customer.tax_id.clone(),
            customer_address: header.customer.address.clone(),
            customer_email: header.customer.email.clone(),
            customer_phone: header.customer.phone.clone(),
            customer_id: header.customer_id,
            sale_id: header.sale_id,
            employee_id: header.employee_id,
            subtotal: header.subtotal,
            tax_rate: header.tax_rate,
            tax_amount: header.tax_amount,
            total: header.total,
            payment_method: None,
            paid_amount: Decimal::ZERO,
            paid_utc: None,
            notes: header.notes.clone(),
            rectified_invoice_id: header.rectified_invoice_id,
            created_utc: now,
            updated_utc: now,
            deleted_utc: None,
        };

        for (idx, line) in lines.iter().enumerate() {
            // Staggered timestamps keep creation order as the tie-breaker.
            let created = now + Duration::microseconds(idx as i64);
            let row = InvoiceLine {
                line_id: Uuid::new_v4(),
                invoice_id: invoice.invoice_id,
                tenant_id: invoice.tenant_id,
                product_id: line.product_id,
                product_sku: line.product_sku.clone(),
                description: line.description.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                discount_percent: line.discount_percent,
                tax_rate: line.tax_rate,
                total: line.total,
                sort_order: line.sort_order,
                created_utc: created,
                updated_utc: created,
                deleted_utc: None,
            };
            state.lines.insert(row.line_id, row);
        }

        state.invoices.insert(invoice.invoice_id, invoice.clone());
        Ok(invoice)
    }

    async fn get_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let state = self.state.lock().await;
        Ok(state.live_invoice(tenant_id, invoice_id).cloned())
    }

    async fn get_lines(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceLine>, AppError> {
        let state = self.state.lock().await;
        if state.live_invoice(tenant_id, invoice_id).is_none() {
            return Ok(Vec::new());
        }
        Ok(state.live_lines_of(invoice_id))
    }

    async fn list_invoices(
        &self,
        tenant_id: Uuid,
        filter: &InvoiceFilter,
    ) -> Result<InvoicePage, AppError> {
        let state = self.state.lock().await;

        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut matched: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|i| i.tenant_id == tenant_id && i.deleted_utc.is_none())
            .filter(|i| match &needle {
                Some(q) => {
                    i.number
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(q))
                        || i.customer_name.to_lowercase().contains(q)
                        || i.customer_tax_id
                            .as_deref()
                            .is_some_and(|t| t.to_lowercase().contains(q))
                }
                None => true,
            })
            .filter(|i| match filter.status {
                Some(status) => i.status == status.as_str(),
                None => true,
            })
            .filter(|i| match filter.invoice_type {
                Some(invoice_type) => i.invoice_type == invoice_type.as_str(),
                None => true,
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let ordering = match filter.sort {
                InvoiceSort::Number => a.number.cmp(&b.number),
                InvoiceSort::IssueDate => a.issue_date.cmp(&b.issue_date),
                InvoiceSort::Customer => a.customer_name.cmp(&b.customer_name),
                InvoiceSort::Total => a.total.cmp(&b.total),
                InvoiceSort::Created => a.created_utc.cmp(&b.created_utc),
            };
            match filter.dir {
                SortDir::Asc => ordering,
                SortDir::Desc => ordering.reverse(),
            }
        });

        let total = matched.len() as i64;
        let per_page = filter.per_page.clamp(1, 100);
        let page = filter.page.max(1);
        let offset = ((page - 1) * per_page) as usize;
        let invoices = matched
            .into_iter()
            .skip(offset)
            .take(per_page as usize)
            .collect();

        Ok(InvoicePage {
            invoices,
            total,
            page,
            per_page,
        })
    }

    async fn search_issued(
        &self,
        tenant_id: Uuid,
        query: &str,
        limit: i64,
    ) -> Result<Vec<Invoice>, AppError> {
        let state = self.state.lock().await;
        let q = query.to_lowercase();

        let mut hits: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|i| i.tenant_id == tenant_id && i.deleted_utc.is_none())
            .filter(|i| {
                i.status == InvoiceStatus::Issued.as_str()
                    || i.status == InvoiceStatus::Paid.as_str()
            })
            .filter(|i| {
                i.number
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase().contains(&q))
                    || i.customer_name.to_lowercase().contains(&q)
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.number.cmp(&b.number));
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }

    async fn issue_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        issue_date: NaiveDate,
    ) -> Result<Transition, AppError> {
        let mut state = self.state.lock().await;

        let Some(invoice) = state.live_invoice(tenant_id, invoice_id) else {
            return Ok(Transition::NotFound);
        };
        if invoice.status != InvoiceStatus::Draft.as_str() {
            return Ok(Transition::Rejected);
        }
        let series_id = invoice.series_id;

        let Some(series) = state.series.get_mut(&series_id).filter(|s| {
            s.tenant_id == tenant_id && s.deleted_utc.is_none()
        }) else {
            return Err(AppError::DatabaseError(anyhow!(
                "Numbering series missing for document"
            )));
        };
        let counter = series.next_number;
        series.next_number += 1;
        series.updated_utc = Utc::now();
        let number = series.format_number(counter);

        let Some(invoice) = state.invoices.get_mut(&invoice_id) else {
            return Ok(Transition::NotFound);
        };
        invoice.number = Some(number);
        invoice.status = InvoiceStatus::Issued.as_str().to_string();
        invoice.issue_date = issue_date;
        invoice.updated_utc = Utc::now();
        Ok(Transition::Applied(invoice.clone()))
    }

    async fn cancel_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Transition, AppError> {
        let mut state = self.state.lock().await;

        let Some(invoice) = state.live_invoice(tenant_id, invoice_id) else {
            return Ok(Transition::NotFound);
        };
        let status = InvoiceStatus::from_string(&invoice.status);
        if !matches!(status, InvoiceStatus::Draft | InvoiceStatus::Issued) {
            return Ok(Transition::Rejected);
        }

        let Some(invoice) = state.invoices.get_mut(&invoice_id) else {
            return Ok(Transition::NotFound);
        };
        invoice.status = InvoiceStatus::Cancelled.as_str().to_string();
        invoice.updated_utc = Utc::now();
        Ok(Transition::Applied(invoice.clone()))
    }

    async fn mark_paid(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        payment: &PaymentInput,
    ) -> Result<Transition, AppError> {
        let mut state = self.state.lock().await;

        let Some(invoice) = state.live_invoice(tenant_id, invoice_id) else {
            return Ok(Transition::NotFound);
        };
        if invoice.status != InvoiceStatus::Issued.as_str() {
            return Ok(Transition::Rejected);
        }

        let Some(invoice) = state.invoices.get_mut(&invoice_id) else {
            return Ok(Transition::NotFound);
        };
        invoice.status = InvoiceStatus::Paid.as_str().to_string();
        invoice.payment_method = payment.payment_method.clone();
        invoice.paid_amount = payment.amount.unwrap_or(invoice.total);
        invoice.paid_utc = Some(Utc::now());
        invoice.updated_utc = Utc::now();
        Ok(Transition::Applied(invoice.clone()))
    }

    async fn delete_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Transition, AppError> {
        let mut state = self.state.lock().await;

        let Some(invoice) = state.live_invoice(tenant_id, invoice_id) else {
            return Ok(Transition::NotFound);
        };
        if invoice.status != InvoiceStatus::Draft.as_str() {
            return Ok(Transition::Rejected);
        }

        let now = Utc::now();
        for line in state.lines.values_mut() {
            if line.invoice_id == invoice_id && line.deleted_utc.is_none() {
                line.deleted_utc = Some(now);
                line.updated_utc = now;
            }
        }
        let Some(invoice) = state.invoices.get_mut(&invoice_id) else {
            return Ok(Transition::NotFound);
        };
        invoice.deleted_utc = Some(now);
        invoice.updated_utc = now;
        Ok(Transition::Applied(invoice.clone()))
    }

    async fn add_line(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        line: &NewInvoiceLine,
    ) -> Result<Option<InvoiceLine>, AppError> {
        let mut state = self.state.lock().await;

        let Some(invoice) = state.live_invoice(tenant_id, invoice_id) else {
            return Ok(None);
        };
        if invoice.status != InvoiceStatus::Draft.as_str() {
            return Err(AppError::BadRequest(anyhow!(
                "Can only add lines to draft documents"
            )));
        }

        let now = Utc::now();
        let row = InvoiceLine {
            line_id: Uuid::new_v4(),
            invoice_id,
            tenant_id,
            product_id: line.product_id,
            product_sku: line.product_sku.clone(),
            description: line.description.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            discount_percent: line.discount_percent,
            tax_rate: line.tax_rate,
            total: line.total,
            sort_order: line.sort_order,
            created_utc: now,
            updated_utc: now,
            deleted_utc: None,
        };
        state.lines.insert(row.line_id, row.clone());
        state.recalculate_totals(invoice_id);
        Ok(Some(row))
    }

    async fn update_line(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        line_id: Uuid,
        input: &UpdateLine,
    ) -> Result<Option<InvoiceLine>, AppError> {
        let mut state = self.state.lock().await;

        let Some(invoice) = state.live_invoice(tenant_id, invoice_id) else {
            return Ok(None);
        };
        if invoice.status != InvoiceStatus::Draft.as_str() {
            return Err(AppError::BadRequest(anyhow!(
                "Can only update lines on draft documents"
            )));
        }

        let Some(line) = state.lines.get_mut(&line_id).filter(|l| {
            l.invoice_id == invoice_id && l.deleted_utc.is_none()
        }) else {
            return Ok(None);
        };

        if let Some(description) = &input.description {
            line.description = description.clone();
        }
        if let Some(quantity) = input.quantity {
            line.quantity = quantity;
        }
        if let Some(unit_price) = input.unit_price {
            line.unit_price = unit_price;
        }
        if let Some(discount) = input.discount_percent {
            line.discount_percent = discount;
        }
        if let Some(tax_rate) = input.tax_rate {
            line.tax_rate = tax_rate;
        }
        if let Some(sort_order) = input.sort_order {
            line.sort_order = sort_order;
        }
        line.total = totals::line_total(line.quantity, line.unit_price, line.discount_percent);
        line.updated_utc = Utc::now();
        let updated = line.clone();

        state.recalculate_totals(invoice_id);
        Ok(Some(updated))
    }

    async fn remove_line(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        line_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;

        let Some(invoice) = state.live_invoice(tenant_id, invoice_id) else {
            return Ok(false);
        };
        if invoice.status != InvoiceStatus::Draft.as_str() {
            return Err(AppError::BadRequest(anyhow!(
                "Can only remove lines from draft documents"
            )));
        }

        let Some(line) = state.lines.get_mut(&line_id).filter(|l| {
            l.invoice_id == invoice_id && l.deleted_utc.is_none()
        }) else {
            return Ok(false);
        };
        let now = Utc::now();
        line.deleted_utc = Some(now);
        line.updated_utc = now;

        state.recalculate_totals(invoice_id);
        Ok(true)
    }

    async fn dashboard(
        &self,
        tenant_id: Uuid,
        month_start: NaiveDate,
    ) -> Result<DashboardSummary, AppError> {
        let state = self.state.lock().await;

        let live: Vec<&Invoice> = state
            .invoices
            .values()
            .filter(|i| i.tenant_id == tenant_id && i.deleted_utc.is_none())
            .collect();

        let monthly: Vec<&&Invoice> = live
            .iter()
            .filter(|i| {
                i.issue_date >= month_start
                    && (i.status == InvoiceStatus::Issued.as_str()
                        || i.status == InvoiceStatus::Paid.as_str())
            })
            .collect();

        let monthly_total = monthly.iter().map(|i| i.total).sum();
        let monthly_paid_total = monthly
            .iter()
            .filter(|i| i.status == InvoiceStatus::Paid.as_str())
            .map(|i| i.total)
            .sum();
        let count_status = |status: InvoiceStatus| {
            live.iter().filter(|i| i.status == status.as_str()).count() as i64
        };

        let mut recent: Vec<Invoice> = live.iter().map(|i| (*i).clone()).collect();
        recent.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        recent.truncate(10);

        Ok(DashboardSummary {
            monthly_total,
            monthly_count: monthly.len() as i64,
            monthly_paid_total,
            draft_count: count_status(InvoiceStatus::Draft),
            issued_count: count_status(InvoiceStatus::Issued),
            paid_count: count_status(InvoiceStatus::Paid),
            recent,
        })
    }

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    async fn get_or_create_settings(
        &self,
        tenant_id: Uuid,
    ) -> Result<InvoicingSettings, AppError> {
        let mut state = self.state.lock().await;
        Ok(state
            .settings
            .entry(tenant_id)
            .or_insert_with(|| InvoicingSettings::defaults(tenant_id))
            .clone())
    }

    async fn save_settings(
        &self,
        tenant_id: Uuid,
        form: &SettingsForm,
    ) -> Result<InvoicingSettings, AppError> {
        let mut state = self.state.lock().await;
        let settings = state
            .settings
            .entry(tenant_id)
            .or_insert_with(|| InvoicingSettings::defaults(tenant_id));
        settings.company_name = form.company_name.clone();
        settings.company_tax_id = form.company_tax_id.clone();
        settings.company_address = form.company_address.clone();
        settings.company_phone = form.company_phone.clone();
        settings.company_email = form.company_email.clone();
        settings.default_series_prefix = form.default_series_prefix.clone();
        settings.auto_generate_invoice = form.auto_generate_invoice;
        settings.require_customer = form.require_customer;
        settings.invoice_footer = form.invoice_footer.clone();
        settings.updated_utc = Utc::now();
        Ok(settings.clone())
    }

    async fn apply_settings_update(
        &self,
        tenant_id: Uuid,
        update: &SettingsUpdate,
    ) -> Result<InvoicingSettings, AppError> {
        let mut state = self.state.lock().await;
        let settings = state
            .settings
            .entry(tenant_id)
            .or_insert_with(|| InvoicingSettings::defaults(tenant_id));
        update.apply(settings);
        settings.updated_utc = Utc::now();
        Ok(settings.clone())
    }

    async fn reset_settings(&self, tenant_id: Uuid) -> Result<InvoicingSettings, AppError> {
        let mut state = self.state.lock().await;
        let settings = state
            .settings
            .entry(tenant_id)
            .or_insert_with(|| InvoicingSettings::defaults(tenant_id));
        let fresh = InvoicingSettings::defaults(tenant_id);
        settings.company_name = fresh.company_name;
        settings.company_tax_id = fresh.company_tax_id;
        settings.company_address = fresh.company_address;
        settings.company_phone = fresh.company_phone;
        settings.company_email = fresh.company_email;
        settings.default_series_prefix = fresh.default_series_prefix;
        settings.auto_generate_invoice = fresh.auto_generate_invoice;
        settings.require_customer = fresh.require_customer;
        settings.invoice_footer = fresh.invoice_footer;
        settings.updated_utc = Utc::now();
        Ok(settings.clone())
    }
}
