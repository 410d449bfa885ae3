//! Extension points for the document-creation workflow.
//!
//! External policy modules plug in through an explicit registry of typed
//! callbacks. Each callback's contract is part of its trait: guards may veto,
//! filters transform, observers only get told. The workflow calls them in a
//! fixed order: guards -> line filters -> totals computation -> totals
//! filters -> persistence -> observers.

use std::sync::Arc;

use uuid::Uuid;

use crate::models::{CustomerSnapshot, Invoice, InvoiceType, LineDraft};
use crate::totals::DocumentTotals;

/// What the creation callbacks get to see about the document being created.
#[derive(Debug, Clone)]
pub struct CreateContext {
    pub tenant_id: Uuid,
    pub invoice_type: InvoiceType,
    pub customer: CustomerSnapshot,
    pub sale_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    /// From the tenant's settings at creation time.
    pub require_customer: bool,
}

/// May reject a creation before anything is persisted. Returning `Err` aborts
/// the whole operation with a validation rejection.
pub trait CreateGuard: Send + Sync {
    fn check(&self, ctx: &CreateContext, lines: &[LineDraft]) -> Result<(), String>;
}

/// May add, drop or rewrite lines before line totals are computed.
pub trait LineFilter: Send + Sync {
    fn filter(&self, lines: Vec<LineDraft>, ctx: &CreateContext) -> Vec<LineDraft>;
}

/// May adjust the computed document totals before they are persisted.
pub trait TotalsFilter: Send + Sync {
    fn filter(&self, totals: DocumentTotals, ctx: &CreateContext) -> DocumentTotals;
}

/// Told about a created document after commit. Informational only; nothing it
/// does can affect the operation.
pub trait CreateObserver: Send + Sync {
    fn created(&self, invoice: &Invoice);
}

/// Registry of creation callbacks, injected into the document workflow.
#[derive(Default)]
pub struct InvoiceHooks {
    guards: Vec<Arc<dyn CreateGuard>>,
    line_filters: Vec<Arc<dyn LineFilter>>,
    totals_filters: Vec<Arc<dyn TotalsFilter>>,
    observers: Vec<Arc<dyn CreateObserver>>,
}

impl InvoiceHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_guard(&mut self, guard: Arc<dyn CreateGuard>) {
        self.guards.push(guard);
    }

    pub fn register_line_filter(&mut self, filter: Arc<dyn LineFilter>) {
        self.line_filters.push(filter);
    }

    pub fn register_totals_filter(&mut self, filter: Arc<dyn TotalsFilter>) {
        self.totals_filters.push(filter);
    }

    pub fn register_observer(&mut self, observer: Arc<dyn CreateObserver>) {
        self.observers.push(observer);
    }

    /// Run every guard; the first veto wins.
    pub fn check_guards(&self, ctx: &CreateContext, lines: &[LineDraft]) -> Result<(), String> {
        for guard in &self.guards {
            guard.check(ctx, lines)?;
        }
        Ok(())
    }

    pub fn filter_lines(&self, mut lines: Vec<LineDraft>, ctx: &CreateContext) -> Vec<LineDraft> {
        for filter in &self.line_filters {
            lines = filter.filter(lines, ctx);
        }
        lines
    }

    pub fn filter_totals(&self, mut totals: DocumentTotals, ctx: &CreateContext) -> DocumentTotals {
        for filter in &self.totals_filters {
            totals = filter.filter(totals, ctx);
        }
        totals
    }

    pub fn notify_created(&self, invoice: &Invoice) {
        for observer in &self.observers {
            observer.created(invoice);
        }
    }
}

/// Guard enforcing the per-tenant "require customer" setting: when enabled, a
/// document cannot be created without a customer name.
pub struct RequireCustomerGuard;

impl CreateGuard for RequireCustomerGuard {
    fn check(&self, ctx: &CreateContext, _lines: &[LineDraft]) -> Result<(), String> {
        if ctx.require_customer && ctx.customer.name.trim().is_empty() {
            return Err("customer name is required".to_string());
        }
        Ok(())
    }
}
