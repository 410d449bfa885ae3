//! Test helper module for invoicing-service integration tests.
//!
//! Wires the document workflow service to the in-memory store so the full
//! stack short of HTTP runs hermetically.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use uuid::Uuid;

use invoicing_service::events::{DocumentEvent, EventSink};
use invoicing_service::hooks::{InvoiceHooks, RequireCustomerGuard};
use invoicing_service::models::{
    CreateDocument, CreateSeries, CustomerSnapshot, Invoice, InvoiceSeries, InvoiceType, LineDraft,
};
use invoicing_service::services::InvoiceService;
use invoicing_service::store::{InvoicingStore, MemStore};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("bad decimal literal")
}

/// Event sink that records everything it is given.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DocumentEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<DocumentEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: &DocumentEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// The default hook registry, as wired by startup.
pub fn default_hooks() -> InvoiceHooks {
    let mut hooks = InvoiceHooks::new();
    hooks.register_guard(Arc::new(RequireCustomerGuard));
    hooks
}

/// In-memory application for integration tests.
pub struct TestApp {
    pub tenant: Uuid,
    pub store: Arc<dyn InvoicingStore>,
    pub invoices: Arc<InvoiceService>,
    pub sink: Arc<RecordingSink>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_hooks(default_hooks())
    }

    pub fn with_hooks(hooks: InvoiceHooks) -> Self {
        let store: Arc<dyn InvoicingStore> = Arc::new(MemStore::new());
        let sink = Arc::new(RecordingSink::default());
        let invoices = Arc::new(InvoiceService::new(
            store.clone(),
            Arc::new(hooks),
            sink.clone(),
        ));
        Self {
            tenant: Uuid::new_v4(),
            store,
            invoices,
            sink,
        }
    }

    /// Create an active series for this tenant.
    pub async fn series(&self, prefix: &str, digits: i32) -> InvoiceSeries {
        self.series_for(self.tenant, prefix, digits).await
    }

    pub async fn series_for(&self, tenant: Uuid, prefix: &str, digits: i32) -> InvoiceSeries {
        self.store
            .create_series(&CreateSeries {
                tenant_id: tenant,
                prefix: prefix.to_string(),
                name: format!("{prefix} series"),
                description: None,
                number_digits: digits,
                is_active: true,
                is_default: false,
            })
            .await
            .expect("Failed to create series")
    }

    /// Create a draft document with the given lines and a 21% tax rate.
    pub async fn draft(&self, series: &InvoiceSeries, lines: Vec<LineDraft>) -> Invoice {
        self.invoices
            .create_document(self.tenant, create_document_input(series, lines))
            .await
            .expect("Failed to create draft document")
    }
}

pub fn create_document_input(series: &InvoiceSeries, lines: Vec<LineDraft>) -> CreateDocument {
    CreateDocument {
        series_id: series.series_id,
        invoice_type: InvoiceType::Standard,
        due_date: None,
        customer: CustomerSnapshot {
            name: "Cliente Ejemplo SL".to_string(),
            tax_id: Some("B12345678".to_string()),
            ..CustomerSnapshot::default()
        },
        customer_id: None,
        sale_id: None,
        employee_id: None,
        tax_rate: Some(dec("21.00")),
        notes: None,
        rectified_invoice_id: None,
        lines,
    }
}

pub fn line(description: &str, quantity: &str, unit_price: &str) -> LineDraft {
    LineDraft {
        product_id: None,
        product_sku: None,
        description: description.to_string(),
        quantity: dec(quantity),
        unit_price: dec(unit_price),
        discount_percent: Decimal::ZERO,
        tax_rate: None,
        sort_order: None,
    }
}

pub fn line_with_discount(
    description: &str,
    quantity: &str,
    unit_price: &str,
    discount_percent: &str,
) -> LineDraft {
    LineDraft {
        discount_percent: dec(discount_percent),
        ..line(description, quantity, unit_price)
    }
}
