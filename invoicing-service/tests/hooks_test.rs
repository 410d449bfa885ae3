//! Extension-point tests: guards veto before persistence, line filters run
//! before totals, totals filters shape what gets persisted, observers are
//! told afterwards. Also covers the rectifying reference check.

mod common;

use std::sync::{Arc, Mutex};

use common::{create_document_input, dec, line, TestApp};
use invoicing_service::hooks::{
    CreateContext, CreateGuard, CreateObserver, InvoiceHooks, LineFilter, TotalsFilter,
};
use invoicing_service::models::{Invoice, InvoiceFilter, InvoiceType, LineDraft};
use invoicing_service::totals::DocumentTotals;
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

struct AlwaysVeto;

impl CreateGuard for AlwaysVeto {
    fn check(&self, _ctx: &CreateContext, _lines: &[LineDraft]) -> Result<(), String> {
        Err("vetoed by policy".to_string())
    }
}

struct ShippingLine;

impl LineFilter for ShippingLine {
    fn filter(&self, mut lines: Vec<LineDraft>, _ctx: &CreateContext) -> Vec<LineDraft> {
        lines.push(LineDraft {
            product_id: None,
            product_sku: None,
            description: "Shipping".to_string(),
            quantity: Decimal::ONE,
            unit_price: dec("10.00"),
            discount_percent: Decimal::ZERO,
            tax_rate: None,
            sort_order: None,
        });
        lines
    }
}

struct Surcharge;

impl TotalsFilter for Surcharge {
    fn filter(&self, totals: DocumentTotals, _ctx: &CreateContext) -> DocumentTotals {
        DocumentTotals {
            subtotal: totals.subtotal,
            tax_amount: totals.tax_amount,
            total: totals.total + dec("1.00"),
        }
    }
}

#[derive(Default)]
struct SeenDocuments {
    ids: Mutex<Vec<Uuid>>,
}

impl CreateObserver for SeenDocuments {
    fn created(&self, invoice: &Invoice) {
        self.ids.lock().unwrap().push(invoice.invoice_id);
    }
}

#[tokio::test]
async fn a_guard_veto_blocks_creation_before_any_write() {
    let mut hooks = InvoiceHooks::new();
    hooks.register_guard(Arc::new(AlwaysVeto));
    let app = TestApp::with_hooks(hooks);
    let series = app.series("F", 6).await;

    let result = app
        .invoices
        .create_document(
            app.tenant,
            create_document_input(&series, vec![line("a", "1", "10.00")]),
        )
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let page = app
        .store
        .list_invoices(app.tenant, &InvoiceFilter::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(app.sink.events().is_empty());
}

#[tokio::test]
async fn line_filters_run_before_totals_are_computed() {
    let mut hooks = InvoiceHooks::new();
    hooks.register_line_filter(Arc::new(ShippingLine));
    let app = TestApp::with_hooks(hooks);
    let series = app.series("F", 6).await;

    let invoice = app
        .draft(&series, vec![line("a", "1", "100.00")])
        .await;

    let lines = app
        .store
        .get_lines(app.tenant, invoice.invoice_id)
        .await
        .unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1].description, "Shipping");
    // Totals include the injected line: 110.00 + 21% = 133.10.
    assert_eq!(invoice.subtotal, dec("110.00"));
    assert_eq!(invoice.total, dec("133.10"));
}

#[tokio::test]
async fn totals_filters_shape_the_persisted_totals() {
    let mut hooks = InvoiceHooks::new();
    hooks.register_totals_filter(Arc::new(Surcharge));
    let app = TestApp::with_hooks(hooks);
    let series = app.series("F", 6).await;

    let invoice = app.draft(&series, vec![line("a", "1", "100.00")]).await;
    assert_eq!(invoice.total, dec("122.00"));

    let reloaded = app
        .store
        .get_invoice(app.tenant, invoice.invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.total, dec("122.00"));
}

#[tokio::test]
async fn observers_see_the_created_document() {
    let seen = Arc::new(SeenDocuments::default());
    let mut hooks = InvoiceHooks::new();
    hooks.register_observer(seen.clone());
    let app = TestApp::with_hooks(hooks);
    let series = app.series("F", 6).await;

    let invoice = app.draft(&series, vec![line("a", "1", "10.00")]).await;

    assert_eq!(*seen.ids.lock().unwrap(), vec![invoice.invoice_id]);
}

#[tokio::test]
async fn rectifying_documents_must_reference_a_tenant_local_document() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    let original = app.draft(&series, vec![line("a", "1", "100.00")]).await;
    app.invoices
        .issue_document(app.tenant, original.invoice_id)
        .await
        .unwrap();

    let rectifying_series = app.series("R", 4).await;
    let mut input = create_document_input(
        &rectifying_series,
        vec![line("abono", "1", "100.00")],
    );
    input.invoice_type = InvoiceType::Rectifying;
    input.rectified_invoice_id = Some(original.invoice_id);

    let rectifying = app
        .invoices
        .create_document(app.tenant, input.clone())
        .await
        .unwrap();
    assert_eq!(
        rectifying.rectified_invoice_id,
        Some(original.invoice_id)
    );

    // Unknown reference is rejected.
    input.rectified_invoice_id = Some(Uuid::new_v4());
    let unknown = app.invoices.create_document(app.tenant, input.clone()).await;
    assert!(matches!(unknown, Err(AppError::BadRequest(_))));

    // The reference is ignored for non-rectifying types.
    input.invoice_type = InvoiceType::Standard;
    input.rectified_invoice_id = Some(Uuid::new_v4());
    let standard = app
        .invoices
        .create_document(app.tenant, input)
        .await
        .unwrap();
    assert!(standard.rectified_invoice_id.is_none());
}

#[tokio::test]
async fn inactive_series_cannot_receive_documents() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    app.store
        .toggle_series(app.tenant, series.series_id)
        .await
        .unwrap();

    let result = app
        .invoices
        .create_document(
            app.tenant,
            create_document_input(&series, vec![line("a", "1", "10.00")]),
        )
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}
