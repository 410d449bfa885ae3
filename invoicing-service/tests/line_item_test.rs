//! Line and totals tests: discount arithmetic, derived header totals, and
//! recomputation on every line mutation.

mod common;

use common::{dec, line, line_with_discount, TestApp};
use invoicing_service::models::{LineDraft, UpdateLine};
use service_core::error::AppError;

#[tokio::test]
async fn document_totals_follow_the_line_set() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;

    let invoice = app
        .draft(
            &series,
            vec![line("dos a cincuenta", "2", "50.00"), line("uno a cien", "1", "100.00")],
        )
        .await;

    assert_eq!(invoice.subtotal, dec("200.00"));
    assert_eq!(invoice.tax_amount, dec("42.00"));
    assert_eq!(invoice.total, dec("242.00"));
}

#[tokio::test]
async fn discount_reduces_the_line_total() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;

    let invoice = app
        .draft(
            &series,
            vec![line_with_discount("con descuento", "2", "100.00", "10")],
        )
        .await;

    let lines = app
        .store
        .get_lines(app.tenant, invoice.invoice_id)
        .await
        .unwrap();
    assert_eq!(lines[0].total, dec("180.00"));
    assert_eq!(invoice.subtotal, dec("180.00"));
}

#[tokio::test]
async fn line_tax_rate_defaults_to_the_document_rate() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;

    let mut custom = line("tipo reducido", "1", "10.00");
    custom.tax_rate = Some(dec("10.00"));
    let invoice = app
        .draft(&series, vec![line("normal", "1", "10.00"), custom])
        .await;

    let lines = app
        .store
        .get_lines(app.tenant, invoice.invoice_id)
        .await
        .unwrap();
    assert_eq!(lines[0].tax_rate, dec("21.00"));
    assert_eq!(lines[1].tax_rate, dec("10.00"));
}

#[tokio::test]
async fn lines_keep_input_order_and_explicit_order_wins() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;

    let mut last_first = line("goes last", "1", "1.00");
    last_first.sort_order = Some(9);
    let invoice = app
        .draft(
            &series,
            vec![last_first, line("second", "1", "1.00"), line("third", "1", "1.00")],
        )
        .await;

    let lines = app
        .store
        .get_lines(app.tenant, invoice.invoice_id)
        .await
        .unwrap();
    let descriptions: Vec<&str> = lines.iter().map(|l| l.description.as_str()).collect();
    assert_eq!(descriptions, vec!["second", "third", "goes last"]);
}

#[tokio::test]
async fn adding_a_line_recomputes_header_totals() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    let invoice = app.draft(&series, vec![line("a", "1", "100.00")]).await;
    assert_eq!(invoice.total, dec("121.00"));

    app.invoices
        .add_line(app.tenant, invoice.invoice_id, line("b", "1", "100.00"))
        .await
        .unwrap()
        .unwrap();

    let reloaded = app
        .store
        .get_invoice(app.tenant, invoice.invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.subtotal, dec("200.00"));
    assert_eq!(reloaded.tax_amount, dec("42.00"));
    assert_eq!(reloaded.total, dec("242.00"));
}

#[tokio::test]
async fn updating_a_line_recomputes_its_total_and_the_header() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    let invoice = app.draft(&series, vec![line("a", "1", "100.00")]).await;
    let lines = app
        .store
        .get_lines(app.tenant, invoice.invoice_id)
        .await
        .unwrap();

    let updated = app
        .invoices
        .update_line(
            app.tenant,
            invoice.invoice_id,
            lines[0].line_id,
            UpdateLine {
                quantity: Some(dec("3")),
                ..UpdateLine::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.total, dec("300.00"));

    let reloaded = app
        .store
        .get_invoice(app.tenant, invoice.invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.subtotal, dec("300.00"));
    assert_eq!(reloaded.tax_amount, dec("63.00"));
    assert_eq!(reloaded.total, dec("363.00"));
}

#[tokio::test]
async fn a_noop_update_leaves_totals_unchanged() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    let invoice = app
        .draft(&series, vec![line_with_discount("a", "3", "19.99", "5")])
        .await;
    let lines = app
        .store
        .get_lines(app.tenant, invoice.invoice_id)
        .await
        .unwrap();

    app.invoices
        .update_line(
            app.tenant,
            invoice.invoice_id,
            lines[0].line_id,
            UpdateLine::default(),
        )
        .await
        .unwrap()
        .unwrap();

    let reloaded = app
        .store
        .get_invoice(app.tenant, invoice.invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.subtotal, invoice.subtotal);
    assert_eq!(reloaded.tax_amount, invoice.tax_amount);
    assert_eq!(reloaded.total, invoice.total);
}

#[tokio::test]
async fn removing_a_line_recomputes_header_totals() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    let invoice = app
        .draft(&series, vec![line("a", "1", "100.00"), line("b", "1", "50.00")])
        .await;
    let lines = app
        .store
        .get_lines(app.tenant, invoice.invoice_id)
        .await
        .unwrap();

    let removed = app
        .invoices
        .remove_line(app.tenant, invoice.invoice_id, lines[1].line_id)
        .await
        .unwrap();
    assert!(removed);

    let reloaded = app
        .store
        .get_invoice(app.tenant, invoice.invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.subtotal, dec("100.00"));
    assert_eq!(reloaded.total, dec("121.00"));

    let remaining = app
        .store
        .get_lines(app.tenant, invoice.invoice_id)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn line_mutations_on_issued_documents_are_refused() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    let invoice = app.draft(&series, vec![line("a", "1", "100.00")]).await;
    let lines = app
        .store
        .get_lines(app.tenant, invoice.invoice_id)
        .await
        .unwrap();

    app.invoices
        .issue_document(app.tenant, invoice.invoice_id)
        .await
        .unwrap();

    let add = app
        .invoices
        .add_line(app.tenant, invoice.invoice_id, line("b", "1", "1.00"))
        .await;
    assert!(matches!(add, Err(AppError::BadRequest(_))));

    let remove = app
        .invoices
        .remove_line(app.tenant, invoice.invoice_id, lines[0].line_id)
        .await;
    assert!(matches!(remove, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn fractional_quantities_round_to_money_precision() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;

    // 1.333 x 9.99 = 13.31667 -> 13.32
    let invoice = app.draft(&series, vec![line("a", "1.333", "9.99")]).await;
    let lines = app
        .store
        .get_lines(app.tenant, invoice.invoice_id)
        .await
        .unwrap();
    assert_eq!(lines[0].total, dec("13.32"));
    assert_eq!(invoice.subtotal, dec("13.32"));
    // 13.32 * 21% = 2.7972 -> 2.80
    assert_eq!(invoice.tax_amount, dec("2.80"));
    assert_eq!(invoice.total, dec("16.12"));
}

#[tokio::test]
async fn empty_line_descriptions_fail_validation() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    let invoice = app.draft(&series, vec![line("a", "1", "1.00")]).await;

    let bad: LineDraft = line("", "1", "1.00");
    let result = app
        .invoices
        .add_line(app.tenant, invoice.invoice_id, bad)
        .await;
    assert!(matches!(result, Err(AppError::ValidationError(_))));
}
