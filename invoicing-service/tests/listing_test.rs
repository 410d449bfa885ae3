//! Listing, search and dashboard query tests.

mod common;

use common::{create_document_input, dec, line, TestApp};
use invoicing_service::models::{
    InvoiceFilter, InvoiceSort, InvoiceStatus, SortDir,
};

#[tokio::test]
async fn listing_filters_by_status_and_search() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;

    let issued = app.draft(&series, vec![line("a", "1", "10.00")]).await;
    app.invoices
        .issue_document(app.tenant, issued.invoice_id)
        .await
        .unwrap();
    app.draft(&series, vec![line("b", "1", "20.00")]).await;

    let drafts = app
        .store
        .list_invoices(
            app.tenant,
            &InvoiceFilter {
                status: Some(InvoiceStatus::Draft),
                ..InvoiceFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(drafts.total, 1);
    assert_eq!(drafts.invoices[0].status, "draft");

    let by_number = app
        .store
        .list_invoices(
            app.tenant,
            &InvoiceFilter {
                search: Some("F000001".to_string()),
                ..InvoiceFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_number.total, 1);
    assert_eq!(by_number.invoices[0].invoice_id, issued.invoice_id);

    let by_customer = app
        .store
        .list_invoices(
            app.tenant,
            &InvoiceFilter {
                search: Some("ejemplo".to_string()),
                ..InvoiceFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_customer.total, 2);
}

#[tokio::test]
async fn listing_paginates_and_sorts() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;

    for i in 1..=5 {
        app.draft(&series, vec![line("x", "1", &format!("{i}0.00"))])
            .await;
    }

    let page = app
        .store
        .list_invoices(
            app.tenant,
            &InvoiceFilter {
                sort: InvoiceSort::Total,
                dir: SortDir::Asc,
                page: 1,
                per_page: 2,
                ..InvoiceFilter::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(page.total, 5);
    assert_eq!(page.invoices.len(), 2);
    assert_eq!(page.invoices[0].subtotal, dec("10.00"));
    assert_eq!(page.invoices[1].subtotal, dec("20.00"));

    let last_page = app
        .store
        .list_invoices(
            app.tenant,
            &InvoiceFilter {
                sort: InvoiceSort::Total,
                dir: SortDir::Asc,
                page: 3,
                per_page: 2,
                ..InvoiceFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(last_page.invoices.len(), 1);
    assert_eq!(last_page.invoices[0].subtotal, dec("50.00"));
}

#[tokio::test]
async fn search_returns_only_issued_or_paid_documents() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;

    let issued = app.draft(&series, vec![line("a", "1", "10.00")]).await;
    app.invoices
        .issue_document(app.tenant, issued.invoice_id)
        .await
        .unwrap();
    app.draft(&series, vec![line("b", "1", "20.00")]).await; // stays draft

    let hits = app
        .invoices
        .search_documents(app.tenant, "F0000")
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].invoice_id, issued.invoice_id);

    // Short queries return nothing.
    let short = app.invoices.search_documents(app.tenant, "F").await.unwrap();
    assert!(short.is_empty());
}

#[tokio::test]
async fn dashboard_counts_statuses_and_monthly_volume() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;

    app.draft(&series, vec![line("draft", "1", "10.00")]).await;

    let issued = app.draft(&series, vec![line("issued", "1", "100.00")]).await;
    app.invoices
        .issue_document(app.tenant, issued.invoice_id)
        .await
        .unwrap();

    let paid = app.draft(&series, vec![line("paid", "1", "200.00")]).await;
    app.invoices
        .issue_document(app.tenant, paid.invoice_id)
        .await
        .unwrap();
    app.invoices
        .pay_document(app.tenant, paid.invoice_id, Default::default())
        .await
        .unwrap();

    let summary = app.invoices.dashboard(app.tenant).await.unwrap();

    assert_eq!(summary.draft_count, 1);
    assert_eq!(summary.issued_count, 1);
    assert_eq!(summary.paid_count, 1);
    assert_eq!(summary.monthly_count, 2);
    // 121.00 + 242.00 issued this month, of which 242.00 is paid.
    assert_eq!(summary.monthly_total, dec("363.00"));
    assert_eq!(summary.monthly_paid_total, dec("242.00"));
    assert_eq!(summary.recent.len(), 3);
}

#[tokio::test]
async fn deleted_documents_disappear_from_listings() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    let draft = app.draft(&series, vec![line("a", "1", "10.00")]).await;

    app.invoices
        .delete_document(app.tenant, draft.invoice_id)
        .await
        .unwrap();

    let page = app
        .store
        .list_invoices(app.tenant, &InvoiceFilter::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);

    let summary = app.invoices.dashboard(app.tenant).await.unwrap();
    assert_eq!(summary.draft_count, 0);
    assert!(summary.recent.is_empty());
}

#[tokio::test]
async fn listings_are_tenant_scoped() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    app.draft(&series, vec![line("a", "1", "10.00")]).await;

    let other_tenant = uuid::Uuid::new_v4();
    let other_series = app.series_for(other_tenant, "F", 6).await;
    let mut input = create_document_input(&other_series, vec![line("b", "1", "20.00")]);
    input.customer.name = "Otro Cliente".to_string();
    app.invoices
        .create_document(other_tenant, input)
        .await
        .unwrap();

    let mine = app
        .store
        .list_invoices(app.tenant, &InvoiceFilter::default())
        .await
        .unwrap();
    assert_eq!(mine.total, 1);
    assert_eq!(mine.invoices[0].customer_name, "Cliente Ejemplo SL");
}
