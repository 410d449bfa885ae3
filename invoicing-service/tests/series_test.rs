//! Series management tests: uniqueness, the single-default invariant, and
//! the referential deletion guard.

mod common;

use common::{line, TestApp};
use invoicing_service::models::{CreateSeries, UpdateSeries};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

fn series_input(tenant: Uuid, prefix: &str, is_default: bool) -> CreateSeries {
    CreateSeries {
        tenant_id: tenant,
        prefix: prefix.to_string(),
        name: format!("{prefix} series"),
        description: None,
        number_digits: 6,
        is_active: true,
        is_default,
    }
}

#[tokio::test]
async fn duplicate_prefix_is_rejected() {
    let app = TestApp::new();
    app.series("F", 6).await;

    let err = app
        .store
        .create_series(&series_input(app.tenant, "F", false))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn same_prefix_is_allowed_across_tenants() {
    let app = TestApp::new();
    app.series("F", 6).await;

    let other_tenant = Uuid::new_v4();
    let result = app
        .store
        .create_series(&series_input(other_tenant, "F", false))
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn creating_a_default_series_clears_the_previous_default() {
    let app = TestApp::new();
    let a = app
        .store
        .create_series(&series_input(app.tenant, "A", true))
        .await
        .unwrap();
    let b = app
        .store
        .create_series(&series_input(app.tenant, "B", true))
        .await
        .unwrap();

    let listed = app.store.list_series(app.tenant).await.unwrap();
    let defaults: Vec<_> = listed
        .iter()
        .filter(|usage| usage.series.is_default)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].series.series_id, b.series_id);

    let a_reloaded = app
        .store
        .get_series(app.tenant, a.series_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!a_reloaded.is_default);
}

#[tokio::test]
async fn set_default_moves_the_flag() {
    let app = TestApp::new();
    let a = app.series("A", 6).await;
    let b = app.series("B", 6).await;

    app.store
        .set_default_series(app.tenant, a.series_id)
        .await
        .unwrap()
        .unwrap();
    app.store
        .set_default_series(app.tenant, b.series_id)
        .await
        .unwrap()
        .unwrap();

    let listed = app.store.list_series(app.tenant).await.unwrap();
    let defaults: Vec<_> = listed
        .iter()
        .filter(|usage| usage.series.is_default)
        .map(|usage| usage.series.series_id)
        .collect();
    assert_eq!(defaults, vec![b.series_id]);
}

#[tokio::test]
async fn toggle_flips_the_active_flag() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    assert!(series.is_active);

    let toggled = app
        .store
        .toggle_series(app.tenant, series.series_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!toggled.is_active);

    let toggled_back = app
        .store
        .toggle_series(app.tenant, series.series_id)
        .await
        .unwrap()
        .unwrap();
    assert!(toggled_back.is_active);
}

#[tokio::test]
async fn edit_updates_name_and_digits_but_not_the_counter() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    app.store
        .allocate_number(app.tenant, series.series_id)
        .await
        .unwrap();

    let updated = app
        .store
        .update_series(
            app.tenant,
            series.series_id,
            &UpdateSeries {
                name: Some("Facturas 2026".to_string()),
                number_digits: Some(4),
                ..UpdateSeries::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.name, "Facturas 2026");
    assert_eq!(updated.number_digits, 4);
    assert_eq!(updated.next_number, 2);
}

#[tokio::test]
async fn deleting_an_unused_series_succeeds() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;

    assert!(app
        .store
        .delete_series(app.tenant, series.series_id)
        .await
        .unwrap());

    assert!(app
        .store
        .get_series(app.tenant, series.series_id)
        .await
        .unwrap()
        .is_none());
    assert!(app.store.list_series(app.tenant).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_referenced_series_is_a_conflict_even_when_cancelled() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    let document = app.draft(&series, vec![line("a", "1", "10.00")]).await;

    app.invoices
        .cancel_document(app.tenant, document.invoice_id)
        .await
        .unwrap();

    let err = app
        .store
        .delete_series(app.tenant, series.series_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn deleted_series_cannot_allocate() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    app.store
        .delete_series(app.tenant, series.series_id)
        .await
        .unwrap();

    let number = app
        .store
        .allocate_number(app.tenant, series.series_id)
        .await
        .unwrap();
    assert!(number.is_none());
}

#[tokio::test]
async fn series_input_validation_rejects_bad_fields() {
    let tenant = Uuid::new_v4();

    let mut empty_prefix = series_input(tenant, "F", false);
    empty_prefix.prefix = String::new();
    assert!(empty_prefix.validate().is_err());

    let mut long_prefix = series_input(tenant, "F", false);
    long_prefix.prefix = "TOOLONGPREFIX".to_string();
    assert!(long_prefix.validate().is_err());

    let mut zero_digits = series_input(tenant, "F", false);
    zero_digits.number_digits = 0;
    assert!(zero_digits.validate().is_err());

    assert!(series_input(tenant, "F", false).validate().is_ok());
}

#[tokio::test]
async fn list_series_reports_document_counts() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;
    let other = app.series("T", 4).await;

    app.draft(&series, vec![line("a", "1", "10.00")]).await;
    app.draft(&series, vec![line("b", "1", "10.00")]).await;

    let listed = app.store.list_series(app.tenant).await.unwrap();
    let by_id = |id: Uuid| {
        listed
            .iter()
            .find(|usage| usage.series.series_id == id)
            .unwrap()
            .document_count
    };
    assert_eq!(by_id(series.series_id), 2);
    assert_eq!(by_id(other.series_id), 0);
}
