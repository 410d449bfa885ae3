//! Per-tenant settings tests: get-or-create, typed updates, reset, and the
//! require-customer policy.

mod common;

use common::{create_document_input, line, TestApp};
use invoicing_service::models::{SettingsForm, SettingsUpdate};
use service_core::error::AppError;
use uuid::Uuid;

#[tokio::test]
async fn first_access_creates_defaults() {
    let app = TestApp::new();
    let settings = app
        .store
        .get_or_create_settings(app.tenant)
        .await
        .unwrap();

    assert_eq!(settings.tenant_id, app.tenant);
    assert_eq!(settings.default_series_prefix, "F");
    assert!(!settings.auto_generate_invoice);
    assert!(settings.require_customer);
}

#[tokio::test]
async fn repeated_access_returns_the_same_row() {
    let app = TestApp::new();
    let first = app.store.get_or_create_settings(app.tenant).await.unwrap();
    let second = app.store.get_or_create_settings(app.tenant).await.unwrap();
    assert_eq!(first.settings_id, second.settings_id);
}

#[tokio::test]
async fn tenants_do_not_share_settings() {
    let app = TestApp::new();
    let other = Uuid::new_v4();

    app.store
        .apply_settings_update(app.tenant, &SettingsUpdate::CompanyName("Mine".to_string()))
        .await
        .unwrap();

    let theirs = app.store.get_or_create_settings(other).await.unwrap();
    assert!(theirs.company_name.is_empty());
}

#[tokio::test]
async fn typed_updates_change_exactly_one_field() {
    let app = TestApp::new();

    let updated = app
        .store
        .apply_settings_update(
            app.tenant,
            &SettingsUpdate::CompanyName("ACME SL".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(updated.company_name, "ACME SL");

    let updated = app
        .store
        .apply_settings_update(app.tenant, &SettingsUpdate::AutoGenerateInvoice(true))
        .await
        .unwrap();
    assert!(updated.auto_generate_invoice);
    assert_eq!(updated.company_name, "ACME SL");
    assert!(updated.require_customer);
}

#[tokio::test]
async fn save_persists_the_whole_form() {
    let app = TestApp::new();

    let saved = app
        .store
        .save_settings(
            app.tenant,
            &SettingsForm {
                company_name: "ACME SL".to_string(),
                company_tax_id: "B00000000".to_string(),
                company_address: "Calle Mayor 1".to_string(),
                company_phone: "600000000".to_string(),
                company_email: "facturas@acme.example".to_string(),
                default_series_prefix: "A".to_string(),
                auto_generate_invoice: true,
                require_customer: false,
                invoice_footer: "Gracias".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(saved.company_name, "ACME SL");
    assert_eq!(saved.default_series_prefix, "A");
    assert!(saved.auto_generate_invoice);
    assert!(!saved.require_customer);

    let reloaded = app.store.get_or_create_settings(app.tenant).await.unwrap();
    assert_eq!(reloaded.invoice_footer, "Gracias");
}

#[tokio::test]
async fn reset_restores_defaults_in_place() {
    let app = TestApp::new();
    app.store
        .apply_settings_update(
            app.tenant,
            &SettingsUpdate::CompanyName("ACME SL".to_string()),
        )
        .await
        .unwrap();
    app.store
        .apply_settings_update(app.tenant, &SettingsUpdate::RequireCustomer(false))
        .await
        .unwrap();

    let reset = app.store.reset_settings(app.tenant).await.unwrap();
    assert!(reset.company_name.is_empty());
    assert_eq!(reset.default_series_prefix, "F");
    assert!(reset.require_customer);
}

#[tokio::test]
async fn require_customer_setting_gates_document_creation() {
    let app = TestApp::new();
    let series = app.series("F", 6).await;

    let mut input = create_document_input(&series, vec![line("a", "1", "10.00")]);
    input.customer.name = String::new();

    // Default settings require a customer.
    let rejected = app.invoices.create_document(app.tenant, input.clone()).await;
    assert!(matches!(rejected, Err(AppError::BadRequest(_))));

    app.store
        .apply_settings_update(app.tenant, &SettingsUpdate::RequireCustomer(false))
        .await
        .unwrap();

    let created = app.invoices.create_document(app.tenant, input).await;
    assert!(created.is_ok());
}
