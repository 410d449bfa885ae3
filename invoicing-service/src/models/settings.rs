//! Per-tenant invoicing settings for invoicing-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Per-tenant invoicing configuration: company data printed on documents and
/// a couple of behavioral flags. One row per tenant, fetched through
/// get-or-create.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoicingSettings {
    pub settings_id: Uuid,
    pub tenant_id: Uuid,
    pub company_name: String,
    pub company_tax_id: String,
    pub company_address: String,
    pub company_phone: String,
    pub company_email: String,
    pub default_series_prefix: String,
    pub auto_generate_invoice: bool,
    pub require_customer: bool,
    pub invoice_footer: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl InvoicingSettings {
    /// Fresh defaults for a tenant that has no settings row yet.
    pub fn defaults(tenant_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            settings_id: Uuid::new_v4(),
            tenant_id,
            company_name: String::new(),
            company_tax_id: String::new(),
            company_address: String::new(),
            company_phone: String::new(),
            company_email: String::new(),
            default_series_prefix: "F".to_string(),
            auto_generate_invoice: false,
            require_customer: true,
            invoice_footer: String::new(),
            created_utc: now,
            updated_utc: now,
        }
    }
}

/// Full settings form, as submitted by the settings screen.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SettingsForm {
    #[validate(length(max = 255))]
    pub company_name: String,
    #[validate(length(max = 50))]
    pub company_tax_id: String,
    pub company_address: String,
    #[validate(length(max = 50))]
    pub company_phone: String,
    #[validate(length(max = 255))]
    pub company_email: String,
    #[validate(length(min = 1, max = 10))]
    pub default_series_prefix: String,
    pub auto_generate_invoice: bool,
    pub require_customer: bool,
    pub invoice_footer: String,
}

/// Single-field settings update. A closed set of typed operations, one per
/// actual field; there is no update-by-field-name path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum SettingsUpdate {
    CompanyName(String),
    CompanyTaxId(String),
    CompanyAddress(String),
    CompanyPhone(String),
    CompanyEmail(String),
    DefaultSeriesPrefix(String),
    InvoiceFooter(String),
    AutoGenerateInvoice(bool),
    RequireCustomer(bool),
}

impl SettingsUpdate {
    /// Apply this update to a settings aggregate in place.
    pub fn apply(&self, settings: &mut InvoicingSettings) {
        match self {
            SettingsUpdate::CompanyName(v) => settings.company_name = v.clone(),
            SettingsUpdate::CompanyTaxId(v) => settings.company_tax_id = v.clone(),
            SettingsUpdate::CompanyAddress(v) => settings.company_address = v.clone(),
            SettingsUpdate::CompanyPhone(v) => settings.company_phone = v.clone(),
            SettingsUpdate::CompanyEmail(v) => settings.company_email = v.clone(),
            SettingsUpdate::DefaultSeriesPrefix(v) => {
                settings.default_series_prefix = v.clone()
            }
            SettingsUpdate::InvoiceFooter(v) => settings.invoice_footer = v.clone(),
            SettingsUpdate::AutoGenerateInvoice(v) => settings.auto_generate_invoice = *v,
            SettingsUpdate::RequireCustomer(v) => settings.require_customer = *v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_module_defaults() {
        let s = InvoicingSettings::defaults(Uuid::new_v4());
        assert_eq!(s.default_series_prefix, "F");
        assert!(!s.auto_generate_invoice);
        assert!(s.require_customer);
        assert!(s.company_name.is_empty());
    }

    #[test]
    fn update_applies_to_named_field_only() {
        let mut s = InvoicingSettings::defaults(Uuid::new_v4());
        SettingsUpdate::CompanyName("ACME SL".to_string()).apply(&mut s);
        SettingsUpdate::AutoGenerateInvoice(true).apply(&mut s);
        assert_eq!(s.company_name, "ACME SL");
        assert!(s.auto_generate_invoice);
        assert!(s.require_customer);
    }

    #[test]
    fn update_deserializes_from_tagged_json() {
        let u: SettingsUpdate =
            serde_json::from_str(r#"{"field":"require_customer","value":false}"#).unwrap();
        assert_eq!(u, SettingsUpdate::RequireCustomer(false));
    }
}
