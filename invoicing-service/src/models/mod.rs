//! Domain models for invoicing-service.

mod invoice;
mod line;
mod series;
mod settings;

pub use invoice::{
    CreateDocument, CustomerSnapshot, DashboardSummary, Invoice, InvoiceFilter, InvoicePage,
    InvoiceSort, InvoiceStatus, InvoiceType, NewInvoice, PaymentInput, SortDir, Transition,
};
pub use line::{InvoiceLine, LineDraft, NewInvoiceLine, UpdateLine};
pub use series::{format_number, CreateSeries, InvoiceSeries, SeriesUsage, UpdateSeries};
pub use settings::{InvoicingSettings, SettingsForm, SettingsUpdate};
