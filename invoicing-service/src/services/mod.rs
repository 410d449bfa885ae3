//! Services module for invoicing-service.

pub mod invoices;
pub mod metrics;

pub use invoices::InvoiceService;
pub use metrics::{get_metrics, init_metrics};
