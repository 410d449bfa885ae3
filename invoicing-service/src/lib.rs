//! invoicing-service: invoice lifecycle, numbering series and totals engine
//! for multi-tenant back-office operations.
//!
//! The hard core is the numbering and totals engine: gap-free sequential
//! document numbers per series (`store`), and the decimal arithmetic deriving
//! line and document totals (`totals`). Everything else is ordinary
//! record-management plumbing around it.

pub mod config;
pub mod events;
pub mod hooks;
pub mod http;
pub mod models;
pub mod services;
pub mod startup;
pub mod store;
pub mod totals;
