//! Numbering series model for invoicing-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Invoice numbering series. Owns a monotonic counter and a formatting rule;
/// every issued document draws its permanent number from exactly one series.
///
/// Typical prefixes: F (invoices), R (rectifying invoices), T (tickets).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceSeries {
    pub series_id: Uuid,
    pub tenant_id: Uuid,
    pub prefix: String,
    pub name: String,
    pub description: Option<String>,
    /// Next counter value to hand out. Only ever increases, and only through
    /// number allocation.
    pub next_number: i64,
    /// Zero-pad width for the numeric part (6 -> "F000001").
    pub number_digits: i32,
    pub is_active: bool,
    pub is_default: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub deleted_utc: Option<DateTime<Utc>>,
}

impl InvoiceSeries {
    /// Format a counter value as a document number.
    pub fn format_number(&self, number: i64) -> String {
        format_number(&self.prefix, self.number_digits, number)
    }
}

/// `prefix` + zero-padded `number`. Numbers wider than `number_digits` are
/// kept intact rather than truncated.
pub fn format_number(prefix: &str, number_digits: i32, number: i64) -> String {
    format!(
        "{}{:0width$}",
        prefix,
        number,
        width = number_digits.max(0) as usize
    )
}

/// Input for creating a series.
#[derive(Debug, Clone, Validate)]
pub struct CreateSeries {
    pub tenant_id: Uuid,
    #[validate(length(min = 1, max = 10))]
    pub prefix: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 10))]
    pub number_digits: i32,
    pub is_active: bool,
    pub is_default: bool,
}

/// Input for editing a series. The counter is deliberately absent: it is only
/// mutated through allocation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateSeries {
    #[validate(length(min = 1, max = 10))]
    pub prefix: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 10))]
    pub number_digits: Option<i32>,
    pub is_active: Option<bool>,
    pub is_default: Option<bool>,
}

/// A series together with the number of live documents drawn against it,
/// as shown on the series screen.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesUsage {
    pub series: InvoiceSeries,
    pub document_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_pads_to_width() {
        assert_eq!(format_number("F", 6, 1), "F000001");
        assert_eq!(format_number("R", 4, 1), "R0001");
        assert_eq!(format_number("T", 1, 7), "T7");
    }

    #[test]
    fn format_keeps_overflowing_numbers_intact() {
        assert_eq!(format_number("F", 4, 123456), "F123456");
    }
}
