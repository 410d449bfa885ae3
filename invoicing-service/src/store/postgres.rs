//! PostgreSQL store for invoicing-service.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::models::{
    CreateSeries, DashboardSummary, Invoice, InvoiceFilter, InvoiceLine, InvoicePage,
    InvoiceSeries, InvoiceSort, InvoiceStatus, InvoicingSettings, NewInvoice, NewInvoiceLine,
    PaymentInput, SeriesUsage, SettingsForm, SettingsUpdate, SortDir, Transition, UpdateLine,
    UpdateSeries,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::store::InvoicingStore;
use crate::totals;

use tracing::{info, instrument};

/// PostgreSQL-backed implementation of `InvoicingStore`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .idle_timeout(std::time::Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'_, Postgres>, AppError> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to begin transaction: {}", e)))
    }

    /// Recompute the header totals of a document from its live lines, inside
    /// the caller's transaction.
    async fn recalculate_totals_tx(
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: Uuid,
    ) -> Result<(), AppError> {
        let line_totals: Vec<Decimal> = sqlx::query_scalar(
            r#"
            SELECT total FROM invoice_lines
            WHERE invoice_id = $1 AND deleted_utc IS NULL
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to load line totals: {}", e)))?;

        let tax_rate: Decimal =
            sqlx::query_scalar("SELECT tax_rate FROM invoices WHERE invoice_id = $1")
                .bind(invoice_id)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow!("Failed to load document tax rate: {}", e))
                })?;

        let computed = totals::document_totals(line_totals, tax_rate);

        sqlx::query(
            r#"
            UPDATE invoices
            SET subtotal = $2, tax_amount = $3, total = $4, updated_utc = NOW()
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .bind(computed.subtotal)
        .bind(computed.tax_amount)
        .bind(computed.total)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to persist totals: {}", e)))?;

        Ok(())
    }

    /// Lock and load a document header inside a transaction.
    async fn lock_invoice_tx(
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, tenant_id, series_id, number, invoice_type, status,
                issue_date, due_date, customer_name, customer_tax_id, customer_address,
                customer_email, customer_phone, customer_id, sale_id, employee_id,
                subtotal, tax_rate, tax_amount, total, payment_method, paid_amount,
                paid_utc, notes, rectified_invoice_id, created_utc, updated_utc, deleted_utc
            FROM invoices
            WHERE tenant_id = $1 AND invoice_id = $2 AND deleted_utc IS NULL
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to lock document: {}", e)))
    }

    async fn update_settings_text(
        &self,
        tenant_id: Uuid,
        column: &str,
        value: &str,
    ) -> Result<InvoicingSettings, AppError> {
        // Row is guaranteed by the caller's get-or-create. `column` comes
        // from a closed enum match, never from input.
        let query = format!(
            r#"
            UPDATE invoicing_settings
            SET {column} = $2, updated_utc = NOW()
            WHERE tenant_id = $1
            RETURNING settings_id, tenant_id, company_name, company_tax_id, company_address,
                company_phone, company_email, default_series_prefix, auto_generate_invoice,
                require_customer, invoice_footer, created_utc, updated_utc
            "#
        );
        sqlx::query_as::<_, InvoicingSettings>(&query)
            .bind(tenant_id)
            .bind(value)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to update settings: {}", e)))
    }

    async fn update_settings_bool(
        &self,
        tenant_id: Uuid,
        column: &str,
        value: bool,
    ) -> Result<InvoicingSettings, AppError> {
        let query = format!(
            r#"
            UPDATE invoicing_settings
            SET {column} = $2, updated_utc = NOW()
            WHERE tenant_id = $1
            RETURNING settings_id, tenant_id, company_name, company_tax_id, company_address,
                company_phone, company_email, default_series_prefix, auto_generate_invoice,
                require_customer, invoice_footer, created_utc, updated_utc
            "#
        );
        sqlx::query_as::<_, InvoicingSettings>(&query)
            .bind(tenant_id)
            .bind(value)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to update settings: {}", e)))
    }
}

#[async_trait]
impl InvoicingStore for PgStore {
    /// Check database health.
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Series
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, prefix = %input.prefix))]
    async fn create_series(&self, input: &CreateSeries) -> Result<InvoiceSeries, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_series"])
            .start_timer();

        let mut tx = self.begin().await?;

        if input.is_default {
            sqlx::query(
                r#"
                UPDATE invoice_series
                SET is_default = FALSE, updated_utc = NOW()
                WHERE tenant_id = $1 AND is_default = TRUE AND deleted_utc IS NULL
                "#,
            )
            .bind(input.tenant_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow!("Failed to clear default series: {}", e))
            })?;
        }

        let series_id = Uuid::new_v4();
        let series = sqlx::query_as::<_, InvoiceSeries>(
            r#"
            INSERT INTO invoice_series (
                series_id, tenant_id, prefix, name, description,
                number_digits, is_active, is_default
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING series_id, tenant_id, prefix, name, description, next_number,
                number_digits, is_active, is_default, created_utc, updated_utc, deleted_utc
            "#,
        )
        .bind(series_id)
        .bind(input.tenant_id)
        .bind(&input.prefix)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.number_digits)
        .bind(input.is_active)
        .bind(input.is_default)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow!(
                    "Series with prefix '{}' already exists",
                    input.prefix
                ))
            }
            _ => AppError::DatabaseError(anyhow!("Failed to create series: {}", e)),
        })?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        info!(series_id = %series.series_id, prefix = %series.prefix, "Series created");

        Ok(series)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, series_id = %series_id))]
    async fn get_series(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
    ) -> Result<Option<InvoiceSeries>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_series"])
            .start_timer();

        let series = sqlx::query_as::<_, InvoiceSeries>(
            r#"
            SELECT series_id, tenant_id, prefix, name, description, next_number,
                number_digits, is_active, is_default, created_utc, updated_utc, deleted_utc
            FROM invoice_series
            WHERE tenant_id = $1 AND series_id = $2 AND deleted_utc IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(series_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to get series: {}", e)))?;

        timer.observe_duration();

        Ok(series)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn list_series(&self, tenant_id: Uuid) -> Result<Vec<SeriesUsage>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_series"])
            .start_timer();

        let series = sqlx::query_as::<_, InvoiceSeries>(
            r#"
            SELECT series_id, tenant_id, prefix, name, description, next_number,
                number_digits, is_active, is_default, created_utc, updated_utc, deleted_utc
            FROM invoice_series
            WHERE tenant_id = $1 AND deleted_utc IS NULL
            ORDER BY prefix
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to list series: {}", e)))?;

        let counts: Vec<(Uuid, i64)> = sqlx::query_as(
            r#"
            SELECT series_id, COUNT(*)
            FROM invoices
            WHERE tenant_id = $1 AND deleted_utc IS NULL
            GROUP BY series_id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to count documents: {}", e)))?;

        timer.observe_duration();

        Ok(series
            .into_iter()
            .map(|s| {
                let document_count = counts
                    .iter()
                    .find(|(id, _)| *id == s.series_id)
                    .map(|(_, n)| *n)
                    .unwrap_or(0);
                SeriesUsage {
                    series: s,
                    document_count,
                }
            })
            .collect())
    }

    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, series_id = %series_id))]
    async fn update_series(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
        input: &UpdateSeries,
    ) -> Result<Option<InvoiceSeries>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_series"])
            .start_timer();

        let mut tx = self.begin().await?;

        if input.is_default == Some(true) {
            sqlx::query(
                r#"
                UPDATE invoice_series
                SET is_default = FALSE, updated_utc = NOW()
                WHERE tenant_id = $1 AND series_id <> $2
                  AND is_default = TRUE AND deleted_utc IS NULL
                "#,
            )
            .bind(tenant_id)
            .bind(series_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow!("Failed to clear default series: {}", e))
            })?;
        }

        let series = sqlx::query_as::<_, InvoiceSeries>(
            r#"
            UPDATE invoice_series
            SET prefix = COALESCE($3, prefix),
                name = COALESCE($4, name),
                description = COALESCE($5, description),
                number_digits = COALESCE($6, number_digits),
                is_active = COALESCE($7, is_active),
                is_default = COALESCE($8, is_default),
                updated_utc = NOW()
            WHERE tenant_id = $1 AND series_id = $2 AND deleted_utc IS NULL
            RETURNING series_id, tenant_id, prefix, name, description, next_number,
                number_digits, is_active, is_default, created_utc, updated_utc, deleted_utc
            "#,
        )
        .bind(tenant_id)
        .bind(series_id)
        .bind(&input.prefix)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.number_digits)
        .bind(input.is_active)
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow!("Series prefix already in use"))
            }
            _ => AppError::DatabaseError(anyhow!("Failed to update series: {}", e)),
        })?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        Ok(series)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, series_id = %series_id))]
    async fn set_default_series(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
    ) -> Result<Option<InvoiceSeries>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_default_series"])
            .start_timer();

        // Clear-all-then-set runs inside one transaction so no reader ever
        // observes zero or two defaults.
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            UPDATE invoice_series
            SET is_default = FALSE, updated_utc = NOW()
            WHERE tenant_id = $1 AND series_id <> $2
              AND is_default = TRUE AND deleted_utc IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(series_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to clear default series: {}", e)))?;

        let series = sqlx::query_as::<_, InvoiceSeries>(
            r#"
            UPDATE invoice_series
            SET is_default = TRUE, updated_utc = NOW()
            WHERE tenant_id = $1 AND series_id = $2 AND deleted_utc IS NULL
            RETURNING series_id, tenant_id, prefix, name, description, next_number,
                number_digits, is_active, is_default, created_utc, updated_utc, deleted_utc
            "#,
        )
        .bind(tenant_id)
        .bind(series_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to set default series: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        Ok(series)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, series_id = %series_id))]
    async fn toggle_series(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
    ) -> Result<Option<InvoiceSeries>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["toggle_series"])
            .start_timer();

        let series = sqlx::query_as::<_, InvoiceSeries>(
            r#"
            UPDATE invoice_series
            SET is_active = NOT is_active, updated_utc = NOW()
            WHERE tenant_id = $1 AND series_id = $2 AND deleted_utc IS NULL
            RETURNING series_id, tenant_id, prefix, name, description, next_number,
                number_digits, is_active, is_default, created_utc, updated_utc, deleted_utc
            "#,
        )
        .bind(tenant_id)
        .bind(series_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to toggle series: {}", e)))?;

        timer.observe_duration();

        Ok(series)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, series_id = %series_id))]
    async fn delete_series(&self, tenant_id: Uuid, series_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_series"])
            .start_timer();

        let mut tx = self.begin().await?;

        // Any live document of any status blocks deletion: numbers drawn from
        // the series must stay resolvable.
        let referenced: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM invoices
                WHERE tenant_id = $1 AND series_id = $2 AND deleted_utc IS NULL
            )
            "#,
        )
        .bind(tenant_id)
        .bind(series_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to check references: {}", e)))?;

        if referenced {
            return Err(AppError::Conflict(anyhow!(
                "Cannot delete series with existing documents"
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE invoice_series
            SET deleted_utc = NOW(), updated_utc = NOW()
            WHERE tenant_id = $1 AND series_id = $2 AND deleted_utc IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(series_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to delete series: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(series_id = %series_id, "Series deleted");
        }

        Ok(deleted)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, series_id = %series_id))]
    async fn allocate_number(
        &self,
        tenant_id: Uuid,
        series_id: Uuid,
    ) -> Result<Option<String>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["allocate_number"])
            .start_timer();

        // Row lock serializes concurrent allocations on the same series; the
        // read-increment-persist is one atomic unit.
        let mut tx = self.begin().await?;

        let series = sqlx::query_as::<_, InvoiceSeries>(
            r#"
            SELECT series_id, tenant_id, prefix, name, description, next_number,
                number_digits, is_active, is_default, created_utc, updated_utc, deleted_utc
            FROM invoice_series
            WHERE tenant_id = $1 AND series_id = $2 AND deleted_utc IS NULL
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(series_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to lock series: {}", e)))?;

        let Some(series) = series else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE invoice_series
            SET next_number = next_number + 1, updated_utc = NOW()
            WHERE series_id = $1
            "#,
        )
        .bind(series_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to advance counter: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        Ok(Some(series.format_number(series.next_number)))
    }

    // -------------------------------------------------------------------------
    // Documents
    // -------------------------------------------------------------------------

    #[instrument(skip(self, header, lines), fields(tenant_id = %header.tenant_id))]
    async fn create_invoice(
        &self,
        header: &NewInvoice,
        lines: &[NewInvoiceLine],
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice_id = Uuid::new_v4();
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                invoice_id, tenant_id, series_id, invoice_type, status, issue_date, due_date,
                customer_name, customer_tax_id, customer_address, customer_email, customer_phone,
                customer_id, sale_id, employee_id,
                subtotal, tax_rate, tax_amount, total, notes, rectified_invoice_id
            )
            VALUES ($1, $2, $3, $4, 'draft', $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20)
            RETURNING invoice_id, tenant_id, series_id, number, invoice_type, status,
                issue_date, due_date, customer_name, customer_tax_id, customer_address,
                customer_email, customer_phone, customer_id, sale_id, employee_id,
                subtotal, tax_rate, tax_amount, total, payment_method, paid_amount,
                paid_utc, notes, rectified_invoice_id, created_utc, updated_utc, deleted_utc
            "#,
        )
        .bind(invoice_id)
        .bind(header.tenant_id)
        .bind(header.series_id)
        .bind(header.invoice_type.as_str())
        .bind(header.issue_date)
        .bind(header.due_date)
        .bind(&header.customer.name)
        .bind(&header.customer.tax_id)
        .bind(&header.customer.address)
        .bind(&header.customer.email)
        .bind(&header.customer.phone)
        .bind(header.customer_id)
        .bind(header.sale_id)
        .bind(header.employee_id)
        .bind(header.subtotal)
        .bind(header.tax_rate)
        .bind(header.tax_amount)
        .bind(header.total)
        .bind(&header.notes)
        .bind(header.rectified_invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to create document: {}", e)))?;

        let created_base = Utc::now();
        for (idx, line) in lines.iter().enumerate() {
            // Staggered timestamps keep creation order as the ordering
            // tie-breaker for equal sort_order values.
            let created_utc = created_base + Duration::microseconds(idx as i64);
            sqlx::query(
                r#"
                INSERT INTO invoice_lines (
                    line_id, invoice_id, tenant_id, product_id, product_sku, description,
                    quantity, unit_price, discount_percent, tax_rate, total, sort_order,
                    created_utc, updated_utc
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(header.tenant_id)
            .bind(line.product_id)
            .bind(&line.product_sku)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.discount_percent)
            .bind(line.tax_rate)
            .bind(line.total)
            .bind(line.sort_order)
            .bind(created_utc)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to create line: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        info!(invoice_id = %invoice.invoice_id, lines = lines.len(), "Draft document created");

        Ok(invoice)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn get_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, tenant_id, series_id, number, invoice_type, status,
                issue_date, due_date, customer_name, customer_tax_id, customer_address,
                customer_email, customer_phone, customer_id, sale_id, employee_id,
                subtotal, tax_rate, tax_amount, total, payment_method, paid_amount,
                paid_utc, notes, rectified_invoice_id, created_utc, updated_utc, deleted_utc
            FROM invoices
            WHERE tenant_id = $1 AND invoice_id = $2 AND deleted_utc IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to get document: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn get_lines(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceLine>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_lines"])
            .start_timer();

        let lines = sqlx::query_as::<_, InvoiceLine>(
            r#"
            SELECT line_id, invoice_id, tenant_id, product_id, product_sku, description,
                quantity, unit_price, discount_percent, tax_rate, total, sort_order,
                created_utc, updated_utc, deleted_utc
            FROM invoice_lines
            WHERE tenant_id = $1 AND invoice_id = $2 AND deleted_utc IS NULL
            ORDER BY sort_order, created_utc
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to get lines: {}", e)))?;

        timer.observe_duration();

        Ok(lines)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    async fn list_invoices(
        &self,
        tenant_id: Uuid,
        filter: &InvoiceFilter,
    ) -> Result<InvoicePage, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let per_page = filter.per_page.clamp(1, 100);
        let page = filter.page.max(1);
        let offset = (page - 1) * per_page;
        let status = filter.status.map(|s| s.as_str().to_string());
        let invoice_type = filter.invoice_type.map(|t| t.as_str().to_string());

        // Sort column and direction come from closed enums, never from input.
        let order_column = match filter.sort {
            InvoiceSort::Number => "number",
            InvoiceSort::IssueDate => "issue_date",
            InvoiceSort::Customer => "customer_name",
            InvoiceSort::Total => "total",
            InvoiceSort::Created => "created_utc",
        };
        let order_dir = match filter.dir {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        };

        let where_clause = r#"
            FROM invoices
            WHERE tenant_id = $1 AND deleted_utc IS NULL
              AND ($2::text IS NULL
                   OR number ILIKE '%' || $2 || '%'
                   OR customer_name ILIKE '%' || $2 || '%'
                   OR customer_tax_id ILIKE '%' || $2 || '%')
              AND ($3::varchar IS NULL OR status = $3)
              AND ($4::varchar IS NULL OR invoice_type = $4)
        "#;

        let list_query = format!(
            r#"
            SELECT invoice_id, tenant_id, series_id, number, invoice_type, status,
                issue_date, due_date, customer_name, customer_tax_id, customer_address,
                customer_email, customer_phone, customer_id, sale_id, employee_id,
                subtotal, tax_rate, tax_amount, total, payment_method, paid_amount,
                paid_utc, notes, rectified_invoice_id, created_utc, updated_utc, deleted_utc
            {where_clause}
            ORDER BY {order_column} {order_dir}
            LIMIT $5 OFFSET $6
            "#
        );

        let invoices = sqlx::query_as::<_, Invoice>(&list_query)
            .bind(tenant_id)
            .bind(&filter.search)
            .bind(&status)
            .bind(&invoice_type)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to list documents: {}", e)))?;

        let count_query = format!("SELECT COUNT(*) {where_clause}");
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(tenant_id)
            .bind(&filter.search)
            .bind(&status)
            .bind(&invoice_type)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to count documents: {}", e)))?;

        timer.observe_duration();

        Ok(InvoicePage {
            invoices,
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn search_issued(
        &self,
        tenant_id: Uuid,
        query: &str,
        limit: i64,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["search_issued"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, tenant_id, series_id, number, invoice_type, status,
                issue_date, due_date, customer_name, customer_tax_id, customer_address,
                customer_email, customer_phone, customer_id, sale_id, employee_id,
                subtotal, tax_rate, tax_amount, total, payment_method, paid_amount,
                paid_utc, notes, rectified_invoice_id, created_utc, updated_utc, deleted_utc
            FROM invoices
            WHERE tenant_id = $1 AND deleted_utc IS NULL
              AND status IN ('issued', 'paid')
              AND (number ILIKE '%' || $2 || '%' OR customer_name ILIKE '%' || $2 || '%')
            ORDER BY number
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to search documents: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn issue_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        issue_date: NaiveDate,
    ) -> Result<Transition, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["issue_invoice"])
            .start_timer();

        // Number allocation and the document update are one atomic unit: two
        // concurrent issues on the same series serialize on the series row
        // and can never observe the same counter value.
        let mut tx = self.begin().await?;

        let invoice = match Self::lock_invoice_tx(&mut tx, tenant_id, invoice_id).await? {
            Some(invoice) => invoice,
            None => return Ok(Transition::NotFound),
        };
        if invoice.status != InvoiceStatus::Draft.as_str() {
            return Ok(Transition::Rejected);
        }

        let series = sqlx::query_as::<_, InvoiceSeries>(
            r#"
            SELECT series_id, tenant_id, prefix, name, description, next_number,
                number_digits, is_active, is_default, created_utc, updated_utc, deleted_utc
            FROM invoice_series
            WHERE tenant_id = $1 AND series_id = $2 AND deleted_utc IS NULL
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(invoice.series_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to lock series: {}", e)))?
        .ok_or_else(|| {
            AppError::DatabaseError(anyhow!("Numbering series missing for document"))
        })?;

        sqlx::query(
            r#"
            UPDATE invoice_series
            SET next_number = next_number + 1, updated_utc = NOW()
            WHERE series_id = $1
            "#,
        )
        .bind(series.series_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to advance counter: {}", e)))?;

        let number = series.format_number(series.next_number);

        let issued = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET number = $3, status = 'issued', issue_date = $4, updated_utc = NOW()
            WHERE tenant_id = $1 AND invoice_id = $2
            RETURNING invoice_id, tenant_id, series_id, number, invoice_type, status,
                issue_date, due_date, customer_name, customer_tax_id, customer_address,
                customer_email, customer_phone, customer_id, sale_id, employee_id,
                subtotal, tax_rate, tax_amount, total, payment_method, paid_amount,
                paid_utc, notes, rectified_invoice_id, created_utc, updated_utc, deleted_utc
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(&number)
        .bind(issue_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to issue document: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        info!(invoice_id = %invoice_id, number = %number, "Document issued");

        Ok(Transition::Applied(issued))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn cancel_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Transition, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_invoice"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice = match Self::lock_invoice_tx(&mut tx, tenant_id, invoice_id).await? {
            Some(invoice) => invoice,
            None => return Ok(Transition::NotFound),
        };
        let status = InvoiceStatus::from_string(&invoice.status);
        if !matches!(status, InvoiceStatus::Draft | InvoiceStatus::Issued) {
            return Ok(Transition::Rejected);
        }

        // The assigned number, if any, stays on the document; numbers are
        // never recycled.
        let cancelled = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = 'cancelled', updated_utc = NOW()
            WHERE tenant_id = $1 AND invoice_id = $2
            RETURNING invoice_id, tenant_id, series_id, number, invoice_type, status,
                issue_date, due_date, customer_name, customer_tax_id, customer_address,
                customer_email, customer_phone, customer_id, sale_id, employee_id,
                subtotal, tax_rate, tax_amount, total, payment_method, paid_amount,
                paid_utc, notes, rectified_invoice_id, created_utc, updated_utc, deleted_utc
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to cancel document: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        info!(invoice_id = %invoice_id, "Document cancelled");

        Ok(Transition::Applied(cancelled))
    }

    #[instrument(skip(self, payment), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn mark_paid(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        payment: &PaymentInput,
    ) -> Result<Transition, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_paid"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice = match Self::lock_invoice_tx(&mut tx, tenant_id, invoice_id).await? {
            Some(invoice) => invoice,
            None => return Ok(Transition::NotFound),
        };
        if invoice.status != InvoiceStatus::Issued.as_str() {
            return Ok(Transition::Rejected);
        }

        let paid = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = 'paid',
                payment_method = $3,
                paid_amount = COALESCE($4, total),
                paid_utc = NOW(),
                updated_utc = NOW()
            WHERE tenant_id = $1 AND invoice_id = $2
            RETURNING invoice_id, tenant_id, series_id, number, invoice_type, status,
                issue_date, due_date, customer_name, customer_tax_id, customer_address,
                customer_email, customer_phone, customer_id, sale_id, employee_id,
                subtotal, tax_rate, tax_amount, total, payment_method, paid_amount,
                paid_utc, notes, rectified_invoice_id, created_utc, updated_utc, deleted_utc
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(&payment.payment_method)
        .bind(payment.amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to mark document paid: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        info!(invoice_id = %invoice_id, "Document marked paid");

        Ok(Transition::Applied(paid))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn delete_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Transition, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice = match Self::lock_invoice_tx(&mut tx, tenant_id, invoice_id).await? {
            Some(invoice) => invoice,
            None => return Ok(Transition::NotFound),
        };
        if invoice.status != InvoiceStatus::Draft.as_str() {
            return Ok(Transition::Rejected);
        }

        sqlx::query(
            r#"
            UPDATE invoice_lines
            SET deleted_utc = NOW(), updated_utc = NOW()
            WHERE invoice_id = $1 AND deleted_utc IS NULL
            "#,
        )
        .bind(invoice_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to delete lines: {}", e)))?;

        let deleted = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET deleted_utc = NOW(), updated_utc = NOW()
            WHERE tenant_id = $1 AND invoice_id = $2
            RETURNING invoice_id, tenant_id, series_id, number, invoice_type, status,
                issue_date, due_date, customer_name, customer_tax_id, customer_address,
                customer_email, customer_phone, customer_id, sale_id, employee_id,
                subtotal, tax_rate, tax_amount, total, payment_method, paid_amount,
                paid_utc, notes, rectified_invoice_id, created_utc, updated_utc, deleted_utc
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to delete document: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        info!(invoice_id = %invoice_id, "Draft document deleted");

        Ok(Transition::Applied(deleted))
    }

    #[instrument(skip(self, line), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn add_line(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        line: &NewInvoiceLine,
    ) -> Result<Option<InvoiceLine>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_line"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice = match Self::lock_invoice_tx(&mut tx, tenant_id, invoice_id).await? {
            Some(invoice) => invoice,
            None => return Ok(None),
        };
        if invoice.status != InvoiceStatus::Draft.as_str() {
            return Err(AppError::BadRequest(anyhow!(
                "Can only add lines to draft documents"
            )));
        }

        let row = sqlx::query_as::<_, InvoiceLine>(
            r#"
            INSERT INTO invoice_lines (
                line_id, invoice_id, tenant_id, product_id, product_sku, description,
                quantity, unit_price, discount_percent, tax_rate, total, sort_order
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING line_id, invoice_id, tenant_id, product_id, product_sku, description,
                quantity, unit_price, discount_percent, tax_rate, total, sort_order,
                created_utc, updated_utc, deleted_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(tenant_id)
        .bind(line.product_id)
        .bind(&line.product_sku)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.discount_percent)
        .bind(line.tax_rate)
        .bind(line.total)
        .bind(line.sort_order)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to add line: {}", e)))?;

        Self::recalculate_totals_tx(&mut tx, invoice_id).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        Ok(Some(row))
    }

    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, line_id = %line_id))]
    async fn update_line(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        line_id: Uuid,
        input: &UpdateLine,
    ) -> Result<Option<InvoiceLine>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_line"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice = match Self::lock_invoice_tx(&mut tx, tenant_id, invoice_id).await? {
            Some(invoice) => invoice,
            None => return Ok(None),
        };
        if invoice.status != InvoiceStatus::Draft.as_str() {
            return Err(AppError::BadRequest(anyhow!(
                "Can only update lines on draft documents"
            )));
        }

        let current = sqlx::query_as::<_, InvoiceLine>(
            r#"
            SELECT line_id, invoice_id, tenant_id, product_id, product_sku, description,
                quantity, unit_price, discount_percent, tax_rate, total, sort_order,
                created_utc, updated_utc, deleted_utc
            FROM invoice_lines
            WHERE tenant_id = $1 AND invoice_id = $2 AND line_id = $3 AND deleted_utc IS NULL
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(line_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to load line: {}", e)))?;

        let Some(current) = current else {
            return Ok(None);
        };

        let quantity = input.quantity.unwrap_or(current.quantity);
        let unit_price = input.unit_price.unwrap_or(current.unit_price);
        let discount_percent = input.discount_percent.unwrap_or(current.discount_percent);
        let total = totals::line_total(quantity, unit_price, discount_percent);

        let updated = sqlx::query_as::<_, InvoiceLine>(
            r#"
            UPDATE invoice_lines
            SET description = COALESCE($4, description),
                quantity = $5,
                unit_price = $6,
                discount_percent = $7,
                tax_rate = COALESCE($8, tax_rate),
                total = $9,
                sort_order = COALESCE($10, sort_order),
                updated_utc = NOW()
            WHERE tenant_id = $1 AND invoice_id = $2 AND line_id = $3
            RETURNING line_id, invoice_id, tenant_id, product_id, product_sku, description,
                quantity, unit_price, discount_percent, tax_rate, total, sort_order,
                created_utc, updated_utc, deleted_utc
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(line_id)
        .bind(&input.description)
        .bind(quantity)
        .bind(unit_price)
        .bind(discount_percent)
        .bind(input.tax_rate)
        .bind(total)
        .bind(input.sort_order)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to update line: {}", e)))?;

        Self::recalculate_totals_tx(&mut tx, invoice_id).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        Ok(Some(updated))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, line_id = %line_id))]
    async fn remove_line(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        line_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["remove_line"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice = match Self::lock_invoice_tx(&mut tx, tenant_id, invoice_id).await? {
            Some(invoice) => invoice,
            None => return Ok(false),
        };
        if invoice.status != InvoiceStatus::Draft.as_str() {
            return Err(AppError::BadRequest(anyhow!(
                "Can only remove lines from draft documents"
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE invoice_lines
            SET deleted_utc = NOW(), updated_utc = NOW()
            WHERE tenant_id = $1 AND invoice_id = $2 AND line_id = $3 AND deleted_utc IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(line_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to remove line: {}", e)))?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        Self::recalculate_totals_tx(&mut tx, invoice_id).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        Ok(true)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn dashboard(
        &self,
        tenant_id: Uuid,
        month_start: NaiveDate,
    ) -> Result<DashboardSummary, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["dashboard"])
            .start_timer();

        let (monthly_total, monthly_count, monthly_paid_total): (Decimal, i64, Decimal) =
            sqlx::query_as(
                r#"
                SELECT COALESCE(SUM(total), 0),
                       COUNT(*),
                       COALESCE(SUM(total) FILTER (WHERE status = 'paid'), 0)
                FROM invoices
                WHERE tenant_id = $1 AND deleted_utc IS NULL
                  AND status IN ('issued', 'paid')
                  AND issue_date >= $2
                "#,
            )
            .bind(tenant_id)
            .bind(month_start)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow!("Failed to load monthly stats: {}", e))
            })?;

        let (draft_count, issued_count, paid_count): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE status = 'draft'),
                   COUNT(*) FILTER (WHERE status = 'issued'),
                   COUNT(*) FILTER (WHERE status = 'paid')
            FROM invoices
            WHERE tenant_id = $1 AND deleted_utc IS NULL
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to load status counts: {}", e)))?;

        let recent = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, tenant_id, series_id, number, invoice_type, status,
                issue_date, due_date, customer_name, customer_tax_id, customer_address,
                customer_email, customer_phone, customer_id, sale_id, employee_id,
                subtotal, tax_rate, tax_amount, total, payment_method, paid_amount,
                paid_utc, notes, rectified_invoice_id, created_utc, updated_utc, deleted_utc
            FROM invoices
            WHERE tenant_id = $1 AND deleted_utc IS NULL
            ORDER BY created_utc DESC
            LIMIT 10
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to load recent documents: {}", e)))?;

        timer.observe_duration();

        Ok(DashboardSummary {
            monthly_total,
            monthly_count,
            monthly_paid_total,
            draft_count,
            issued_count,
            paid_count,
            recent,
        })
    }

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn get_or_create_settings(
        &self,
        tenant_id: Uuid,
    ) -> Result<InvoicingSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_or_create_settings"])
            .start_timer();

        // Upsert with a no-op update so the existing row comes back unchanged
        // when the tenant already has settings.
        let settings = sqlx::query_as::<_, InvoicingSettings>(
            r#"
            INSERT INTO invoicing_settings (settings_id, tenant_id)
            VALUES ($1, $2)
            ON CONFLICT (tenant_id)
                DO UPDATE SET updated_utc = invoicing_settings.updated_utc
            RETURNING settings_id, tenant_id, company_name, company_tax_id, company_address,
                company_phone, company_email, default_series_prefix, auto_generate_invoice,
                require_customer, invoice_footer, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to load settings: {}", e)))?;

        timer.observe_duration();

        Ok(settings)
    }

    #[instrument(skip(self, form), fields(tenant_id = %tenant_id))]
    async fn save_settings(
        &self,
        tenant_id: Uuid,
        form: &SettingsForm,
    ) -> Result<InvoicingSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["save_settings"])
            .start_timer();

        let settings = sqlx::query_as::<_, InvoicingSettings>(
            r#"
            INSERT INTO invoicing_settings (
                settings_id, tenant_id, company_name, company_tax_id, company_address,
                company_phone, company_email, default_series_prefix, auto_generate_invoice,
                require_customer, invoice_footer
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (tenant_id) DO UPDATE SET
                company_name = EXCLUDED.company_name,
                company_tax_id = EXCLUDED.company_tax_id,
                company_address = EXCLUDED.company_address,
                company_phone = EXCLUDED.company_phone,
                company_email = EXCLUDED.company_email,
                default_series_prefix = EXCLUDED.default_series_prefix,
                auto_generate_invoice = EXCLUDED.auto_generate_invoice,
                require_customer = EXCLUDED.require_customer,
                invoice_footer = EXCLUDED.invoice_footer,
                updated_utc = NOW()
            RETURNING settings_id, tenant_id, company_name, company_tax_id, company_address,
                company_phone, company_email, default_series_prefix, auto_generate_invoice,
                require_customer, invoice_footer, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&form.company_name)
        .bind(&form.company_tax_id)
        .bind(&form.company_address)
        .bind(&form.company_phone)
        .bind(&form.company_email)
        .bind(&form.default_series_prefix)
        .bind(form.auto_generate_invoice)
        .bind(form.require_customer)
        .bind(&form.invoice_footer)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to save settings: {}", e)))?;

        timer.observe_duration();

        Ok(settings)
    }

    #[instrument(skip(self, update), fields(tenant_id = %tenant_id))]
    async fn apply_settings_update(
        &self,
        tenant_id: Uuid,
        update: &SettingsUpdate,
    ) -> Result<InvoicingSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_settings_update"])
            .start_timer();

        self.get_or_create_settings(tenant_id).await?;

        let settings = match update {
            SettingsUpdate::CompanyName(v) => {
                self.update_settings_text(tenant_id, "company_name", v).await?
            }
            SettingsUpdate::CompanyTaxId(v) => {
                self.update_settings_text(tenant_id, "company_tax_id", v).await?
            }
            SettingsUpdate::CompanyAddress(v) => {
                self.update_settings_text(tenant_id, "company_address", v).await?
            }
            SettingsUpdate::CompanyPhone(v) => {
                self.update_settings_text(tenant_id, "company_phone", v).await?
            }
            SettingsUpdate::CompanyEmail(v) => {
                self.update_settings_text(tenant_id, "company_email", v).await?
            }
            SettingsUpdate::DefaultSeriesPrefix(v) => {
                self.update_settings_text(tenant_id, "default_series_prefix", v)
                    .await?
            }
            SettingsUpdate::InvoiceFooter(v) => {
                self.update_settings_text(tenant_id, "invoice_footer", v).await?
            }
            SettingsUpdate::AutoGenerateInvoice(v) => {
                self.update_settings_bool(tenant_id, "auto_generate_invoice", *v)
                    .await?
            }
            SettingsUpdate::RequireCustomer(v) => {
                self.update_settings_bool(tenant_id, "require_customer", *v).await?
            }
        };

        timer.observe_duration();

        Ok(settings)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn reset_settings(&self, tenant_id: Uuid) -> Result<InvoicingSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reset_settings"])
            .start_timer();

        self.get_or_create_settings(tenant_id).await?;

        let settings = sqlx::query_as::<_, InvoicingSettings>(
            r#"
            UPDATE invoicing_settings
            SET company_name = '',
                company_tax_id = '',
                company_address = '',
                company_phone = '',
                company_email = '',
                default_series_prefix = 'F',
                auto_generate_invoice = FALSE,
                require_customer = TRUE,
                invoice_footer = '',
                updated_utc = NOW()
            WHERE tenant_id = $1
            RETURNING settings_id, tenant_id, company_name, company_tax_id, company_address,
                company_phone, company_email, default_series_prefix, auto_generate_invoice,
                require_customer, invoice_footer, created_utc, updated_utc
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow!("Failed to reset settings: {}", e)))?;

        timer.observe_duration();

        Ok(settings)
    }
}
