// Copyright (c) 2026 fieldserve
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::billing;
use crate::config::Settings;
use crate::error::AppError;

use anyhow::{Context, Result};
use chrono::Utc;
use common::{
    AssignWorkOrderPayload, CreateServiceReportPayload, CreateWorkOrderPayload, Invoice,
    InvoiceStatus, LineItem, MaterialItem, ReportStatus, ServiceReport, WorkOrder,
    WorkOrderStatus,
};
use rust_decimal::Decimal;
use sqlx::{migrate::MigrateDatabase, sqlite::SqliteRow, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// Establishes the database connection pool.
/// If the database does not exist, it creates it.
/// It also ensures the three workflow tables have the correct schema.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url)
            .await
            .context("Failed to create database")?;
    } else {
        info!("Database already exists.");
    }

    let pool = SqlitePool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    apply_schema(&pool).await?;

    info!("Workflow tables are ready.");

    Ok(pool)
}

/// Creates the workflow tables if they are missing. Also used by the test
/// suites against in-memory databases.
///
/// Decimal-valued columns (labor_hours, invoice amounts) are TEXT: SQLite
/// has no decimal type and REAL would drift. Materials and line items are
/// JSON TEXT columns, parsed back into typed sequences on read.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_name TEXT NOT NULL,
            client_email TEXT,
            client_phone TEXT,
            title TEXT NOT NULL,
            description TEXT,
            job_scope TEXT NOT NULL,
            site_address TEXT,
            preferred_date DATE,
            status TEXT NOT NULL DEFAULT 'new',
            scheduled_date DATE,
            technician_name TEXT
        );
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create 'work_orders' table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS service_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            work_order_id INTEGER NOT NULL REFERENCES work_orders(id),
            technician_name TEXT,
            start_time TIMESTAMP,
            end_time TIMESTAMP,
            labor_hours TEXT NOT NULL,
            findings TEXT,
            actions_taken TEXT,
            recommendations TEXT,
            materials_json TEXT NOT NULL,
            client_signoff_name TEXT,
            client_signoff_time TIMESTAMP,
            admin_status TEXT NOT NULL DEFAULT 'pending'
        );
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create 'service_reports' table")?;

    // UNIQUE on service_report_id: at most one invoice per report, even if
    // the guarded approval transition were somehow bypassed.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS invoices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            service_report_id INTEGER NOT NULL UNIQUE REFERENCES service_reports(id),
            invoice_number TEXT NOT NULL UNIQUE,
            issue_date DATE NOT NULL,
            due_date DATE,
            line_items_json TEXT NOT NULL,
            subtotal TEXT NOT NULL,
            tax_rate TEXT NOT NULL,
            tax_amount TEXT NOT NULL,
            total TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'draft'
        );
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create 'invoices' table")?;

    Ok(())
}

/// Inserts a new work order with status `new`.
pub async fn create_work_order(
    pool: &SqlitePool,
    payload: CreateWorkOrderPayload,
) -> Result<WorkOrder, AppError> {
    debug!(
        "Insert values: client_name={}, title={}, job_scope={}",
        payload.client_name, payload.title, payload.job_scope
    );

    let id = sqlx::query(
        "INSERT INTO work_orders (client_name, client_email, client_phone, title, description, job_scope, site_address, preferred_date, status) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&payload.client_name)
    .bind(&payload.client_email)
    .bind(&payload.client_phone)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(&payload.job_scope)
    .bind(&payload.site_address)
    .bind(payload.preferred_date)
    .bind(WorkOrderStatus::New)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(WorkOrder {
        id,
        client_name: payload.client_name,
        client_email: payload.client_email,
        client_phone: payload.client_phone,
        title: payload.title,
        description: payload.description,
        job_scope: payload.job_scope,
        site_address: payload.site_address,
        preferred_date: payload.preferred_date,
        status: WorkOrderStatus::New,
        scheduled_date: None,
        technician_name: None,
    })
}

/// Retrieves all work orders, newest first. Work orders are never deleted,
/// so this is the full audit trail.
pub async fn list_work_orders(pool: &SqlitePool) -> Result<Vec<WorkOrder>, AppError> {
    let orders = sqlx::query_as::<_, WorkOrder>("SELECT * FROM work_orders ORDER BY id DESC")
        .fetch_all(pool)
        .await?;

    Ok(orders)
}

/// Applies a partial assignment update. Fields the admin left out keep
/// their current value; the COALESCE runs in a single UPDATE so a partial
/// assignment never clobbers a concurrent one.
pub async fn assign_work_order(
    pool: &SqlitePool,
    work_order_id: i64,
    payload: AssignWorkOrderPayload,
) -> Result<WorkOrder, AppError> {
    debug!("Assigning work order {}: {:?}", work_order_id, payload);

    let result = sqlx::query(
        "UPDATE work_orders SET \
           technician_name = COALESCE(?, technician_name), \
           scheduled_date = COALESCE(?, scheduled_date), \
           status = COALESCE(?, status) \
         WHERE id = ?",
    )
    .bind(&payload.technician_name)
    .bind(payload.scheduled_date)
    .bind(payload.status)
    .bind(work_order_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("work order"));
    }

    let order = sqlx::query_as::<_, WorkOrder>("SELECT * FROM work_orders WHERE id = ?")
        .bind(work_order_id)
        .fetch_one(pool)
        .await?;

    Ok(order)
}

/// Inserts a new service report with admin_status `pending`. The work
/// order must exist; orphaned reports are rejected rather than stored.
pub async fn create_service_report(
    pool: &SqlitePool,
    payload: CreateServiceReportPayload,
) -> Result<ServiceReport, AppError> {
    let work_order: Option<i64> = sqlx::query_scalar("SELECT id FROM work_orders WHERE id = ?")
        .bind(payload.work_order_id)
        .fetch_optional(pool)
        .await?;
    if work_order.is_none() {
        return Err(AppError::InvalidReference(payload.work_order_id));
    }

    let materials_json =
        serde_json::to_string(&payload.materials).context("Failed to serialize materials")?;

    let id = sqlx::query(
        "INSERT INTO service_reports (work_order_id, technician_name, start_time, end_time, labor_hours, findings, actions_taken, recommendations, materials_json, client_signoff_name, client_signoff_time, admin_status) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.work_order_id)
    .bind(&payload.technician_name)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(payload.labor_hours.to_string())
    .bind(&payload.findings)
    .bind(&payload.actions_taken)
    .bind(&payload.recommendations)
    .bind(&materials_json)
    .bind(&payload.client_signoff_name)
    .bind(payload.client_signoff_time)
    .bind(ReportStatus::Pending)
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(
        "Service report {} filed against work order {}",
        id, payload.work_order_id
    );

    Ok(ServiceReport {
        id,
        work_order_id: payload.work_order_id,
        technician_name: payload.technician_name,
        start_time: payload.start_time,
        end_time: payload.end_time,
        labor_hours: payload.labor_hours,
        findings: payload.findings,
        actions_taken: payload.actions_taken,
        recommendations: payload.recommendations,
        materials: payload.materials,
        client_signoff_name: payload.client_signoff_name,
        client_signoff_time: payload.client_signoff_time,
        admin_status: ReportStatus::Pending,
    })
}

/// Approves a pending service report and mints its invoice.
///
/// The fetch, the guarded status transition and the invoice insert run in
/// one transaction. Two concurrent approvals of the same report cannot
/// both succeed: the loser's UPDATE matches zero rows and it gets
/// `AlreadyApproved` back, so exactly one invoice ever exists per report.
pub async fn approve_service_report(
    pool: &SqlitePool,
    settings: &Settings,
    report_id: i64,
) -> Result<Invoice, AppError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query("SELECT * FROM service_reports WHERE id = ?")
        .bind(report_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("service report"))?;
    let report = service_report_from_row(&row)?;

    if report.admin_status == ReportStatus::Approved {
        return Err(AppError::AlreadyApproved(report_id));
    }

    let transition =
        sqlx::query("UPDATE service_reports SET admin_status = ? WHERE id = ? AND admin_status = ?")
            .bind(ReportStatus::Approved)
            .bind(report_id)
            .bind(ReportStatus::Pending)
            .execute(&mut *tx)
            .await?;
    if transition.rows_affected() == 0 {
        // Raced by another approver between our read and the update.
        return Err(AppError::AlreadyApproved(report_id));
    }

    let line_items =
        billing::build_line_items(report.labor_hours, settings.labor_rate, &report.materials);
    let totals = billing::totals(&line_items, settings.tax_rate);

    let issue_date = Utc::now().date_naive();
    // Monotonic sequence taken inside the transaction; the UNIQUE
    // constraint on invoice_number backs it up.
    let sequence: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) + 1 FROM invoices")
        .fetch_one(&mut *tx)
        .await?;
    let invoice_number = format!("INV-{}-{:05}", issue_date.format("%Y"), sequence);

    let line_items_json =
        serde_json::to_string(&line_items).context("Failed to serialize line items")?;

    let invoice_id = sqlx::query(
        "INSERT INTO invoices (service_report_id, invoice_number, issue_date, due_date, line_items_json, subtotal, tax_rate, tax_amount, total, status) \
         VALUES (?, ?, ?, NULL, ?, ?, ?, ?, ?, ?)",
    )
    .bind(report_id)
    .bind(&invoice_number)
    .bind(issue_date)
    .bind(&line_items_json)
    .bind(totals.subtotal.to_string())
    .bind(settings.tax_rate.to_string())
    .bind(totals.tax_amount.to_string())
    .bind(totals.total.to_string())
    .bind(InvoiceStatus::Draft)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    info!(
        "Service report {} approved, invoice {} issued for {}",
        report_id, invoice_number, totals.total
    );

    Ok(Invoice {
        id: invoice_id,
        service_report_id: report_id,
        invoice_number,
        issue_date,
        due_date: None,
        line_items,
        subtotal: totals.subtotal,
        tax_rate: settings.tax_rate,
        tax_amount: totals.tax_amount,
        total: totals.total,
        status: InvoiceStatus::Draft,
    })
}

/// Fetches one invoice with its line items materialized.
pub async fn get_invoice(pool: &SqlitePool, invoice_id: i64) -> Result<Invoice, AppError> {
    let row = sqlx::query("SELECT * FROM invoices WHERE id = ?")
        .bind(invoice_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("invoice"))?;

    invoice_from_row(&row)
}

/// Fetches one service report.
pub async fn get_service_report(
    pool: &SqlitePool,
    report_id: i64,
) -> Result<ServiceReport, AppError> {
    let row = sqlx::query("SELECT * FROM service_reports WHERE id = ?")
        .bind(report_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("service report"))?;

    service_report_from_row(&row)
}

// Decimal columns travel as TEXT; parse failures mean a corrupt row and
// surface as storage errors.
fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, AppError> {
    let raw: String = row.try_get(column)?;
    let value = Decimal::from_str(&raw)
        .with_context(|| format!("Column '{column}' holds a malformed decimal: {raw}"))?;
    Ok(value)
}

fn service_report_from_row(row: &SqliteRow) -> Result<ServiceReport, AppError> {
    let materials_json: String = row.try_get("materials_json")?;
    let materials: Vec<MaterialItem> =
        serde_json::from_str(&materials_json).context("Malformed materials_json column")?;

    Ok(ServiceReport {
        id: row.try_get("id")?,
        work_order_id: row.try_get("work_order_id")?,
        technician_name: row.try_get("technician_name")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        labor_hours: decimal_column(row, "labor_hours")?,
        findings: row.try_get("findings")?,
        actions_taken: row.try_get("actions_taken")?,
        recommendations: row.try_get("recommendations")?,
        materials,
        client_signoff_name: row.try_get("client_signoff_name")?,
        client_signoff_time: row.try_get("client_signoff_time")?,
        admin_status: row.try_get("admin_status")?,
    })
}

fn invoice_from_row(row: &SqliteRow) -> Result<Invoice, AppError> {
    let line_items_json: String = row.try_get("line_items_json")?;
    let line_items: Vec<LineItem> =
        serde_json::from_str(&line_items_json).context("Malformed line_items_json column")?;

    Ok(Invoice {
        id: row.try_get("id")?,
        service_report_id: row.try_get("service_report_id")?,
        invoice_number: row.try_get("invoice_number")?,
        issue_date: row.try_get("issue_date")?,
        due_date: row.try_get("due_date")?,
        line_items,
        subtotal: decimal_column(row, "subtotal")?,
        tax_rate: decimal_column(row, "tax_rate")?,
        tax_amount: decimal_column(row, "tax_amount")?,
        total: decimal_column(row, "total")?,
        status: row.try_get("status")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    /// Helper to set up an in-memory SQLite database for testing.
    /// A single connection keeps every query on the same in-memory DB.
    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory SQLite");

        apply_schema(&pool).await.expect("Failed to apply schema");

        pool
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn work_order_payload(client_name: &str, title: &str) -> CreateWorkOrderPayload {
        CreateWorkOrderPayload {
            client_name: client_name.to_string(),
            client_email: Some("client@example.com".to_string()),
            client_phone: None,
            title: title.to_string(),
            description: Some("Lights flicker in the stairwell".to_string()),
            job_scope: "electrical".to_string(),
            site_address: Some("12 Harbour Rd".to_string()),
            preferred_date: None,
        }
    }

    fn report_payload(work_order_id: i64, labor_hours: &str) -> CreateServiceReportPayload {
        CreateServiceReportPayload {
            work_order_id,
            technician_name: Some("Mel".to_string()),
            start_time: None,
            end_time: None,
            labor_hours: dec(labor_hours),
            findings: Some("Loose neutral".to_string()),
            actions_taken: Some("Re-terminated".to_string()),
            recommendations: None,
            materials: vec![MaterialItem {
                name: "Terminal block".to_string(),
                qty: dec("3"),
                unit_price: dec("10"),
            }],
            client_signoff_name: None,
            client_signoff_time: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_list_newest_first() {
        let pool = setup_test_db().await;

        let first = create_work_order(&pool, work_order_payload("Acme", "Stairwell lights"))
            .await
            .unwrap();
        let second = create_work_order(&pool, work_order_payload("Globex", "HVAC rattle"))
            .await
            .unwrap();

        assert_eq!(first.status, WorkOrderStatus::New);
        assert_eq!(first.technician_name, None);

        let orders = list_work_orders(&pool).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, second.id);
        assert_eq!(orders[1].id, first.id);
    }

    #[tokio::test]
    async fn test_assign_updates_only_supplied_fields() {
        let pool = setup_test_db().await;
        let order = create_work_order(&pool, work_order_payload("Acme", "Stairwell lights"))
            .await
            .unwrap();

        let assigned = assign_work_order(
            &pool,
            order.id,
            AssignWorkOrderPayload {
                technician_name: Some("Mel".to_string()),
                scheduled_date: None,
                status: Some(WorkOrderStatus::Assigned),
            },
        )
        .await
        .unwrap();

        assert_eq!(assigned.technician_name.as_deref(), Some("Mel"));
        assert_eq!(assigned.status, WorkOrderStatus::Assigned);
        assert_eq!(assigned.scheduled_date, None);
        assert_eq!(assigned.client_name, "Acme");

        // A later partial update keeps the technician.
        let date = chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let rescheduled = assign_work_order(
            &pool,
            order.id,
            AssignWorkOrderPayload {
                technician_name: None,
                scheduled_date: Some(date),
                status: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(rescheduled.technician_name.as_deref(), Some("Mel"));
        assert_eq!(rescheduled.scheduled_date, Some(date));
        assert_eq!(rescheduled.status, WorkOrderStatus::Assigned);
    }

    #[tokio::test]
    async fn test_assign_missing_work_order() {
        let pool = setup_test_db().await;

        let result = assign_work_order(&pool, 999, AssignWorkOrderPayload::default()).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_report_requires_existing_work_order() {
        let pool = setup_test_db().await;

        let result = create_service_report(&pool, report_payload(42, "2")).await;

        assert!(matches!(result, Err(AppError::InvalidReference(42))));
    }

    #[tokio::test]
    async fn test_report_round_trips_materials() {
        let pool = setup_test_db().await;
        let order = create_work_order(&pool, work_order_payload("Acme", "Stairwell lights"))
            .await
            .unwrap();

        let created = create_service_report(&pool, report_payload(order.id, "2.5"))
            .await
            .unwrap();
        assert_eq!(created.admin_status, ReportStatus::Pending);

        let fetched = get_service_report(&pool, created.id).await.unwrap();
        assert_eq!(fetched.labor_hours, dec("2.5"));
        assert_eq!(fetched.materials, created.materials);
        assert_eq!(fetched.admin_status, ReportStatus::Pending);
    }

    #[tokio::test]
    async fn test_approve_computes_invoice() {
        let pool = setup_test_db().await;
        let settings = Settings::default();
        let order = create_work_order(&pool, work_order_payload("Acme", "Stairwell lights"))
            .await
            .unwrap();
        let report = create_service_report(&pool, report_payload(order.id, "2"))
            .await
            .unwrap();

        let invoice = approve_service_report(&pool, &settings, report.id)
            .await
            .unwrap();

        // 2h * 80 + 3 * 10 = 190; 9% tax = 17.10.
        assert_eq!(invoice.subtotal, dec("190"));
        assert_eq!(invoice.tax_amount, dec("17.10"));
        assert_eq!(invoice.total, dec("207.10"));
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.line_items.len(), 2);
        assert_eq!(invoice.line_items[0].description, "Labor charges");
        assert!(invoice.invoice_number.starts_with("INV-"));

        let report_after = get_service_report(&pool, report.id).await.unwrap();
        assert_eq!(report_after.admin_status, ReportStatus::Approved);

        // The stored invoice matches what approval returned.
        let fetched = get_invoice(&pool, invoice.id).await.unwrap();
        assert_eq!(fetched.invoice_number, invoice.invoice_number);
        assert_eq!(fetched.total, invoice.total);
        assert_eq!(fetched.line_items, invoice.line_items);
    }

    #[tokio::test]
    async fn test_second_approval_is_rejected() {
        let pool = setup_test_db().await;
        let settings = Settings::default();
        let order = create_work_order(&pool, work_order_payload("Acme", "Stairwell lights"))
            .await
            .unwrap();
        let report = create_service_report(&pool, report_payload(order.id, "2"))
            .await
            .unwrap();

        approve_service_report(&pool, &settings, report.id)
            .await
            .unwrap();
        let second = approve_service_report(&pool, &settings, report.id).await;

        assert!(matches!(second, Err(AppError::AlreadyApproved(id)) if id == report.id));

        // Exactly one invoice exists for the report.
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE service_report_id = ?")
                .bind(report.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_approve_missing_report() {
        let pool = setup_test_db().await;
        let settings = Settings::default();

        let result = approve_service_report(&pool, &settings, 999).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_zero_hour_report_yields_zero_invoice() {
        let pool = setup_test_db().await;
        let settings = Settings::default();
        let order = create_work_order(&pool, work_order_payload("Acme", "No-fault callout"))
            .await
            .unwrap();
        let mut payload = report_payload(order.id, "0");
        payload.materials = Vec::new();
        let report = create_service_report(&pool, payload).await.unwrap();

        let invoice = approve_service_report(&pool, &settings, report.id)
            .await
            .unwrap();

        assert_eq!(invoice.subtotal, Decimal::ZERO);
        assert_eq!(invoice.tax_amount, Decimal::ZERO);
        assert_eq!(invoice.total, Decimal::ZERO);
        assert_eq!(invoice.line_items.len(), 1);
    }

    #[tokio::test]
    async fn test_invoice_numbers_are_distinct_and_sequential() {
        let pool = setup_test_db().await;
        let settings = Settings::default();
        let order = create_work_order(&pool, work_order_payload("Acme", "Stairwell lights"))
            .await
            .unwrap();

        let first_report = create_service_report(&pool, report_payload(order.id, "1"))
            .await
            .unwrap();
        let second_report = create_service_report(&pool, report_payload(order.id, "2"))
            .await
            .unwrap();

        let first = approve_service_report(&pool, &settings, first_report.id)
            .await
            .unwrap();
        let second = approve_service_report(&pool, &settings, second_report.id)
            .await
            .unwrap();

        assert_ne!(first.invoice_number, second.invoice_number);
        assert!(second.invoice_number > first.invoice_number);
    }

    #[tokio::test]
    async fn test_get_invoice_missing() {
        let pool = setup_test_db().await;

        let result = get_invoice(&pool, 999).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
