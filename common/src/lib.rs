// Copyright (c) 2026 fieldserve
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle of a work order. Only `new` and `assigned` are set by this
/// server; `in_progress`/`completed` arrive through the assign endpoint as
/// admin-driven transitions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    New,
    Assigned,
    InProgress,
    Completed,
}

/// Admin review state of a service report. `pending` transitions to
/// `approved` exactly once; approval is what mints the invoice.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Approved,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
}

/// A client-submitted request for work.
///
/// Derivation attributes (derive):
/// - `Serialize`, `Deserialize`: Allows conversion to/from JSON.
/// - `sqlx::FromRow`: Allows `sqlx` to create a `WorkOrder` instance directly
///   from a database result row.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct WorkOrder {
    pub id: i64,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub title: String,
    pub description: Option<String>,
    /// Category tag, e.g. "electrical" or "plumbing".
    pub job_scope: String,
    pub site_address: Option<String>,
    // NaiveDate because scheduling only cares about the day, not a timezone.
    pub preferred_date: Option<NaiveDate>,
    pub status: WorkOrderStatus,
    pub scheduled_date: Option<NaiveDate>,
    pub technician_name: Option<String>,
}

/// One material consumed during a job. Kept as a typed record; the server
/// serializes the whole sequence to a JSON column at the storage boundary.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MaterialItem {
    pub name: String,
    pub qty: Decimal,
    pub unit_price: Decimal,
}

/// Technician's record of work performed against one work order.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServiceReport {
    pub id: i64,
    pub work_order_id: i64,
    pub technician_name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub labor_hours: Decimal,
    pub findings: Option<String>,
    pub actions_taken: Option<String>,
    pub recommendations: Option<String>,
    pub materials: Vec<MaterialItem>,
    pub client_signoff_name: Option<String>,
    pub client_signoff_time: Option<DateTime<Utc>>,
    pub admin_status: ReportStatus,
}

/// One billable line on an invoice. The first line is always the labor
/// charge; the rest mirror the report's materials in their original order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LineItem {
    pub description: String,
    pub qty: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

/// Billing artifact derived from exactly one approved service report.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Invoice {
    pub id: i64,
    pub service_report_id: i64,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub line_items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub status: InvoiceStatus,
}

/// Structure used to receive work-order creation data from the API.
/// It's a good practice to separate database models (`WorkOrder`)
/// from API models, as they may have different fields.
#[derive(Deserialize, Debug)]
pub struct CreateWorkOrderPayload {
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub job_scope: String,
    pub site_address: Option<String>,
    pub preferred_date: Option<NaiveDate>,
}

/// Partial update applied by an admin when assigning a work order.
/// Every field is optional; fields left out retain their current value.
#[derive(Deserialize, Debug, Default)]
pub struct AssignWorkOrderPayload {
    pub technician_name: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub status: Option<WorkOrderStatus>,
}

/// Structure used to receive service-report creation data from the API.
#[derive(Deserialize, Debug)]
pub struct CreateServiceReportPayload {
    pub work_order_id: i64,
    pub technician_name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub labor_hours: Decimal,
    pub findings: Option<String>,
    pub actions_taken: Option<String>,
    pub recommendations: Option<String>,
    #[serde(default)]
    pub materials: Vec<MaterialItem>,
    pub client_signoff_name: Option<String>,
    pub client_signoff_time: Option<DateTime<Utc>>,
}

/// Returned by the approval endpoint: just enough for the admin UI to show
/// a confirmation and link to the full invoice.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApprovalOutcome {
    pub invoice_id: i64,
    pub invoice_number: String,
    pub total: Decimal,
}
