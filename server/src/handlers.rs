// Copyright (c) 2026 fieldserve
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::database;
use crate::error::AppError;
use crate::routes::AppState;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use common::{
    ApprovalOutcome, AssignWorkOrderPayload, CreateServiceReportPayload, CreateWorkOrderPayload,
    Invoice, ServiceReport, WorkOrder,
};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Health check used by deploy tooling.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// Handler for a client submitting a new work order.
pub async fn create_work_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkOrderPayload>,
) -> Result<(StatusCode, Json<WorkOrder>), AppError> {
    debug!("Received work order from client: {}", payload.client_name);

    // The intake form requires a requester, a title and a job scope.
    if payload.client_name.trim().is_empty()
        || payload.title.trim().is_empty()
        || payload.job_scope.trim().is_empty()
    {
        return Err(AppError::validation(
            "client_name, title and job_scope cannot be empty.",
        ));
    }

    let order = database::create_work_order(&state.pool, payload).await?;

    info!("Work order created successfully with ID: {}", order.id);

    Ok((StatusCode::CREATED, Json(order)))
}

/// Handler for listing all work orders, newest first.
pub async fn list_work_orders(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkOrder>>, AppError> {
    let orders = database::list_work_orders(&state.pool).await?;
    info!("Successfully retrieved {} work orders.", orders.len());
    Ok(Json(orders))
}

/// Handler for an admin assigning a technician, schedule or status.
/// Omitted fields keep their current value.
pub async fn assign_work_order(
    State(state): State<AppState>,
    Path(work_order_id): Path<i64>,
    Json(payload): Json<AssignWorkOrderPayload>,
) -> Result<Json<WorkOrder>, AppError> {
    let order = database::assign_work_order(&state.pool, work_order_id, payload).await?;
    info!("Work order {} updated.", order.id);
    Ok(Json(order))
}

/// Handler for a technician filing a service report.
pub async fn create_service_report(
    State(state): State<AppState>,
    Json(payload): Json<CreateServiceReportPayload>,
) -> Result<(StatusCode, Json<ServiceReport>), AppError> {
    debug!(
        "Received service report for work order {}",
        payload.work_order_id
    );

    // Billing math never sees negative quantities or prices.
    if payload.labor_hours < Decimal::ZERO {
        return Err(AppError::validation("labor_hours cannot be negative."));
    }
    for material in &payload.materials {
        if material.qty < Decimal::ZERO || material.unit_price < Decimal::ZERO {
            return Err(AppError::validation(format!(
                "material '{}' has a negative qty or unit_price.",
                material.name
            )));
        }
    }

    let report = database::create_service_report(&state.pool, payload).await?;

    info!("Service report created successfully with ID: {}", report.id);

    Ok((StatusCode::CREATED, Json(report)))
}

/// Handler for an admin approving a service report. Approval flips the
/// report to `approved` and mints the invoice in one transaction; a second
/// call for the same report gets 409 and no second invoice.
pub async fn approve_service_report(
    State(state): State<AppState>,
    Path(report_id): Path<i64>,
) -> Result<(StatusCode, Json<ApprovalOutcome>), AppError> {
    let invoice = database::approve_service_report(&state.pool, &state.settings, report_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApprovalOutcome {
            invoice_id: invoice.id,
            invoice_number: invoice.invoice_number,
            total: invoice.total,
        }),
    ))
}

/// Handler for fetching one invoice, line items included.
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<i64>,
) -> Result<Json<Invoice>, AppError> {
    let invoice = database::get_invoice(&state.pool, invoice_id).await?;
    Ok(Json(invoice))
}
