// Copyright (c) 2026 fieldserve
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::config::Settings;
use crate::handlers;

use axum::{
    routing::{get, patch, post},
    Router,
};
use sqlx::SqlitePool;

/// Shared application state: the connection pool plus the billing rates
/// read at startup.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub settings: Settings,
}

/// Creates and configures the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        // Clients submit work orders; admins list them.
        .route("/api/work-orders", post(handlers::create_work_order))
        .route("/api/work-orders", get(handlers::list_work_orders))
        // Admins assign a technician, a schedule, or a status.
        .route("/api/work-orders/{id}", patch(handlers::assign_work_order))
        // Technicians file service reports against a work order.
        .route("/api/service-reports", post(handlers::create_service_report))
        // Approval mints the invoice.
        .route(
            "/api/service-reports/{id}/approve",
            post(handlers::approve_service_report),
        )
        .route("/api/invoices/{id}", get(handlers::get_invoice))
        .with_state(state)
}
