//! Multi-tenant invoicing core.
//!
//! Issues fiscal sales documents, allocates legally-sequential document
//! numbers, moves inventory, reconciles cash drawers and applies customer
//! payments against outstanding balances. Request routing, authentication
//! and tenant provisioning live upstream; this crate consumes a resolved
//! tenant connection and an authenticated actor identity.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod services;
pub mod tax_id;
pub mod tenant;

use axum::{http::HeaderMap, routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::db::DbPool;
use crate::errors::ApiError;

/// Header naming the tenant whose database the request operates on.
pub const TENANT_HEADER: &str = "x-tenant-id";
/// Tenant used when the header is absent (single-tenant deployments).
pub const DEFAULT_TENANT: &str = "default";

pub struct AppState {
    pub config: config::AppConfig,
    pub registry: tenant::TenantRegistry,
}

impl AppState {
    pub fn new(config: config::AppConfig, registry: tenant::TenantRegistry) -> Self {
        Self { config, registry }
    }

    /// Resolves the tenant-scoped connection for a request.
    pub async fn tenant_db(&self, headers: &HeaderMap) -> Result<Arc<DbPool>, ApiError> {
        let tenant = headers
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_TENANT);
        self.registry
            .resolve(tenant)
            .await
            .map_err(ApiError::ServiceError)
    }

    pub async fn invoice_service(
        &self,
        headers: &HeaderMap,
    ) -> Result<services::invoices::InvoiceService, ApiError> {
        let db = self.tenant_db(headers).await?;
        Ok(services::invoices::InvoiceService::new(
            db,
            self.config.tax_rate(),
        ))
    }

    pub async fn receivables_service(
        &self,
        headers: &HeaderMap,
    ) -> Result<services::receivables::ReceivablesService, ApiError> {
        Ok(services::receivables::ReceivablesService::new(
            self.tenant_db(headers).await?,
        ))
    }

    pub async fn cash_service(
        &self,
        headers: &HeaderMap,
    ) -> Result<services::cash::CashService, ApiError> {
        Ok(services::cash::CashService::new(
            self.tenant_db(headers).await?,
        ))
    }

    pub async fn stock_service(
        &self,
        headers: &HeaderMap,
    ) -> Result<services::stock::StockService, ApiError> {
        Ok(services::stock::StockService::new(
            self.tenant_db(headers).await?,
        ))
    }

    pub async fn sequence_service(
        &self,
        headers: &HeaderMap,
    ) -> Result<services::sequences::SequenceService, ApiError> {
        Ok(services::sequences::SequenceService::new(
            self.tenant_db(headers).await?,
        ))
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Assembles the full router over a shared state.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/invoices", handlers::invoices::routes())
        .nest("/receivables", handlers::receivables::routes())
        .nest("/cash", handlers::cash::routes())
        .nest("/sequences", handlers::sequences::routes())
        .nest("/stock", handlers::stock::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
