use axum::{
    extract::{Json, Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::invoice::PaymentMethod,
    errors::ApiError,
    handlers::common::{
        actor_from, created_response, map_service_error, success_response, validate_input,
    },
    services::receivables::{AllocationItem, PaymentAllocation, PaymentInput},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct InvoicePaymentRequest {
    pub invoice_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    /// Manual per-invoice distribution; wins over `invoice_ids`
    pub invoice_payments: Option<Vec<InvoicePaymentRequest>>,
    /// Selected invoices, paid oldest-due-first; omit both to pay all open
    pub invoice_ids: Option<Vec<Uuid>>,
}

impl CreatePaymentRequest {
    fn allocation(&self) -> PaymentAllocation {
        if let Some(items) = &self.invoice_payments {
            if !items.is_empty() {
                return PaymentAllocation::Explicit(
                    items
                        .iter()
                        .map(|item| AllocationItem {
                            invoice_id: item.invoice_id,
                            amount: item.amount,
                        })
                        .collect(),
                );
            }
        }
        if let Some(ids) = &self.invoice_ids {
            if !ids.is_empty() {
                return PaymentAllocation::Selected(ids.clone());
            }
        }
        PaymentAllocation::AllOpen
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentListQuery {
    pub customer_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
}

async fn create_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let actor = actor_from(&headers)?;
    let service = state.receivables_service(&headers).await?;

    let allocation = payload.allocation();
    let input = PaymentInput {
        customer_id: payload.customer_id,
        amount: payload.amount,
        method: payload.method,
        reference: payload.reference,
        paid_at: payload.payment_date,
        allocation,
    };
    let applied = service
        .create_payment(input, actor)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(json!({
        "payments": applied,
        "total_amount": payload.amount,
    })))
}

async fn list_payments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<PaymentListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.receivables_service(&headers).await?;
    let payments = service
        .list_payments(query.customer_id, query.invoice_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(payments))
}

async fn customer_statement(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(customer_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.receivables_service(&headers).await?;
    let statement = service
        .statement(customer_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(statement))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payments", post(create_payment).get(list_payments))
        .route("/statement/:customer_id", get(customer_statement))
}
