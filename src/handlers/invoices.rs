use axum::{
    extract::{Json, Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::invoice::{InvoiceDocType, InvoiceStatus, PaymentMethod},
    errors::ApiError,
    handlers::common::{
        actor_from, created_response, map_service_error, no_content_response, success_response,
        validate_input, PaginatedResponse,
    },
    services::invoices::{InvoiceFilter, InvoiceInput, LineInput},
    AppState,
};

#[derive(Debug, Deserialize, Serialize)]
pub struct LineItemRequest {
    pub product_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InvoiceRequest {
    pub customer_id: Option<Uuid>,
    pub doc_type: InvoiceDocType,
    pub payment_method: PaymentMethod,
    pub location_id: Uuid,
    pub issue_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<LineItemRequest>,
    #[serde(default)]
    pub discount: Decimal,
    pub include_tax: Option<bool>,
    #[serde(default)]
    pub draft: bool,
    pub notes: Option<String>,
}

impl InvoiceRequest {
    fn into_input(self) -> InvoiceInput {
        InvoiceInput {
            customer_id: self.customer_id,
            doc_type: self.doc_type,
            payment_method: self.payment_method,
            location_id: self.location_id,
            issue_date: self.issue_date,
            due_date: self.due_date,
            lines: self
                .items
                .into_iter()
                .map(|item| LineInput {
                    product_id: item.product_id,
                    description: item.description,
                    quantity: item.quantity,
                    unit_price: item.price,
                    discount: item.discount,
                })
                .collect(),
            discount: self.discount,
            include_tax: self.include_tax,
            draft: self.draft,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelInvoiceRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceListQuery {
    // Kept inline rather than a flattened PaginationParams: serde_urlencoded
    // cannot deserialize numeric fields through #[serde(flatten)].
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    pub status: Option<InvoiceStatus>,
    pub doc_type: Option<InvoiceDocType>,
    pub payment_method: Option<PaymentMethod>,
    pub customer_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

async fn create_invoice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<InvoiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let actor = actor_from(&headers)?;
    let service = state.invoice_service(&headers).await?;
    let summary = service
        .create(payload.into_input(), actor)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(summary))
}

async fn get_invoice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.invoice_service(&headers).await?;
    let details = service.get(id).await.map_err(map_service_error)?;
    Ok(success_response(details))
}

async fn list_invoices(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<InvoiceListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.invoice_service(&headers).await?;
    let filter = InvoiceFilter {
        status: query.status,
        doc_type: query.doc_type,
        payment_method: query.payment_method,
        customer_id: query.customer_id,
        location_id: query.location_id,
    };
    let (rows, total) = service
        .list(filter, query.page, query.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        rows,
        query.page,
        query.per_page,
        total,
    )))
}

async fn update_invoice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<InvoiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let actor = actor_from(&headers)?;
    let service = state.invoice_service(&headers).await?;
    let summary = service
        .update(id, payload.into_input(), actor)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summary))
}

async fn cancel_invoice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelInvoiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from(&headers)?;
    let service = state.invoice_service(&headers).await?;
    let summary = service
        .cancel(id, payload.reason, actor)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summary))
}

async fn delete_invoice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.invoice_service(&headers).await?;
    service.delete(id).await.map_err(map_service_error)?;
    Ok(no_content_response())
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_invoice).get(list_invoices))
        .route(
            "/:id",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/:id/cancel", post(cancel_invoice))
}
