use axum::{
    extract::{Json, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::ApiError,
    handlers::common::{
        actor_from, created_response, map_service_error, success_response, validate_input,
    },
    services::stock::{AdjustmentInput, AdjustmentItem, AdjustmentKind},
    AppState,
};

#[derive(Debug, Deserialize, Serialize)]
pub struct AdjustmentItemRequest {
    pub product_id: Uuid,
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAdjustmentRequest {
    pub location_id: Uuid,
    pub kind: AdjustmentKind,
    pub reason: Option<String>,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<AdjustmentItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct LevelsQuery {
    pub location_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct MovementsQuery {
    pub product_id: Uuid,
    pub location_id: Uuid,
}

async fn list_levels(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LevelsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.stock_service(&headers).await?;
    let levels = service
        .list_levels(query.location_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(levels))
}

async fn low_stock(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LevelsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.stock_service(&headers).await?;
    let levels = service
        .low_stock(query.location_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(levels))
}

async fn list_movements(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<MovementsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.stock_service(&headers).await?;
    let movements = service
        .movements(query.product_id, query.location_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(movements))
}

async fn create_adjustment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateAdjustmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let actor = actor_from(&headers)?;
    let service = state.stock_service(&headers).await?;
    let results = service
        .adjust(
            AdjustmentInput {
                location_id: payload.location_id,
                kind: payload.kind,
                reason: payload.reason,
                items: payload
                    .items
                    .into_iter()
                    .map(|item| AdjustmentItem {
                        product_id: item.product_id,
                        quantity: item.quantity,
                    })
                    .collect(),
            },
            actor,
        )
        .await
        .map_err(map_service_error)?;
    Ok(created_response(results))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/levels", get(list_levels))
        .route("/levels/low", get(low_stock))
        .route("/movements", get(list_movements))
        .route("/adjustments", post(create_adjustment))
}
