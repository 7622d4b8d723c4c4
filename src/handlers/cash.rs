use axum::{
    extract::{Json, Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::invoice::PaymentMethod,
    errors::ApiError,
    handlers::common::{
        actor_from, created_response, map_service_error, success_response, validate_input,
    },
    services::cash::ManualMovementKind,
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct OpenRegisterRequest {
    pub location_id: Uuid,
    pub opening_amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CloseRegisterRequest {
    pub counted_amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKindRequest {
    ManualEntry,
    ManualExit,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMovementRequest {
    pub location_id: Uuid,
    pub kind: MovementKindRequest,
    #[validate(length(min = 1, message = "concept is required"))]
    pub concept: String,
    pub amount: Decimal,
    pub method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub location_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub location_id: Option<Uuid>,
}

async fn open_register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<OpenRegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let actor = actor_from(&headers)?;
    let service = state.cash_service(&headers).await?;
    let register = service
        .open(payload.location_id, payload.opening_amount, actor, payload.notes)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(register))
}

async fn close_register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<CloseRegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let actor = actor_from(&headers)?;
    let service = state.cash_service(&headers).await?;
    let register = service
        .close(id, payload.counted_amount, actor, payload.notes)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(register))
}

async fn current_register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LocationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.cash_service(&headers).await?;
    let current = service
        .current(query.location_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(current))
}

async fn create_movement(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateMovementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let actor = actor_from(&headers)?;
    let service = state.cash_service(&headers).await?;
    let kind = match payload.kind {
        MovementKindRequest::ManualEntry => ManualMovementKind::ManualEntry,
        MovementKindRequest::ManualExit => ManualMovementKind::ManualExit,
    };
    let movement = service
        .add_movement(
            payload.location_id,
            kind,
            payload.concept,
            payload.amount,
            payload.method,
            actor,
        )
        .await
        .map_err(map_service_error)?;
    Ok(created_response(movement))
}

async fn register_movements(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.cash_service(&headers).await?;
    let movements = service.movements(id).await.map_err(map_service_error)?;
    Ok(success_response(movements))
}

async fn register_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.cash_service(&headers).await?;
    let history = service
        .history(query.location_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(history))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/open", post(open_register))
        .route("/current", get(current_register))
        .route("/history", get(register_history))
        .route("/movements", post(create_movement))
        .route("/:id/close", post(close_register))
        .route("/:id/movements", get(register_movements))
}
