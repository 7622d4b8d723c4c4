use axum::{
    extract::{Json, Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::ApiError,
    handlers::common::{
        created_response, map_service_error, no_content_response, success_response, validate_input,
    },
    services::sequences::{CreateSequenceInput, UpdateSequenceInput},
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSequenceRequest {
    #[validate(length(min = 1, max = 10))]
    pub prefix: String,
    pub description: Option<String>,
    pub start_range: i64,
    pub end_range: i64,
    pub location_id: Option<Uuid>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSequenceRequest {
    pub description: Option<String>,
    pub start_range: Option<i64>,
    pub end_range: Option<i64>,
    pub current_number: Option<i64>,
    pub is_active: Option<bool>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AllocateRequest {
    #[validate(length(min = 1, max = 10))]
    pub prefix: String,
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SequenceListQuery {
    pub prefix: Option<String>,
    pub active: Option<bool>,
}

async fn list_sequences(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SequenceListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.sequence_service(&headers).await?;
    let sequences = service
        .list(query.prefix, query.active)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(sequences))
}

async fn get_sequence(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.sequence_service(&headers).await?;
    let sequence = service.get(id).await.map_err(map_service_error)?;
    Ok(success_response(sequence))
}

async fn create_sequence(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateSequenceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let service = state.sequence_service(&headers).await?;
    let sequence = service
        .create(CreateSequenceInput {
            prefix: payload.prefix,
            description: payload.description,
            start_range: payload.start_range,
            end_range: payload.end_range,
            location_id: payload.location_id,
            valid_from: payload.valid_from,
            valid_until: payload.valid_until,
        })
        .await
        .map_err(map_service_error)?;
    Ok(created_response(sequence))
}

async fn update_sequence(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSequenceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let service = state.sequence_service(&headers).await?;
    let sequence = service
        .update(
            id,
            UpdateSequenceInput {
                description: payload.description,
                start_range: payload.start_range,
                end_range: payload.end_range,
                current_number: payload.current_number,
                is_active: payload.is_active,
                valid_from: payload.valid_from,
                valid_until: payload.valid_until,
            },
        )
        .await
        .map_err(map_service_error)?;
    Ok(success_response(sequence))
}

async fn deactivate_sequence(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.sequence_service(&headers).await?;
    service.deactivate(id).await.map_err(map_service_error)?;
    Ok(no_content_response())
}

async fn allocate_number(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AllocateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let service = state.sequence_service(&headers).await?;
    let number = service
        .allocate(&payload.prefix, payload.location_id)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(number))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_sequence).get(list_sequences))
        .route("/allocate", post(allocate_number))
        .route(
            "/:id",
            get(get_sequence)
                .put(update_sequence)
                .delete(deactivate_sequence),
        )
}
