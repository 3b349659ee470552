use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::controllers::zone_controller::ZoneController;
use crate::dto::zone_dto::{CreateZoneRequest, SetZoneActiveRequest};
use crate::dto::ApiResponse;
use crate::models::ParkingZone;
use crate::services::CapacitySummary;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_zone_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_zone).get(list_zones))
        .route("/capacity", get(capacity))
        .route("/:code/active", put(set_active))
}

async fn create_zone(
    State(state): State<AppState>,
    Json(request): Json<CreateZoneRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ParkingZone>>), AppError> {
    let response = ZoneController::new(&state).create(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_zones(State(state): State<AppState>) -> Result<Json<Vec<ParkingZone>>, AppError> {
    Ok(Json(ZoneController::new(&state).list().await?))
}

async fn capacity(State(state): State<AppState>) -> Result<Json<CapacitySummary>, AppError> {
    Ok(Json(ZoneController::new(&state).capacity().await?))
}

async fn set_active(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<SetZoneActiveRequest>,
) -> Result<Json<ParkingZone>, AppError> {
    Ok(Json(ZoneController::new(&state).set_active(&code, request).await?))
}
