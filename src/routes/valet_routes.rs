use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::valet_controller::ValetController;
use crate::dto::valet_dto::{
    OnboardValetRequest, ResetDailyResponse, SetValetActiveRequest, UpdateValetStatusRequest,
};
use crate::dto::ApiResponse;
use crate::models::{Valet, ValetAvailabilityReport};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_valet_router() -> Router<AppState> {
    Router::new()
        .route("/", post(onboard_valet).get(list_valets))
        .route("/availability", get(availability))
        .route("/reset-daily", post(reset_daily))
        .route("/:id/status", put(update_status))
        .route("/:id/active", put(set_active))
}

async fn onboard_valet(
    State(state): State<AppState>,
    Json(request): Json<OnboardValetRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Valet>>), AppError> {
    let controller = ValetController::new(&state);
    let response = controller.onboard(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_valets(State(state): State<AppState>) -> Result<Json<Vec<Valet>>, AppError> {
    Ok(Json(ValetController::new(&state).list().await?))
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateValetStatusRequest>,
) -> Result<Json<Valet>, AppError> {
    Ok(Json(ValetController::new(&state).update_status(id, request).await?))
}

async fn set_active(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetValetActiveRequest>,
) -> Result<Json<Valet>, AppError> {
    Ok(Json(ValetController::new(&state).set_active(id, request).await?))
}

async fn reset_daily(State(state): State<AppState>) -> Result<Json<ResetDailyResponse>, AppError> {
    Ok(Json(ValetController::new(&state).reset_daily().await?))
}

async fn availability(State(state): State<AppState>) -> Result<Json<ValetAvailabilityReport>, AppError> {
    Ok(Json(ValetController::new(&state).availability().await?))
}
