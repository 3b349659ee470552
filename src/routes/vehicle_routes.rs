use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::vehicle_controller::VehicleController;
use crate::dto::vehicle_dto::{
    CreateEntryRequest, MarkOutRequestBody, TransitionResponse, VehicleListQuery, VehicleResponse,
};
use crate::dto::ApiResponse;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_vehicle_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_entry).get(list_vehicles))
        .route("/overdue", get(list_overdue))
        .route("/token/:token", get(get_vehicle_by_token))
        .route("/:id", get(get_vehicle))
        .route("/:id/parked", post(mark_parked))
        .route("/:id/markout-options", post(send_markout_options))
        .route("/:id/markout", post(request_markout))
        .route("/:id/retrieval-valet", post(assign_retrieval_valet))
        .route("/:id/start-retrieval", post(start_retrieval))
        .route("/:id/delivered", post(mark_delivered))
        .route("/:id/close", post(close_vehicle))
        .route("/:id/reassign", post(reassign_valet))
}

type TransitionResult = Result<Json<TransitionResponse>, AppError>;

async fn create_entry(
    State(state): State<AppState>,
    Json(request): Json<CreateEntryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransitionResponse>>), AppError> {
    let controller = VehicleController::new(&state);
    let response = controller.create_entry(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VehicleResponse>, AppError> {
    let controller = VehicleController::new(&state);
    Ok(Json(controller.get_by_id(id).await?))
}

async fn get_vehicle_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<VehicleResponse>, AppError> {
    let controller = VehicleController::new(&state);
    Ok(Json(controller.get_by_token(&token).await?))
}

async fn list_vehicles(
    State(state): State<AppState>,
    Query(query): Query<VehicleListQuery>,
) -> Result<Json<Vec<VehicleResponse>>, AppError> {
    let controller = VehicleController::new(&state);
    Ok(Json(controller.list(query).await?))
}

async fn list_overdue(State(state): State<AppState>) -> Result<Json<Vec<VehicleResponse>>, AppError> {
    let controller = VehicleController::new(&state);
    Ok(Json(controller.overdue().await?))
}

async fn mark_parked(State(state): State<AppState>, Path(id): Path<Uuid>) -> TransitionResult {
    Ok(Json(VehicleController::new(&state).mark_parked(id).await?))
}

async fn send_markout_options(State(state): State<AppState>, Path(id): Path<Uuid>) -> TransitionResult {
    Ok(Json(VehicleController::new(&state).send_markout_options(id).await?))
}

async fn request_markout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<MarkOutRequestBody>,
) -> TransitionResult {
    Ok(Json(VehicleController::new(&state).request_markout(id, request).await?))
}

async fn assign_retrieval_valet(State(state): State<AppState>, Path(id): Path<Uuid>) -> TransitionResult {
    Ok(Json(VehicleController::new(&state).assign_retrieval_valet(id).await?))
}

async fn start_retrieval(State(state): State<AppState>, Path(id): Path<Uuid>) -> TransitionResult {
    Ok(Json(VehicleController::new(&state).start_retrieval(id).await?))
}

async fn mark_delivered(State(state): State<AppState>, Path(id): Path<Uuid>) -> TransitionResult {
    Ok(Json(VehicleController::new(&state).mark_delivered(id).await?))
}

async fn close_vehicle(State(state): State<AppState>, Path(id): Path<Uuid>) -> TransitionResult {
    Ok(Json(VehicleController::new(&state).close(id).await?))
}

async fn reassign_valet(State(state): State<AppState>, Path(id): Path<Uuid>) -> TransitionResult {
    Ok(Json(VehicleController::new(&state).reassign_valet(id).await?))
}
