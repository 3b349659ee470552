//! Routers HTTP
//!
//! Monta los routers por recurso bajo `/api` junto con el health check, CORS
//! y el trazado de requests.

pub mod valet_routes;
pub mod vehicle_routes;
pub mod zone_routes;

use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::middleware::cors::cors_layer;
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/vehicles", vehicle_routes::create_vehicle_router())
        .nest("/api/valets", valet_routes::create_valet_router())
        .nest("/api/zones", zone_routes::create_zone_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let capacity = state.lifecycle.zones().capacity_summary().await.ok();
    Json(json!({
        "status": "ok",
        "service": "valet-parking",
        "environment": state.config.environment,
        "available_slots": capacity.map(|summary| summary.available_slots),
        "timestamp": state.lifecycle.now().to_rfc3339(),
    }))
}
