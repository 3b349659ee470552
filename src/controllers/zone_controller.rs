use std::sync::Arc;

use validator::Validate;

use crate::dto::zone_dto::{CreateZoneRequest, SetZoneActiveRequest};
use crate::dto::ApiResponse;
use crate::models::ParkingZone;
use crate::services::{CapacitySummary, VehicleLifecycle};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct ZoneController {
    lifecycle: Arc<VehicleLifecycle>,
}

impl ZoneController {
    pub fn new(state: &AppState) -> Self {
        Self {
            lifecycle: state.lifecycle.clone(),
        }
    }

    pub async fn create(&self, request: CreateZoneRequest) -> Result<ApiResponse<ParkingZone>, AppError> {
        request.validate()?;
        let zone = self
            .lifecycle
            .zones()
            .create_zone(
                &request.code,
                &request.name,
                request.description,
                request.total_slots,
                request.priority,
            )
            .await?;
        Ok(ApiResponse::success_with_message(
            zone,
            "Zona creada exitosamente".to_string(),
        ))
    }

    pub async fn list(&self) -> Result<Vec<ParkingZone>, AppError> {
        self.lifecycle.zones().list_zones().await
    }

    pub async fn capacity(&self) -> Result<CapacitySummary, AppError> {
        self.lifecycle.zones().capacity_summary().await
    }

    pub async fn set_active(&self, code: &str, request: SetZoneActiveRequest) -> Result<ParkingZone, AppError> {
        self.lifecycle.zones().set_active(code, request.is_active).await
    }
}
