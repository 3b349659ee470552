use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::dto::valet_dto::{
    OnboardValetRequest, ResetDailyResponse, SetValetActiveRequest, UpdateValetStatusRequest,
};
use crate::dto::ApiResponse;
use crate::models::{Valet, ValetAvailabilityReport};
use crate::services::VehicleLifecycle;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct ValetController {
    lifecycle: Arc<VehicleLifecycle>,
}

impl ValetController {
    pub fn new(state: &AppState) -> Self {
        Self {
            lifecycle: state.lifecycle.clone(),
        }
    }

    pub async fn onboard(&self, request: OnboardValetRequest) -> Result<ApiResponse<Valet>, AppError> {
        request.validate()?;
        let valet = self
            .lifecycle
            .valets()
            .onboard(&request.name, &request.phone, request.shift())
            .await?;
        Ok(ApiResponse::success_with_message(
            valet,
            "Valet registrado exitosamente".to_string(),
        ))
    }

    pub async fn list(&self) -> Result<Vec<Valet>, AppError> {
        self.lifecycle.valets().list_valets().await
    }

    /// Un valet BUSY que sale de servicio entrega su tarea a otro valet
    pub async fn update_status(
        &self,
        id: Uuid,
        request: UpdateValetStatusRequest,
    ) -> Result<Valet, AppError> {
        self.lifecycle.change_valet_status(id, request.status).await
    }

    /// Un valet inactivo sale de la rotación sin tocar su estado
    pub async fn set_active(&self, id: Uuid, request: SetValetActiveRequest) -> Result<Valet, AppError> {
        self.lifecycle.valets().set_active(id, request.is_active).await
    }

    pub async fn reset_daily(&self) -> Result<ResetDailyResponse, AppError> {
        let valets_reset = self.lifecycle.valets().reset_daily_counters().await?;
        Ok(ResetDailyResponse { valets_reset })
    }

    pub async fn availability(&self) -> Result<ValetAvailabilityReport, AppError> {
        self.lifecycle.valets().availability_report().await
    }
}
