use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::dto::vehicle_dto::{
    CreateEntryRequest, MarkOutRequestBody, TransitionResponse, VehicleListQuery, VehicleResponse,
};
use crate::dto::ApiResponse;
use crate::models::{TransitionOutcome, Vehicle, VehicleState};
use crate::services::{SideEffectExecutor, VehicleLifecycle};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct VehicleController {
    lifecycle: Arc<VehicleLifecycle>,
    side_effects: SideEffectExecutor,
}

impl VehicleController {
    pub fn new(state: &AppState) -> Self {
        Self {
            lifecycle: state.lifecycle.clone(),
            side_effects: state.side_effects.clone(),
        }
    }

    pub async fn create_entry(
        &self,
        request: CreateEntryRequest,
    ) -> Result<ApiResponse<TransitionResponse>, AppError> {
        request.validate()?;
        let outcome = self.lifecycle.create_entry(request.into()).await?;
        let token = outcome.vehicle.token.clone();
        let response = self.finish(outcome).await;
        Ok(ApiResponse::success_with_message(
            response,
            format!("Vehículo registrado con token {}", token),
        ))
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<VehicleResponse, AppError> {
        Ok(self.lifecycle.find_by_id(id).await?.into())
    }

    pub async fn get_by_token(&self, token: &str) -> Result<VehicleResponse, AppError> {
        Ok(self.lifecycle.find_by_token(token).await?.into())
    }

    /// Por fecha de llegada si viene `arrived_on`, si no por estado (PARKED por defecto)
    pub async fn list(&self, query: VehicleListQuery) -> Result<Vec<VehicleResponse>, AppError> {
        let vehicles: Vec<Vehicle> = match (query.arrived_on, query.state) {
            (Some(date), state) => self
                .lifecycle
                .list_arrived_on(date)
                .await?
                .into_iter()
                .filter(|vehicle| state.map_or(true, |s| vehicle.state == s))
                .collect(),
            (None, state) => {
                self.lifecycle
                    .list_by_state(state.unwrap_or(VehicleState::Parked))
                    .await?
            }
        };
        Ok(vehicles.into_iter().map(VehicleResponse::from).collect())
    }

    pub async fn overdue(&self) -> Result<Vec<VehicleResponse>, AppError> {
        let vehicles = self.lifecycle.overdue_retrievals().await?;
        Ok(vehicles.into_iter().map(VehicleResponse::from).collect())
    }

    pub async fn mark_parked(&self, id: Uuid) -> Result<TransitionResponse, AppError> {
        let outcome = self.lifecycle.mark_parked(id).await?;
        Ok(self.finish(outcome).await)
    }

    pub async fn send_markout_options(&self, id: Uuid) -> Result<TransitionResponse, AppError> {
        let outcome = self.lifecycle.send_markout_options(id).await?;
        Ok(self.finish(outcome).await)
    }

    pub async fn request_markout(
        &self,
        id: Uuid,
        request: MarkOutRequestBody,
    ) -> Result<TransitionResponse, AppError> {
        request.validate()?;
        let outcome = self
            .lifecycle
            .request_markout(id, request.selected_minutes, request.source)
            .await?;
        Ok(self.finish(outcome).await)
    }

    pub async fn assign_retrieval_valet(&self, id: Uuid) -> Result<TransitionResponse, AppError> {
        let outcome = self.lifecycle.assign_retrieval_valet(id).await?;
        Ok(self.finish(outcome).await)
    }

    pub async fn start_retrieval(&self, id: Uuid) -> Result<TransitionResponse, AppError> {
        let outcome = self.lifecycle.start_retrieval(id).await?;
        Ok(self.finish(outcome).await)
    }

    pub async fn mark_delivered(&self, id: Uuid) -> Result<TransitionResponse, AppError> {
        let outcome = self.lifecycle.mark_delivered(id).await?;
        Ok(self.finish(outcome).await)
    }

    pub async fn close(&self, id: Uuid) -> Result<TransitionResponse, AppError> {
        let outcome = self.lifecycle.close(id).await?;
        Ok(self.finish(outcome).await)
    }

    pub async fn reassign_valet(&self, id: Uuid) -> Result<TransitionResponse, AppError> {
        let outcome = self.lifecycle.reassign_valet(id).await?;
        Ok(self.finish(outcome).await)
    }

    /// La transición ya está escrita; los efectos se ejecutan sin poder deshacerla
    async fn finish(&self, outcome: TransitionOutcome) -> TransitionResponse {
        let side_effect_failures = self.side_effects.execute(&outcome.intents).await;
        TransitionResponse {
            side_effects: outcome.intents.len(),
            side_effect_failures,
            vehicle: outcome.vehicle.into(),
        }
    }
}
