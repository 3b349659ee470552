use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{CustomerType, MarkOutSource, Vehicle, VehicleState};
use crate::services::{EntryRequest, SideEffectFailure};
use crate::utils::validation::{validate_license_plate, validate_not_empty, validate_phone};

// Request de llegada de un vehículo
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEntryRequest {
    #[validate(custom = "validate_license_plate")]
    pub plate_number: String,
    #[validate(custom = "validate_phone")]
    pub phone_number: String,
    #[serde(default)]
    pub customer_type: CustomerType,
    #[validate(length(max = 64), custom = "validate_not_empty")]
    pub entry_operator_id: String,
}

impl From<CreateEntryRequest> for EntryRequest {
    fn from(request: CreateEntryRequest) -> Self {
        Self {
            plate_number: request.plate_number,
            phone_number: request.phone_number,
            customer_type: request.customer_type,
            entry_operator_id: request.entry_operator_id,
        }
    }
}

// Request de mark-out; sin minutos se usa el tiempo por defecto
#[derive(Debug, Default, Deserialize, Validate)]
pub struct MarkOutRequestBody {
    #[validate(range(min = 1, max = 120))]
    pub selected_minutes: Option<u32>,
    #[serde(default)]
    pub source: MarkOutSource,
}

#[derive(Debug, Default, Deserialize)]
pub struct VehicleListQuery {
    pub state: Option<VehicleState>,
    pub arrived_on: Option<NaiveDate>,
}

// Response de vehículo con duraciones derivadas
#[derive(Debug, Serialize)]
pub struct VehicleResponse {
    #[serde(flatten)]
    pub vehicle: Vehicle,
    pub total_duration_minutes: Option<i64>,
    pub retrieval_duration_minutes: Option<i64>,
}

impl From<Vehicle> for VehicleResponse {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            total_duration_minutes: vehicle.total_duration().map(|d| d.num_minutes()),
            retrieval_duration_minutes: vehicle.retrieval_duration().map(|d| d.num_minutes()),
            vehicle,
        }
    }
}

// Response de una transición tras ejecutar sus efectos secundarios
#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub vehicle: VehicleResponse,
    pub side_effects: usize,
    pub side_effect_failures: Vec<SideEffectFailure>,
}
