//! Modelo de Vehicle
//!
//! Snapshot inmutable de un vehículo en el ciclo de valet parking y la tabla
//! de transiciones permitidas. Las transiciones son funciones puras: devuelven
//! un snapshot nuevo o un error tipado, nunca mutan el registro almacenado.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use crate::services::markout_scheduler;
use crate::utils::errors::{AppError, AppResult};

/// Estado del vehículo - mapea al ENUM vehicle_state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "vehicle_state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleState {
    Parking,
    Parked,
    WaitingMarkout,
    Scheduled,
    RetrievalAssigned,
    OnTheWay,
    Delivered,
    Closed,
}

impl VehicleState {
    pub const ALL: [VehicleState; 8] = [
        VehicleState::Parking,
        VehicleState::Parked,
        VehicleState::WaitingMarkout,
        VehicleState::Scheduled,
        VehicleState::RetrievalAssigned,
        VehicleState::OnTheWay,
        VehicleState::Delivered,
        VehicleState::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleState::Parking => "PARKING",
            VehicleState::Parked => "PARKED",
            VehicleState::WaitingMarkout => "WAITING_MARKOUT",
            VehicleState::Scheduled => "SCHEDULED",
            VehicleState::RetrievalAssigned => "RETRIEVAL_ASSIGNED",
            VehicleState::OnTheWay => "ON_THE_WAY",
            VehicleState::Delivered => "DELIVERED",
            VehicleState::Closed => "CLOSED",
        }
    }

    /// Destinos permitidos desde este estado
    pub fn allowed_targets(&self) -> &'static [VehicleState] {
        match self {
            VehicleState::Parking => &[VehicleState::Parked],
            VehicleState::Parked => &[VehicleState::Scheduled, VehicleState::WaitingMarkout],
            VehicleState::WaitingMarkout => &[VehicleState::Scheduled],
            VehicleState::Scheduled => &[VehicleState::RetrievalAssigned],
            VehicleState::RetrievalAssigned => &[VehicleState::OnTheWay],
            VehicleState::OnTheWay => &[VehicleState::Delivered],
            VehicleState::Delivered => &[VehicleState::Closed],
            VehicleState::Closed => &[],
        }
    }

    pub fn can_transition_to(&self, to: VehicleState) -> bool {
        self.allowed_targets().contains(&to)
    }

    /// Un vehículo activo bloquea nuevas entradas con la misma matrícula
    pub fn is_active(&self) -> bool {
        !matches!(self, VehicleState::Delivered | VehicleState::Closed)
    }
}

impl fmt::Display for VehicleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tipo de cliente registrado en la entrada - mapea al ENUM customer_type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "customer_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerType {
    #[default]
    WalkIn,
    Regular,
    Vip,
}

/// Vehicle principal - mapea exactamente a la tabla vehicles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub token: String,
    pub plate_number: String,
    pub phone_number: String,
    pub customer_type: CustomerType,
    pub entry_operator_id: String,
    pub state: VehicleState,
    pub zone_code: Option<String>,
    pub slot_label: Option<String>,
    pub parking_valet_id: Option<Uuid>,
    pub retrieval_valet_id: Option<Uuid>,
    pub arrived_at: DateTime<Utc>,
    pub parked_at: Option<DateTime<Utc>>,
    pub markout_requested_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub retrieval_started_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Datos validados para registrar una entrada
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub token: String,
    pub plate_number: String,
    pub phone_number: String,
    pub customer_type: CustomerType,
    pub entry_operator_id: String,
    pub zone_code: String,
    pub slot_label: String,
    pub parking_valet_id: Uuid,
}

impl Vehicle {
    /// Crear el registro en estado PARKING
    pub fn new_entry(entry: NewEntry, arrived_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: entry.token,
            plate_number: entry.plate_number,
            phone_number: entry.phone_number,
            customer_type: entry.customer_type,
            entry_operator_id: entry.entry_operator_id,
            state: VehicleState::Parking,
            zone_code: Some(entry.zone_code),
            slot_label: Some(entry.slot_label),
            parking_valet_id: Some(entry.parking_valet_id),
            retrieval_valet_id: None,
            arrived_at,
            parked_at: None,
            markout_requested_at: None,
            scheduled_at: None,
            retrieval_started_at: None,
            delivered_at: None,
            closed_at: None,
        }
    }

    /// Verifica que el estado actual sea uno de los esperados para ir a `to`
    pub fn ensure_state(&self, expected: &[VehicleState], to: VehicleState) -> AppResult<()> {
        if expected.contains(&self.state) {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                from: self.state,
                to,
            })
        }
    }

    /// Aplica una transición de la tabla y estampa el timestamp correspondiente
    pub fn transition(&self, to: VehicleState, at: DateTime<Utc>) -> AppResult<Vehicle> {
        if !self.state.can_transition_to(to) {
            return Err(AppError::InvalidTransition {
                from: self.state,
                to,
            });
        }

        let mut next = self.clone();
        next.state = to;
        match to {
            VehicleState::Parked => next.parked_at = Some(at),
            VehicleState::Scheduled => next.markout_requested_at = Some(at),
            VehicleState::OnTheWay => next.retrieval_started_at = Some(at),
            VehicleState::Delivered => next.delivered_at = Some(at),
            VehicleState::Closed => next.closed_at = Some(at),
            VehicleState::Parking | VehicleState::WaitingMarkout | VehicleState::RetrievalAssigned => {}
        }
        Ok(next)
    }

    /// SCHEDULED con la hora de recogida calculada
    pub fn schedule(&self, at: DateTime<Utc>, scheduled_at: DateTime<Utc>) -> AppResult<Vehicle> {
        let mut next = self.transition(VehicleState::Scheduled, at)?;
        next.scheduled_at = Some(scheduled_at);
        Ok(next)
    }

    /// RETRIEVAL_ASSIGNED con el valet de recogida
    pub fn with_retrieval_valet(&self, valet_id: Uuid, at: DateTime<Utc>) -> AppResult<Vehicle> {
        let mut next = if self.state == VehicleState::RetrievalAssigned {
            self.clone()
        } else {
            self.transition(VehicleState::RetrievalAssigned, at)?
        };
        next.retrieval_valet_id = Some(valet_id);
        Ok(next)
    }

    /// Valet que tiene la tarea activa del vehículo, si la hay
    pub fn active_valet(&self) -> Option<Uuid> {
        match self.state {
            VehicleState::Parking => self.parking_valet_id,
            VehicleState::RetrievalAssigned | VehicleState::OnTheWay => self.retrieval_valet_id,
            _ => None,
        }
    }

    pub fn total_duration(&self) -> Option<Duration> {
        Some(self.delivered_at? - self.parked_at?)
    }

    pub fn retrieval_duration(&self) -> Option<Duration> {
        Some(self.delivered_at? - self.retrieval_started_at?)
    }

    pub fn is_overdue_for_retrieval(&self, now: DateTime<Utc>, threshold_minutes: i64) -> bool {
        match (self.state, self.scheduled_at) {
            (VehicleState::Scheduled, Some(scheduled_at)) => {
                markout_scheduler::is_overdue(scheduled_at, now, threshold_minutes)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(now: DateTime<Utc>) -> Vehicle {
        Vehicle::new_entry(
            NewEntry {
                token: "VLT-123456789".to_string(),
                plate_number: "KL07AB1234".to_string(),
                phone_number: "9876543210".to_string(),
                customer_type: CustomerType::WalkIn,
                entry_operator_id: "op-1".to_string(),
                zone_code: "A".to_string(),
                slot_label: "1".to_string(),
                parking_valet_id: Uuid::new_v4(),
            },
            now,
        )
    }

    #[test]
    fn test_transition_table_is_exact() {
        let valid = [
            (VehicleState::Parking, VehicleState::Parked),
            (VehicleState::Parked, VehicleState::Scheduled),
            (VehicleState::Parked, VehicleState::WaitingMarkout),
            (VehicleState::WaitingMarkout, VehicleState::Scheduled),
            (VehicleState::Scheduled, VehicleState::RetrievalAssigned),
            (VehicleState::RetrievalAssigned, VehicleState::OnTheWay),
            (VehicleState::OnTheWay, VehicleState::Delivered),
            (VehicleState::Delivered, VehicleState::Closed),
        ];

        for from in VehicleState::ALL {
            for to in VehicleState::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    valid.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_invalid_transition_leaves_snapshot_untouched() {
        let now = Utc::now();
        let vehicle = sample(now);
        let err = vehicle.transition(VehicleState::Delivered, now).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: VehicleState::Parking,
                to: VehicleState::Delivered
            }
        ));
        assert_eq!(vehicle.state, VehicleState::Parking);
        assert!(vehicle.delivered_at.is_none());
    }

    #[test]
    fn test_transition_stamps_timestamps() {
        let now = Utc::now();
        let parked = sample(now).transition(VehicleState::Parked, now).unwrap();
        assert_eq!(parked.parked_at, Some(now));

        let scheduled = parked.schedule(now, now + Duration::minutes(5)).unwrap();
        assert_eq!(scheduled.markout_requested_at, Some(now));
        assert_eq!(scheduled.scheduled_at, Some(now + Duration::minutes(5)));
    }

    #[test]
    fn test_durations_and_overdue() {
        let now = Utc::now();
        let mut vehicle = sample(now);
        vehicle.state = VehicleState::Scheduled;
        vehicle.parked_at = Some(now);
        vehicle.scheduled_at = Some(now + Duration::minutes(5));

        assert!(!vehicle.is_overdue_for_retrieval(now + Duration::minutes(7), 2));
        assert!(vehicle.is_overdue_for_retrieval(now + Duration::minutes(8), 2));

        vehicle.retrieval_started_at = Some(now + Duration::minutes(5));
        vehicle.delivered_at = Some(now + Duration::minutes(12));
        assert_eq!(vehicle.total_duration(), Some(Duration::minutes(12)));
        assert_eq!(vehicle.retrieval_duration(), Some(Duration::minutes(7)));
    }

    #[test]
    fn test_display_matches_wire_name() {
        for state in VehicleState::ALL {
            assert_eq!(serde_json::to_value(state).unwrap(), state.to_string());
        }
        assert!(serde_json::from_str::<VehicleState>("\"UNKNOWN\"").is_err());
    }
}
