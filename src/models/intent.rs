//! Intenciones de efectos secundarios
//!
//! El ciclo de vida no envía notificaciones ni escribe auditoría: devuelve
//! estas intenciones para que el llamador las ejecute en modo best-effort.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::vehicle::{Vehicle, VehicleState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    EntryConfirmation,
    MarkOutOptions,
    RetrievalStarted,
    DeliveryConfirmation,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::EntryConfirmation => "ENTRY_CONFIRMATION",
            NotificationKind::MarkOutOptions => "MARKOUT_OPTIONS",
            NotificationKind::RetrievalStarted => "RETRIEVAL_STARTED",
            NotificationKind::DeliveryConfirmation => "DELIVERY_CONFIRMATION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub recipient_phone: String,
    pub kind: NotificationKind,
    pub payload: Map<String, Value>,
}

impl NotificationIntent {
    /// Payload base: token, matrícula, zona y slot del vehículo
    pub fn for_vehicle(vehicle: &Vehicle, kind: NotificationKind) -> Self {
        let mut payload = Map::new();
        payload.insert("token".into(), Value::from(vehicle.token.clone()));
        payload.insert("plate_number".into(), Value::from(vehicle.plate_number.clone()));
        if let Some(zone) = &vehicle.zone_code {
            payload.insert("zone".into(), Value::from(zone.clone()));
        }
        if let Some(slot) = &vehicle.slot_label {
            payload.insert("slot".into(), Value::from(slot.clone()));
        }
        Self {
            recipient_phone: vehicle.phone_number.clone(),
            kind,
            payload,
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub vehicle_id: Uuid,
    /// `None` en la creación del registro
    pub from_state: Option<VehicleState>,
    pub to_state: VehicleState,
    pub actor: String,
    pub at: DateTime<Utc>,
    pub metadata: Map<String, Value>,
}

impl AuditRecord {
    pub fn transition(
        vehicle: &Vehicle,
        from_state: Option<VehicleState>,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            vehicle_id: vehicle.id,
            from_state,
            to_state: vehicle.state,
            actor: actor.to_string(),
            at,
            metadata: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    Notify(NotificationIntent),
    Audit(AuditRecord),
}

/// Resultado de una transición: snapshot actualizado + intenciones
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub vehicle: Vehicle,
    pub intents: Vec<SideEffect>,
}

impl TransitionOutcome {
    pub fn new(vehicle: Vehicle) -> Self {
        Self {
            vehicle,
            intents: Vec::new(),
        }
    }

    pub fn notify(mut self, intent: NotificationIntent) -> Self {
        self.intents.push(SideEffect::Notify(intent));
        self
    }

    pub fn audit(mut self, record: AuditRecord) -> Self {
        self.intents.push(SideEffect::Audit(record));
        self
    }

    pub fn notifications(&self) -> impl Iterator<Item = &NotificationIntent> {
        self.intents.iter().filter_map(|effect| match effect {
            SideEffect::Notify(intent) => Some(intent),
            SideEffect::Audit(_) => None,
        })
    }

    pub fn audits(&self) -> impl Iterator<Item = &AuditRecord> {
        self.intents.iter().filter_map(|effect| match effect {
            SideEffect::Audit(record) => Some(record),
            SideEffect::Notify(_) => None,
        })
    }
}
