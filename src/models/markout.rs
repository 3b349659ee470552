//! Modelo de MarkOutRequest
//!
//! Solicitud del cliente para que le traigan el coche dentro de N minutos.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

/// Estado de la solicitud - mapea al ENUM markout_status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "markout_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarkOutStatus {
    Pending,
    Completed,
    Cancelled,
}

/// Canal por el que llegó la solicitud - mapea al ENUM markout_source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "markout_source", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarkOutSource {
    Whatsapp,
    #[default]
    Operator,
    Default,
}

impl MarkOutSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkOutSource::Whatsapp => "WHATSAPP",
            MarkOutSource::Operator => "OPERATOR",
            MarkOutSource::Default => "DEFAULT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkOutRequest {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub selected_minutes: u32,
    pub retrieve_at: DateTime<Utc>,
    pub status: MarkOutStatus,
    pub source: MarkOutSource,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl MarkOutRequest {
    pub fn pending(
        vehicle_id: Uuid,
        selected_minutes: u32,
        retrieve_at: DateTime<Utc>,
        source: MarkOutSource,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            vehicle_id,
            selected_minutes,
            retrieve_at,
            status: MarkOutStatus::Pending,
            source,
            created_at,
            resolved_at: None,
        }
    }

    /// Estado terminal; una solicitud ya resuelta no cambia
    pub fn resolve(&self, status: MarkOutStatus, at: DateTime<Utc>) -> MarkOutRequest {
        if self.status != MarkOutStatus::Pending {
            return self.clone();
        }
        MarkOutRequest {
            status,
            resolved_at: Some(at),
            ..self.clone()
        }
    }
}
