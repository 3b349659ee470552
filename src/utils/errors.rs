//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del núcleo de valet parking
//! y su conversión a respuestas HTTP apropiadas.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::models::valet::ValetAvailabilityReport;
use crate::models::vehicle::VehicleState;

/// Categoría de un error, independiente del protocolo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Datos mal formados enviados por el llamador
    Validation,
    /// Conflicto con el estado concurrente
    Conflict,
    NotFound,
    /// Recursos agotados (slots o valets), transitorio
    Capacity,
    /// Operación no permitida en el estado actual
    InvalidState,
    Internal,
}

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid plate number: '{0}'")]
    InvalidPlate(String),

    #[error("Invalid phone number: '{0}'")]
    InvalidPhone(String),

    #[error("Invalid mark-out lead time: {minutes} minutes (allowed: {allowed:?})")]
    InvalidLeadTime { minutes: u32, allowed: Vec<u32> },

    #[error("Vehicle {plate} already has an active entry ({token})")]
    DuplicateEntry { plate: String, token: String },

    #[error("Zone {zone} is already at full capacity, slot release rejected")]
    OverRelease { zone: String },

    #[error("Token {0} is already in use")]
    TokenCollision(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No parking capacity left in any active zone")]
    NoCapacity,

    #[error("No valet available: {0}")]
    NoAvailableValet(ValetAvailabilityReport),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: VehicleState, to: VehicleState },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Retrieval scheduled at {scheduled_at} cannot start at {now}")]
    RetrievalTooEarly {
        scheduled_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_)
            | AppError::BadRequest(_)
            | AppError::InvalidPlate(_)
            | AppError::InvalidPhone(_)
            | AppError::InvalidLeadTime { .. } => ErrorKind::Validation,
            AppError::DuplicateEntry { .. }
            | AppError::OverRelease { .. }
            | AppError::TokenCollision(_)
            | AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::NoCapacity | AppError::NoAvailableValet(_) => ErrorKind::Capacity,
            AppError::InvalidTransition { .. }
            | AppError::InvalidState(_)
            | AppError::RetrievalTooEarly { .. } => ErrorKind::InvalidState,
            AppError::Database(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Código estable para clientes de la API
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DB_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::InvalidPlate(_) => "INVALID_PLATE",
            AppError::InvalidPhone(_) => "INVALID_PHONE",
            AppError::InvalidLeadTime { .. } => "INVALID_LEAD_TIME",
            AppError::DuplicateEntry { .. } => "DUPLICATE_ENTRY",
            AppError::OverRelease { .. } => "OVER_RELEASE",
            AppError::TokenCollision(_) => "TOKEN_COLLISION",
            AppError::Conflict(_) => "CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::NoCapacity => "NO_CAPACITY",
            AppError::NoAvailableValet(_) => "NO_AVAILABLE_VALET",
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::RetrievalTooEarly { .. } => "RETRIEVAL_TOO_EARLY",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Un conflicto de unicidad de token se puede reintentar con un token nuevo
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TokenCollision(_))
    }
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let code = self.code();
        let message = self.to_string();

        let (status, error, details) = match &self {
            AppError::Database(e) => {
                error!("❌ Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database Error",
                    Some(json!({ "sql_error": e.to_string() })),
                )
            }
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "Validation Error", Some(json!(e))),
            AppError::InvalidLeadTime { allowed, .. } => (
                StatusCode::BAD_REQUEST,
                "Validation Error",
                Some(json!({ "allowed_minutes": allowed })),
            ),
            AppError::NoAvailableValet(report) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "No Capacity",
                Some(json!(report)),
            ),
            AppError::InvalidTransition { from, to } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Invalid Transition",
                Some(json!({ "from": from, "to": to })),
            ),
            AppError::RetrievalTooEarly { scheduled_at, now } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Retrieval Too Early",
                Some(json!({
                    "scheduled_at": scheduled_at.to_rfc3339(),
                    "now": now.to_rfc3339(),
                })),
            ),
            _ => match kind {
                ErrorKind::Validation => (StatusCode::BAD_REQUEST, "Validation Error", None),
                ErrorKind::Conflict => (StatusCode::CONFLICT, "Conflict", None),
                ErrorKind::NotFound => (StatusCode::NOT_FOUND, "Not Found", None),
                ErrorKind::Capacity => (StatusCode::SERVICE_UNAVAILABLE, "No Capacity", None),
                ErrorKind::InvalidState => (StatusCode::UNPROCESSABLE_ENTITY, "Invalid State", None),
                ErrorKind::Internal => {
                    error!("❌ Internal error: {}", message);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", None)
                }
            },
        };

        if kind != ErrorKind::Internal {
            warn!("⚠️ {} [{}]: {}", error, code, message);
        }

        let body = ErrorResponse {
            error: error.to_string(),
            message,
            details,
            code,
        };

        (status, Json(body)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de conflicto
pub fn conflict_error(resource: &str, field: &str, value: &str) -> AppError {
    AppError::Conflict(format!("{} with {} '{}' already exists", resource, field, value))
}
