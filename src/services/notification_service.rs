//! Ejecución de notificaciones y auditoría
//!
//! Las intenciones que devuelve el ciclo de vida se ejecutan aquí en modo
//! best-effort: un fallo se registra y se devuelve aparte, nunca deshace la
//! transición que lo produjo.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::models::{AuditRecord, NotificationIntent, SideEffect};
use crate::utils::errors::AppResult;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, intent: &NotificationIntent) -> AppResult<()>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> AppResult<()>;
}

/// Escribe las notificaciones en el log; sustituto del envío por WhatsApp
#[derive(Debug, Default, Clone)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn send(&self, intent: &NotificationIntent) -> AppResult<()> {
        info!(
            "📱 {} → {} {}",
            intent.kind.as_str(),
            intent.recipient_phone,
            serde_json::Value::Object(intent.payload.clone())
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) -> AppResult<()> {
        info!(
            "📝 Auditoría {}: {} → {} por {}",
            record.vehicle_id,
            record.from_state.map_or("-", |state| state.as_str()),
            record.to_state,
            record.actor
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SideEffectFailure {
    pub effect: SideEffect,
    pub error: String,
}

#[derive(Clone)]
pub struct SideEffectExecutor {
    notifications: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
}

impl SideEffectExecutor {
    pub fn new(notifications: Arc<dyn NotificationSink>, audit: Arc<dyn AuditSink>) -> Self {
        Self { notifications, audit }
    }

    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingNotificationSink), Arc::new(TracingAuditSink))
    }

    /// Ejecuta todas las intenciones en paralelo y devuelve las que fallaron
    pub async fn execute(&self, effects: &[SideEffect]) -> Vec<SideEffectFailure> {
        let results = join_all(effects.iter().map(|effect| async move {
            let result = match effect {
                SideEffect::Notify(intent) => self.notifications.send(intent).await,
                SideEffect::Audit(record) => self.audit.record(record).await,
            };
            result.map_err(|e| SideEffectFailure {
                effect: effect.clone(),
                error: e.to_string(),
            })
        }))
        .await;

        results
            .into_iter()
            .filter_map(Result::err)
            .inspect(|failure| warn!("⚠️ Efecto secundario fallido: {}", failure.error))
            .collect()
    }
}
