//! Política de tiempos de mark-out
//!
//! Convierte los minutos elegidos por el cliente en una hora absoluta de
//! recogida, define cuándo una recogida está retrasada y lleva el registro de
//! las solicitudes de mark-out. Separado del ciclo de vida para que la
//! política pueda cambiar sin tocar las transiciones.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{MarkOutRequest, MarkOutSource, MarkOutStatus};
use crate::repositories::MarkOutRepository;
use crate::utils::errors::{AppError, AppResult};

pub const DEFAULT_LEAD_MINUTES: [u32; 3] = [5, 7, 10];
pub const DEFAULT_OVERDUE_THRESHOLD_MINUTES: i64 = 2;

pub fn compute_retrieve_at(now: DateTime<Utc>, selected_minutes: u32) -> DateTime<Utc> {
    now + Duration::minutes(i64::from(selected_minutes))
}

/// Retrasada cuando han pasado estrictamente más de `threshold_minutes` desde `scheduled_at`
pub fn is_overdue(scheduled_at: DateTime<Utc>, now: DateTime<Utc>, threshold_minutes: i64) -> bool {
    now - scheduled_at > Duration::minutes(threshold_minutes)
}

pub struct MarkOutScheduler {
    markouts: Arc<dyn MarkOutRepository>,
    allowed_minutes: Vec<u32>,
    default_minutes: u32,
    overdue_threshold_minutes: i64,
}

impl MarkOutScheduler {
    pub fn new(
        markouts: Arc<dyn MarkOutRepository>,
        allowed_minutes: Vec<u32>,
        default_minutes: u32,
        overdue_threshold_minutes: i64,
    ) -> Self {
        Self {
            markouts,
            allowed_minutes,
            default_minutes,
            overdue_threshold_minutes,
        }
    }

    /// 5/7/10 minutos, 10 por defecto y 2 minutos de umbral
    pub fn with_defaults(markouts: Arc<dyn MarkOutRepository>) -> Self {
        Self::new(
            markouts,
            DEFAULT_LEAD_MINUTES.to_vec(),
            10,
            DEFAULT_OVERDUE_THRESHOLD_MINUTES,
        )
    }

    pub fn allowed_minutes(&self) -> &[u32] {
        &self.allowed_minutes
    }

    pub fn default_minutes(&self) -> u32 {
        self.default_minutes
    }

    pub fn overdue_threshold_minutes(&self) -> i64 {
        self.overdue_threshold_minutes
    }

    pub fn validate_lead_time(&self, selected_minutes: u32) -> AppResult<()> {
        if self.allowed_minutes.contains(&selected_minutes) {
            Ok(())
        } else {
            Err(AppError::InvalidLeadTime {
                minutes: selected_minutes,
                allowed: self.allowed_minutes.clone(),
            })
        }
    }

    /// Minutos efectivos: la fuente DEFAULT ignora la elección y usa el valor por defecto
    pub fn resolve_minutes(&self, selected_minutes: Option<u32>, source: MarkOutSource) -> AppResult<u32> {
        let minutes = match (source, selected_minutes) {
            (MarkOutSource::Default, _) | (_, None) => self.default_minutes,
            (_, Some(minutes)) => minutes,
        };
        self.validate_lead_time(minutes)?;
        Ok(minutes)
    }

    pub fn retrieve_at(&self, now: DateTime<Utc>, selected_minutes: u32) -> AppResult<DateTime<Utc>> {
        self.validate_lead_time(selected_minutes)?;
        Ok(compute_retrieve_at(now, selected_minutes))
    }

    /// Registra una solicitud PENDING; una PENDING anterior del mismo vehículo se cancela
    pub async fn open_request(
        &self,
        vehicle_id: Uuid,
        selected_minutes: u32,
        source: MarkOutSource,
        now: DateTime<Utc>,
    ) -> AppResult<MarkOutRequest> {
        let retrieve_at = self.retrieve_at(now, selected_minutes)?;

        if let Some(stale) = self.cancel_pending(vehicle_id, now).await? {
            warn!("⚠️ Mark-out {} del vehículo {} cancelado por una nueva solicitud", stale.id, vehicle_id);
        }

        let request = MarkOutRequest::pending(vehicle_id, selected_minutes, retrieve_at, source, now);
        self.markouts.insert(&request).await?;

        info!(
            "⏱️ Mark-out {} registrado: vehículo {} en {} min ({})",
            request.id,
            vehicle_id,
            selected_minutes,
            source.as_str()
        );
        Ok(request)
    }

    pub async fn complete_pending(&self, vehicle_id: Uuid, now: DateTime<Utc>) -> AppResult<Option<MarkOutRequest>> {
        self.resolve_pending(vehicle_id, MarkOutStatus::Completed, now).await
    }

    pub async fn cancel_pending(&self, vehicle_id: Uuid, now: DateTime<Utc>) -> AppResult<Option<MarkOutRequest>> {
        self.resolve_pending(vehicle_id, MarkOutStatus::Cancelled, now).await
    }

    pub async fn history(&self, vehicle_id: Uuid) -> AppResult<Vec<MarkOutRequest>> {
        self.markouts.list_by_vehicle(vehicle_id).await
    }

    async fn resolve_pending(
        &self,
        vehicle_id: Uuid,
        status: MarkOutStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<MarkOutRequest>> {
        let Some(pending) = self.markouts.find_pending_by_vehicle(vehicle_id).await? else {
            return Ok(None);
        };

        let resolved = pending.resolve(status, now);
        self.markouts.save(&resolved).await?;
        Ok(Some(resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryStore;

    fn scheduler() -> MarkOutScheduler {
        MarkOutScheduler::with_defaults(Arc::new(InMemoryStore::new()))
    }

    #[test]
    fn test_compute_retrieve_at() {
        let now = Utc::now();
        assert_eq!(compute_retrieve_at(now, 7), now + Duration::minutes(7));
    }

    #[test]
    fn test_overdue_is_strictly_after_threshold() {
        let scheduled = Utc::now();
        assert!(!is_overdue(scheduled, scheduled, 2));
        assert!(!is_overdue(scheduled, scheduled + Duration::minutes(2), 2));
        assert!(is_overdue(scheduled, scheduled + Duration::minutes(2) + Duration::seconds(1), 2));
    }

    #[test]
    fn test_lead_time_validation() {
        let scheduler = scheduler();
        for minutes in [5, 7, 10] {
            assert!(scheduler.validate_lead_time(minutes).is_ok());
        }
        let err = scheduler.validate_lead_time(6).unwrap_err();
        assert!(matches!(err, AppError::InvalidLeadTime { minutes: 6, .. }));
    }

    #[test]
    fn test_default_source_uses_default_minutes() {
        let scheduler = scheduler();
        assert_eq!(scheduler.resolve_minutes(Some(5), MarkOutSource::Default).unwrap(), 10);
        assert_eq!(scheduler.resolve_minutes(None, MarkOutSource::Whatsapp).unwrap(), 10);
        assert_eq!(scheduler.resolve_minutes(Some(7), MarkOutSource::Operator).unwrap(), 7);
        assert!(scheduler.resolve_minutes(Some(3), MarkOutSource::Operator).is_err());
    }

    #[tokio::test]
    async fn test_single_pending_request_per_vehicle() {
        let scheduler = scheduler();
        let vehicle_id = Uuid::new_v4();
        let now = Utc::now();

        let first = scheduler.open_request(vehicle_id, 5, MarkOutSource::Whatsapp, now).await.unwrap();
        let second = scheduler.open_request(vehicle_id, 10, MarkOutSource::Operator, now).await.unwrap();

        let history = scheduler.history(vehicle_id).await.unwrap();
        assert_eq!(history.len(), 2);
        let first_stored = history.iter().find(|r| r.id == first.id).unwrap();
        assert_eq!(first_stored.status, MarkOutStatus::Cancelled);

        let completed = scheduler.complete_pending(vehicle_id, now).await.unwrap().unwrap();
        assert_eq!(completed.id, second.id);
        assert_eq!(completed.status, MarkOutStatus::Completed);
        assert!(scheduler.complete_pending(vehicle_id, now).await.unwrap().is_none());
    }
}
