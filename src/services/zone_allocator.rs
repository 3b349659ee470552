//! Asignador de slots por zona
//!
//! Elige la zona activa con slots libres de menor prioridad (empate por
//! código) y emite una etiqueta de slot única dentro de la zona. Reserva y
//! liberación se ejecutan dentro de una sección crítica por asignador.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::ParkingZone;
use crate::repositories::ZoneRepository;
use crate::utils::errors::{not_found_error, AppError, AppResult};

/// Slot reservado para un vehículo
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotReservation {
    pub zone_id: Uuid,
    pub zone_code: String,
    pub slot_label: String,
}

/// Capacidad agregada de las zonas activas
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapacitySummary {
    pub active_zones: usize,
    pub total_slots: u32,
    pub available_slots: u32,
}

pub struct ZoneAllocator {
    zones: Arc<dyn ZoneRepository>,
    lock: Mutex<()>,
}

impl ZoneAllocator {
    pub fn new(zones: Arc<dyn ZoneRepository>) -> Self {
        Self {
            zones,
            lock: Mutex::new(()),
        }
    }

    pub async fn create_zone(
        &self,
        code: &str,
        name: &str,
        description: Option<String>,
        total_slots: u32,
        priority: i32,
    ) -> AppResult<ParkingZone> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(AppError::BadRequest("Zone code cannot be empty".to_string()));
        }
        if total_slots == 0 {
            return Err(AppError::BadRequest(format!("Zone {} needs at least one slot", code)));
        }

        let zone = ParkingZone::new(code, name.trim().to_string(), description, total_slots, priority);
        let _guard = self.lock.lock().await;
        self.zones.insert(&zone).await?;

        info!("🅿️ Zona {} creada con {} slots (prioridad {})", zone.code, total_slots, priority);
        Ok(zone)
    }

    pub async fn reserve_slot(&self) -> AppResult<SlotReservation> {
        let _guard = self.lock.lock().await;

        let mut candidates: Vec<ParkingZone> = self
            .zones
            .list_all()
            .await?
            .into_iter()
            .filter(ParkingZone::is_eligible)
            .collect();
        candidates.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.code.cmp(&b.code)));

        let Some(zone) = candidates.first() else {
            warn!("🚫 Sin capacidad: ninguna zona activa con slots libres");
            return Err(AppError::NoCapacity);
        };

        let (updated, slot_label) = zone.reserve()?;
        let updated = self.persist(updated).await?;

        info!(
            "🅿️ Slot {}-{} reservado ({} libres)",
            updated.code, slot_label, updated.available_slots
        );
        Ok(SlotReservation {
            zone_id: updated.id,
            zone_code: updated.code,
            slot_label,
        })
    }

    pub async fn release_slot(&self, zone_code: &str, slot_label: &str) -> AppResult<ParkingZone> {
        let _guard = self.lock.lock().await;

        let zone = self
            .zones
            .find_by_code(zone_code)
            .await?
            .ok_or_else(|| not_found_error("Zone", zone_code))?;

        let updated = match zone.release(slot_label) {
            Ok(updated) => updated,
            Err(e) => {
                warn!("❌ Release rechazado en zona {}: {}", zone_code, e);
                return Err(e);
            }
        };
        let updated = self.persist(updated).await?;

        info!(
            "🅿️ Slot {}-{} liberado ({} libres)",
            updated.code, slot_label, updated.available_slots
        );
        Ok(updated)
    }

    /// Vuelve a ocupar un slot recién liberado cuando la transición que lo
    /// liberó no llega a completarse
    pub async fn restore_slot(&self, zone_code: &str, slot_label: &str) -> AppResult<ParkingZone> {
        let _guard = self.lock.lock().await;

        let zone = self
            .zones
            .find_by_code(zone_code)
            .await?
            .ok_or_else(|| not_found_error("Zone", zone_code))?;
        let restored = self.persist(zone.occupy(slot_label)?).await?;

        warn!("↩️ Slot {}-{} ocupado de nuevo", restored.code, slot_label);
        Ok(restored)
    }

    pub async fn set_active(&self, zone_code: &str, is_active: bool) -> AppResult<ParkingZone> {
        let _guard = self.lock.lock().await;

        let zone = self
            .zones
            .find_by_code(zone_code)
            .await?
            .ok_or_else(|| not_found_error("Zone", zone_code))?;
        let zone = self.persist(ParkingZone { is_active, ..zone }).await?;

        info!("🅿️ Zona {} {}", zone.code, if is_active { "activada" } else { "desactivada" });
        Ok(zone)
    }

    /// Escribe el snapshot con la versión siguiente a la leída
    async fn persist(&self, zone: ParkingZone) -> AppResult<ParkingZone> {
        let expected = zone.version;
        let next = ParkingZone {
            version: expected + 1,
            ..zone
        };
        self.zones.save(&next, expected).await?;
        Ok(next)
    }

    pub async fn list_zones(&self) -> AppResult<Vec<ParkingZone>> {
        self.zones.list_all().await
    }

    pub async fn capacity_summary(&self) -> AppResult<CapacitySummary> {
        let zones = self.zones.list_all().await?;
        Ok(zones
            .iter()
            .filter(|zone| zone.is_active)
            .fold(CapacitySummary::default(), |mut summary, zone| {
                summary.active_zones += 1;
                summary.total_slots += zone.total_slots;
                summary.available_slots += zone.available_slots;
                summary
            }))
    }
}
