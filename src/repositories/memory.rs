//! Store en memoria
//!
//! Implementa los cuatro contratos sobre mapas protegidos con `RwLock`. Se usa
//! en los tests y cuando el servicio arranca sin `DATABASE_URL`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MarkOutRepository, ValetRepository, VehicleRepository, ZoneRepository};
use crate::models::{MarkOutRequest, MarkOutStatus, ParkingZone, Valet, Vehicle, VehicleState};
use crate::utils::errors::{conflict_error, not_found_error, AppError, AppResult};

fn stale_version(entity: &str, id: &str, stored: i64, expected: i64) -> AppError {
    AppError::Conflict(format!(
        "{} {} is at version {} but {} was expected",
        entity, id, stored, expected
    ))
}

#[derive(Default)]
pub struct InMemoryStore {
    vehicles: RwLock<HashMap<Uuid, Vehicle>>,
    valets: RwLock<HashMap<Uuid, Valet>>,
    zones: RwLock<HashMap<String, ParkingZone>>,
    markouts: RwLock<HashMap<Uuid, MarkOutRequest>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VehicleRepository for InMemoryStore {
    async fn insert(&self, vehicle: &Vehicle) -> AppResult<()> {
        let mut vehicles = self.vehicles.write().await;

        if vehicles.values().any(|v| v.token == vehicle.token) {
            return Err(AppError::TokenCollision(vehicle.token.clone()));
        }
        if let Some(active) = vehicles
            .values()
            .find(|v| v.plate_number == vehicle.plate_number && v.state.is_active())
        {
            return Err(AppError::DuplicateEntry {
                plate: active.plate_number.clone(),
                token: active.token.clone(),
            });
        }

        vehicles.insert(vehicle.id, vehicle.clone());
        Ok(())
    }

    async fn update(&self, vehicle: &Vehicle, expected: VehicleState) -> AppResult<()> {
        let mut vehicles = self.vehicles.write().await;
        let stored = vehicles
            .get_mut(&vehicle.id)
            .ok_or_else(|| not_found_error("Vehicle", &vehicle.id.to_string()))?;

        if stored.state != expected {
            return Err(AppError::Conflict(format!(
                "Vehicle {} is {} but {} was expected",
                vehicle.id, stored.state, expected
            )));
        }

        *stored = vehicle.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        Ok(self.vehicles.read().await.get(&id).cloned())
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<Vehicle>> {
        Ok(self
            .vehicles
            .read()
            .await
            .values()
            .find(|v| v.token == token)
            .cloned())
    }

    async fn find_active_by_plate(&self, plate_number: &str) -> AppResult<Option<Vehicle>> {
        Ok(self
            .vehicles
            .read()
            .await
            .values()
            .find(|v| v.plate_number == plate_number && v.state.is_active())
            .cloned())
    }

    async fn find_active_by_valet(&self, valet_id: Uuid) -> AppResult<Option<Vehicle>> {
        Ok(self
            .vehicles
            .read()
            .await
            .values()
            .find(|v| v.active_valet() == Some(valet_id))
            .cloned())
    }

    async fn list_by_state(&self, state: VehicleState) -> AppResult<Vec<Vehicle>> {
        let mut vehicles: Vec<Vehicle> = self
            .vehicles
            .read()
            .await
            .values()
            .filter(|v| v.state == state)
            .cloned()
            .collect();
        vehicles.sort_by_key(|v| v.arrived_at);
        Ok(vehicles)
    }

    async fn list_arrived_on(&self, date: NaiveDate) -> AppResult<Vec<Vehicle>> {
        let mut vehicles: Vec<Vehicle> = self
            .vehicles
            .read()
            .await
            .values()
            .filter(|v| v.arrived_at.date_naive() == date)
            .cloned()
            .collect();
        vehicles.sort_by_key(|v| v.arrived_at);
        Ok(vehicles)
    }
}

#[async_trait]
impl ValetRepository for InMemoryStore {
    async fn insert(&self, valet: &Valet) -> AppResult<()> {
        let mut valets = self.valets.write().await;
        if valets.values().any(|v| v.phone == valet.phone) {
            return Err(conflict_error("Valet", "phone", &valet.phone));
        }
        valets.insert(valet.id, valet.clone());
        Ok(())
    }

    async fn save(&self, valet: &Valet, expected_version: i64) -> AppResult<()> {
        let mut valets = self.valets.write().await;
        let stored = valets
            .get_mut(&valet.id)
            .ok_or_else(|| not_found_error("Valet", &valet.id.to_string()))?;

        if stored.version != expected_version {
            return Err(stale_version("Valet", &valet.id.to_string(), stored.version, expected_version));
        }

        *stored = valet.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Valet>> {
        Ok(self.valets.read().await.get(&id).cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Valet>> {
        let mut valets: Vec<Valet> = self.valets.read().await.values().cloned().collect();
        valets.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(valets)
    }
}

#[async_trait]
impl ZoneRepository for InMemoryStore {
    async fn insert(&self, zone: &ParkingZone) -> AppResult<()> {
        let mut zones = self.zones.write().await;
        if zones.contains_key(&zone.code) {
            return Err(conflict_error("Zone", "code", &zone.code));
        }
        zones.insert(zone.code.clone(), zone.clone());
        Ok(())
    }

    async fn save(&self, zone: &ParkingZone, expected_version: i64) -> AppResult<()> {
        let mut zones = self.zones.write().await;
        let stored = zones
            .get_mut(&zone.code)
            .ok_or_else(|| not_found_error("Zone", &zone.code))?;

        if stored.version != expected_version {
            return Err(stale_version("Zone", &zone.code, stored.version, expected_version));
        }

        *stored = zone.clone();
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<ParkingZone>> {
        Ok(self.zones.read().await.get(code).cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<ParkingZone>> {
        let mut zones: Vec<ParkingZone> = self.zones.read().await.values().cloned().collect();
        zones.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.code.cmp(&b.code)));
        Ok(zones)
    }
}

#[async_trait]
impl MarkOutRepository for InMemoryStore {
    async fn insert(&self, request: &MarkOutRequest) -> AppResult<()> {
        let mut markouts = self.markouts.write().await;
        if request.status == MarkOutStatus::Pending
            && markouts
                .values()
                .any(|m| m.vehicle_id == request.vehicle_id && m.status == MarkOutStatus::Pending)
        {
            return Err(AppError::Conflict(format!(
                "Vehicle {} already has a pending mark-out",
                request.vehicle_id
            )));
        }
        markouts.insert(request.id, request.clone());
        Ok(())
    }

    async fn save(&self, request: &MarkOutRequest) -> AppResult<()> {
        let mut markouts = self.markouts.write().await;
        match markouts.get_mut(&request.id) {
            Some(stored) => {
                *stored = request.clone();
                Ok(())
            }
            None => Err(not_found_error("MarkOutRequest", &request.id.to_string())),
        }
    }

    async fn find_pending_by_vehicle(&self, vehicle_id: Uuid) -> AppResult<Option<MarkOutRequest>> {
        Ok(self
            .markouts
            .read()
            .await
            .values()
            .find(|m| m.vehicle_id == vehicle_id && m.status == MarkOutStatus::Pending)
            .cloned())
    }

    async fn list_by_vehicle(&self, vehicle_id: Uuid) -> AppResult<Vec<MarkOutRequest>> {
        let mut requests: Vec<MarkOutRequest> = self
            .markouts
            .read()
            .await
            .values()
            .filter(|m| m.vehicle_id == vehicle_id)
            .cloned()
            .collect();
        requests.sort_by_key(|m| m.created_at);
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CustomerType, NewEntry};
    use chrono::Utc;

    fn entry(token: &str, plate: &str) -> Vehicle {
        Vehicle::new_entry(
            NewEntry {
                token: token.to_string(),
                plate_number: plate.to_string(),
                phone_number: "9876543210".to_string(),
                customer_type: CustomerType::WalkIn,
                entry_operator_id: "op".to_string(),
                zone_code: "A".to_string(),
                slot_label: "1".to_string(),
                parking_valet_id: Uuid::new_v4(),
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_insert_enforces_token_and_plate_uniqueness() {
        let store = InMemoryStore::new();
        VehicleRepository::insert(&store, &entry("VLT-000000001", "KL07AB1234")).await.unwrap();

        let same_token = VehicleRepository::insert(&store, &entry("VLT-000000001", "KL07AB9999")).await;
        assert!(matches!(same_token, Err(AppError::TokenCollision(_))));

        let same_plate = VehicleRepository::insert(&store, &entry("VLT-000000002", "KL07AB1234")).await;
        assert!(matches!(same_plate, Err(AppError::DuplicateEntry { .. })));
    }

    #[tokio::test]
    async fn test_update_is_compare_and_swap() {
        let store = InMemoryStore::new();
        let vehicle = entry("VLT-000000003", "KL07AB1234");
        VehicleRepository::insert(&store, &vehicle).await.unwrap();

        let parked = vehicle.transition(VehicleState::Parked, Utc::now()).unwrap();
        store.update(&parked, VehicleState::Parking).await.unwrap();

        let stale = store.update(&parked, VehicleState::Parking).await;
        assert!(matches!(stale, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_valet_and_zone_saves_check_version() {
        let store = InMemoryStore::new();
        let valet = Valet::new("V".into(), "9876543210".into(), None);
        ValetRepository::insert(&store, &valet).await.unwrap();

        let first = Valet { version: 1, ..valet.clone() };
        ValetRepository::save(&store, &first, 0).await.unwrap();
        let lost = ValetRepository::save(&store, &Valet { version: 1, ..valet }, 0).await;
        assert!(matches!(lost, Err(AppError::Conflict(_))));

        let zone = ParkingZone::new("A".into(), "A".into(), None, 1, 1);
        ZoneRepository::insert(&store, &zone).await.unwrap();
        let (reserved, _) = zone.reserve().unwrap();
        let reserved = ParkingZone { version: 1, ..reserved };
        ZoneRepository::save(&store, &reserved, 0).await.unwrap();
        assert!(matches!(
            ZoneRepository::save(&store, &reserved, 0).await,
            Err(AppError::Conflict(_))
        ));
        let stored = ZoneRepository::find_by_code(&store, "A").await.unwrap().unwrap();
        assert_eq!((stored.available_slots, stored.version), (0, 1));
    }
}
