//! Contratos de persistencia
//!
//! El núcleo consume estos traits y nunca conoce el almacenamiento concreto.
//! El store es responsable de la durabilidad y de la unicidad de token y de
//! matrícula activa. Las escrituras de vehículos, valets y zonas son
//! compare-and-swap, de modo que dos procesos sobre la misma base de datos
//! nunca pisan la escritura del otro.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{MarkOutRequest, ParkingZone, Valet, Vehicle, VehicleState};
use crate::utils::errors::AppResult;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait VehicleRepository: Send + Sync {
    /// Falla con `TokenCollision` si el token existe y con `DuplicateEntry`
    /// si ya hay un registro activo para la matrícula
    async fn insert(&self, vehicle: &Vehicle) -> AppResult<()>;

    /// Compare-and-swap: solo escribe si el estado guardado es `expected`
    async fn update(&self, vehicle: &Vehicle, expected: VehicleState) -> AppResult<()>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>>;

    async fn find_by_token(&self, token: &str) -> AppResult<Option<Vehicle>>;

    async fn find_active_by_plate(&self, plate_number: &str) -> AppResult<Option<Vehicle>>;

    /// Vehículo cuya tarea activa la tiene este valet
    async fn find_active_by_valet(&self, valet_id: Uuid) -> AppResult<Option<Vehicle>>;

    async fn list_by_state(&self, state: VehicleState) -> AppResult<Vec<Vehicle>>;

    async fn list_arrived_on(&self, date: NaiveDate) -> AppResult<Vec<Vehicle>>;
}

#[async_trait]
pub trait ValetRepository: Send + Sync {
    async fn insert(&self, valet: &Valet) -> AppResult<()>;

    /// Compare-and-swap: solo escribe si la versión guardada es
    /// `expected_version`; si no, `Conflict`
    async fn save(&self, valet: &Valet, expected_version: i64) -> AppResult<()>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Valet>>;

    async fn list_all(&self) -> AppResult<Vec<Valet>>;
}

#[async_trait]
pub trait ZoneRepository: Send + Sync {
    /// Falla con `Conflict` si el código de zona ya existe
    async fn insert(&self, zone: &ParkingZone) -> AppResult<()>;

    /// Compare-and-swap sobre `version`, igual que en los valets
    async fn save(&self, zone: &ParkingZone, expected_version: i64) -> AppResult<()>;

    async fn find_by_code(&self, code: &str) -> AppResult<Option<ParkingZone>>;

    async fn list_all(&self) -> AppResult<Vec<ParkingZone>>;
}

#[async_trait]
pub trait MarkOutRepository: Send + Sync {
    async fn insert(&self, request: &MarkOutRequest) -> AppResult<()>;

    async fn save(&self, request: &MarkOutRequest) -> AppResult<()>;

    async fn find_pending_by_vehicle(&self, vehicle_id: Uuid) -> AppResult<Option<MarkOutRequest>>;

    async fn list_by_vehicle(&self, vehicle_id: Uuid) -> AppResult<Vec<MarkOutRequest>>;
}

/// Conjunto de stores inyectados en los servicios
#[derive(Clone)]
pub struct Stores {
    pub vehicles: Arc<dyn VehicleRepository>,
    pub valets: Arc<dyn ValetRepository>,
    pub zones: Arc<dyn ZoneRepository>,
    pub markouts: Arc<dyn MarkOutRepository>,
}

impl Stores {
    /// Un único store que implementa los cuatro contratos
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: VehicleRepository + ValetRepository + ZoneRepository + MarkOutRepository + 'static,
    {
        Self {
            vehicles: store.clone(),
            valets: store.clone(),
            zones: store.clone(),
            markouts: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryStore::new()))
    }
}
