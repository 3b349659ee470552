//! Store PostgreSQL
//!
//! Implementación de los contratos con SQLx. La unicidad de token y de
//! matrícula activa la imponen índices únicos (ver `migrations/`). La
//! actualización de vehículos es un compare-and-swap sobre la columna `state`
//! y la de valets y zonas sobre la columna `version`, así que varias
//! instancias pueden compartir la base de datos: la que pierde la carrera
//! recibe `Conflict`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{MarkOutRepository, ValetRepository, VehicleRepository, ZoneRepository};
use crate::models::{
    MarkOutRequest, MarkOutSource, MarkOutStatus, ParkingZone, ShiftWindow, TaskType, Valet,
    ValetStatus, Vehicle, VehicleState,
};
use crate::utils::errors::{conflict_error, not_found_error, AppError, AppResult};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Aplica el esquema de `migrations/`
    pub async fn run_migrations(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(sqlx::Error::from)?;
        Ok(())
    }
}

/// Nombre de la restricción única violada, si el error es de unicidad
fn unique_violation(error: &sqlx::Error) -> Option<String> {
    let db_error = error.as_database_error()?;
    if db_error.code().as_deref() == Some(UNIQUE_VIOLATION) {
        Some(db_error.constraint().unwrap_or_default().to_string())
    } else {
        None
    }
}

#[async_trait]
impl VehicleRepository for PgStore {
    async fn insert(&self, vehicle: &Vehicle) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO vehicles (
                id, token, plate_number, phone_number, customer_type, entry_operator_id, state,
                zone_code, slot_label, parking_valet_id, retrieval_valet_id, arrived_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(vehicle.id)
        .bind(&vehicle.token)
        .bind(&vehicle.plate_number)
        .bind(&vehicle.phone_number)
        .bind(vehicle.customer_type)
        .bind(&vehicle.entry_operator_id)
        .bind(vehicle.state)
        .bind(&vehicle.zone_code)
        .bind(&vehicle.slot_label)
        .bind(vehicle.parking_valet_id)
        .bind(vehicle.retrieval_valet_id)
        .bind(vehicle.arrived_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match unique_violation(&e).as_deref() {
                Some("vehicles_token_key") => Err(AppError::TokenCollision(vehicle.token.clone())),
                Some("vehicles_active_plate_idx") => {
                    let token = VehicleRepository::find_active_by_plate(self, &vehicle.plate_number)
                        .await?
                        .map(|active| active.token)
                        .unwrap_or_default();
                    Err(AppError::DuplicateEntry {
                        plate: vehicle.plate_number.clone(),
                        token,
                    })
                }
                _ => Err(AppError::Database(e)),
            },
        }
    }

    async fn update(&self, vehicle: &Vehicle, expected: VehicleState) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE vehicles
            SET state = $3, zone_code = $4, slot_label = $5, parking_valet_id = $6,
                retrieval_valet_id = $7, parked_at = $8, markout_requested_at = $9,
                scheduled_at = $10, retrieval_started_at = $11, delivered_at = $12, closed_at = $13
            WHERE id = $1 AND state = $2
            "#,
        )
        .bind(vehicle.id)
        .bind(expected)
        .bind(vehicle.state)
        .bind(&vehicle.zone_code)
        .bind(&vehicle.slot_label)
        .bind(vehicle.parking_valet_id)
        .bind(vehicle.retrieval_valet_id)
        .bind(vehicle.parked_at)
        .bind(vehicle.markout_requested_at)
        .bind(vehicle.scheduled_at)
        .bind(vehicle.retrieval_started_at)
        .bind(vehicle.delivered_at)
        .bind(vehicle.closed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match VehicleRepository::find_by_id(self, vehicle.id).await? {
            Some(stored) => Err(AppError::Conflict(format!(
                "Vehicle {} is {} but {} was expected",
                vehicle.id, stored.state, expected
            ))),
            None => Err(not_found_error("Vehicle", &vehicle.id.to_string())),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(vehicle)
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(vehicle)
    }

    async fn find_active_by_plate(&self, plate_number: &str) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>(
            "SELECT * FROM vehicles WHERE plate_number = $1 AND state NOT IN ('DELIVERED', 'CLOSED')",
        )
        .bind(plate_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }

    async fn find_active_by_valet(&self, valet_id: Uuid) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>(
            r#"
            SELECT * FROM vehicles
            WHERE (state = 'PARKING' AND parking_valet_id = $1)
               OR (state IN ('RETRIEVAL_ASSIGNED', 'ON_THE_WAY') AND retrieval_valet_id = $1)
            LIMIT 1
            "#,
        )
        .bind(valet_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }

    async fn list_by_state(&self, state: VehicleState) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(
            "SELECT * FROM vehicles WHERE state = $1 ORDER BY arrived_at ASC",
        )
        .bind(state)
        .fetch_all(&self.pool)
        .await?;

        Ok(vehicles)
    }

    async fn list_arrived_on(&self, date: NaiveDate) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(
            "SELECT * FROM vehicles WHERE (arrived_at AT TIME ZONE 'UTC')::date = $1 ORDER BY arrived_at ASC",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(vehicles)
    }
}

#[derive(Debug, FromRow)]
struct ValetRow {
    id: Uuid,
    name: String,
    phone: String,
    status: ValetStatus,
    is_active: bool,
    assignment_sequence: i64,
    today_count: i32,
    total_count: i64,
    shift_start: Option<NaiveTime>,
    shift_end: Option<NaiveTime>,
    current_task: Option<TaskType>,
    version: i64,
}

impl From<ValetRow> for Valet {
    fn from(row: ValetRow) -> Self {
        let shift = match (row.shift_start, row.shift_end) {
            (Some(start), Some(end)) => Some(ShiftWindow::new(start, end)),
            _ => None,
        };
        Self {
            id: row.id,
            name: row.name,
            phone: row.phone,
            status: row.status,
            is_active: row.is_active,
            assignment_sequence: row.assignment_sequence.max(0) as u64,
            today_count: row.today_count.max(0) as u32,
            total_count: row.total_count.max(0) as u64,
            shift,
            current_task: row.current_task,
            version: row.version,
        }
    }
}

#[async_trait]
impl ValetRepository for PgStore {
    async fn insert(&self, valet: &Valet) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO valets (
                id, name, phone, status, is_active, assignment_sequence, today_count,
                total_count, shift_start, shift_end, current_task, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(valet.id)
        .bind(&valet.name)
        .bind(&valet.phone)
        .bind(valet.status)
        .bind(valet.is_active)
        .bind(valet.assignment_sequence as i64)
        .bind(valet.today_count as i32)
        .bind(valet.total_count as i64)
        .bind(valet.shift.map(|s| s.start))
        .bind(valet.shift.map(|s| s.end))
        .bind(valet.current_task)
        .bind(valet.version)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if unique_violation(&e).is_some() => Err(conflict_error("Valet", "phone", &valet.phone)),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    async fn save(&self, valet: &Valet, expected_version: i64) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE valets
            SET name = $2, phone = $3, status = $4, is_active = $5, assignment_sequence = $6,
                today_count = $7, total_count = $8, shift_start = $9, shift_end = $10,
                current_task = $11, version = $12
            WHERE id = $1 AND version = $13
            "#,
        )
        .bind(valet.id)
        .bind(&valet.name)
        .bind(&valet.phone)
        .bind(valet.status)
        .bind(valet.is_active)
        .bind(valet.assignment_sequence as i64)
        .bind(valet.today_count as i32)
        .bind(valet.total_count as i64)
        .bind(valet.shift.map(|s| s.start))
        .bind(valet.shift.map(|s| s.end))
        .bind(valet.current_task)
        .bind(valet.version)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match ValetRepository::find_by_id(self, valet.id).await? {
            Some(stored) => Err(AppError::Conflict(format!(
                "Valet {} is at version {} but {} was expected",
                valet.id, stored.version, expected_version
            ))),
            None => Err(not_found_error("Valet", &valet.id.to_string())),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Valet>> {
        let row = sqlx::query_as::<_, ValetRow>("SELECT * FROM valets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Valet::from))
    }

    async fn list_all(&self) -> AppResult<Vec<Valet>> {
        let rows = sqlx::query_as::<_, ValetRow>("SELECT * FROM valets ORDER BY name ASC, id ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Valet::from).collect())
    }
}

#[derive(Debug, FromRow)]
struct ZoneRow {
    id: Uuid,
    code: String,
    name: String,
    description: Option<String>,
    total_slots: i32,
    available_slots: i32,
    is_active: bool,
    priority: i32,
    occupied_slots: Vec<i32>,
    version: i64,
}

impl From<ZoneRow> for ParkingZone {
    fn from(row: ZoneRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            name: row.name,
            description: row.description,
            total_slots: row.total_slots.max(0) as u32,
            available_slots: row.available_slots.max(0) as u32,
            is_active: row.is_active,
            priority: row.priority,
            occupied_slots: row
                .occupied_slots
                .into_iter()
                .filter(|n| *n > 0)
                .map(|n| n as u32)
                .collect::<BTreeSet<u32>>(),
            version: row.version,
        }
    }
}

fn occupied_column(zone: &ParkingZone) -> Vec<i32> {
    zone.occupied_slots.iter().map(|n| *n as i32).collect()
}

#[async_trait]
impl ZoneRepository for PgStore {
    async fn insert(&self, zone: &ParkingZone) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO parking_zones (
                id, code, name, description, total_slots, available_slots, is_active, priority,
                occupied_slots, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(zone.id)
        .bind(&zone.code)
        .bind(&zone.name)
        .bind(&zone.description)
        .bind(zone.total_slots as i32)
        .bind(zone.available_slots as i32)
        .bind(zone.is_active)
        .bind(zone.priority)
        .bind(occupied_column(zone))
        .bind(zone.version)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if unique_violation(&e).is_some() => Err(conflict_error("Zone", "code", &zone.code)),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    async fn save(&self, zone: &ParkingZone, expected_version: i64) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE parking_zones
            SET name = $2, description = $3, total_slots = $4, available_slots = $5,
                is_active = $6, priority = $7, occupied_slots = $8, version = $9
            WHERE code = $1 AND version = $10
            "#,
        )
        .bind(&zone.code)
        .bind(&zone.name)
        .bind(&zone.description)
        .bind(zone.total_slots as i32)
        .bind(zone.available_slots as i32)
        .bind(zone.is_active)
        .bind(zone.priority)
        .bind(occupied_column(zone))
        .bind(zone.version)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match ZoneRepository::find_by_code(self, &zone.code).await? {
            Some(stored) => Err(AppError::Conflict(format!(
                "Zone {} is at version {} but {} was expected",
                zone.code, stored.version, expected_version
            ))),
            None => Err(not_found_error("Zone", &zone.code)),
        }
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<ParkingZone>> {
        let row = sqlx::query_as::<_, ZoneRow>("SELECT * FROM parking_zones WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ParkingZone::from))
    }

    async fn list_all(&self) -> AppResult<Vec<ParkingZone>> {
        let rows = sqlx::query_as::<_, ZoneRow>(
            "SELECT * FROM parking_zones ORDER BY priority ASC, code ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ParkingZone::from).collect())
    }
}

#[derive(Debug, FromRow)]
struct MarkOutRow {
    id: Uuid,
    vehicle_id: Uuid,
    selected_minutes: i32,
    retrieve_at: DateTime<Utc>,
    status: MarkOutStatus,
    source: MarkOutSource,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl From<MarkOutRow> for MarkOutRequest {
    fn from(row: MarkOutRow) -> Self {
        Self {
            id: row.id,
            vehicle_id: row.vehicle_id,
            selected_minutes: row.selected_minutes.max(0) as u32,
            retrieve_at: row.retrieve_at,
            status: row.status,
            source: row.source,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        }
    }
}

#[async_trait]
impl MarkOutRepository for PgStore {
    async fn insert(&self, request: &MarkOutRequest) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO markout_requests (
                id, vehicle_id, selected_minutes, retrieve_at, status, source, created_at, resolved_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(request.id)
        .bind(request.vehicle_id)
        .bind(request.selected_minutes as i32)
        .bind(request.retrieve_at)
        .bind(request.status)
        .bind(request.source)
        .bind(request.created_at)
        .bind(request.resolved_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if unique_violation(&e).is_some() => Err(AppError::Conflict(format!(
                "Vehicle {} already has a pending mark-out",
                request.vehicle_id
            ))),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    async fn save(&self, request: &MarkOutRequest) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE markout_requests SET status = $2, resolved_at = $3 WHERE id = $1",
        )
        .bind(request.id)
        .bind(request.status)
        .bind(request.resolved_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found_error("MarkOutRequest", &request.id.to_string()));
        }
        Ok(())
    }

    async fn find_pending_by_vehicle(&self, vehicle_id: Uuid) -> AppResult<Option<MarkOutRequest>> {
        let row = sqlx::query_as::<_, MarkOutRow>(
            "SELECT * FROM markout_requests WHERE vehicle_id = $1 AND status = 'PENDING'",
        )
        .bind(vehicle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MarkOutRequest::from))
    }

    async fn list_by_vehicle(&self, vehicle_id: Uuid) -> AppResult<Vec<MarkOutRequest>> {
        let rows = sqlx::query_as::<_, MarkOutRow>(
            "SELECT * FROM markout_requests WHERE vehicle_id = $1 ORDER BY created_at ASC",
        )
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MarkOutRequest::from).collect())
    }
}
