//! Ciclo de vida del vehículo
//!
//! Máquina de estados PARKING → ... → CLOSED. Cada operación valida el estado,
//! ejecuta la llamada al asignador de zonas o al dispatcher de valets y escribe
//! el nuevo snapshot con compare-and-swap. Si un paso posterior falla, los
//! recursos ya tomados se compensan. Las notificaciones y la auditoría se
//! devuelven como intenciones en el `TransitionOutcome`.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::EnvironmentConfig;
use crate::models::{
    AuditRecord, CustomerType, MarkOutSource, NewEntry, NotificationIntent, NotificationKind,
    TaskType, TransitionOutcome, Valet, ValetStatus, Vehicle, VehicleState,
};
use crate::repositories::{Stores, VehicleRepository};
use crate::services::markout_scheduler::MarkOutScheduler;
use crate::services::valet_dispatcher::ValetDispatcher;
use crate::services::zone_allocator::{SlotReservation, ZoneAllocator};
use crate::utils::clock::Clock;
use crate::utils::errors::{not_found_error, AppError, AppResult};
use crate::utils::keyed_lock::KeyedLocks;
use crate::utils::token::{generate_token, is_valid_token};
use crate::utils::validation::{normalize_phone, normalize_plate};

/// Intentos de inserción con token nuevo antes de devolver `TokenCollision`
pub const MAX_TOKEN_ATTEMPTS: usize = 3;

const SYSTEM_ACTOR: &str = "system";

/// Datos de llegada tal como los captura el operador
#[derive(Debug, Clone)]
pub struct EntryRequest {
    pub plate_number: String,
    pub phone_number: String,
    pub customer_type: CustomerType,
    pub entry_operator_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchFailure {
    pub vehicle_id: Uuid,
    pub token: String,
    pub error: String,
}

/// Resultado de un tick del scheduler
#[derive(Debug, Default, Serialize)]
pub struct DispatchReport {
    pub dispatched: Vec<TransitionOutcome>,
    pub failures: Vec<DispatchFailure>,
}

fn valet_actor(valet_id: Uuid) -> String {
    format!("valet:{}", valet_id)
}

pub struct VehicleLifecycle {
    vehicles: Arc<dyn VehicleRepository>,
    zones: Arc<ZoneAllocator>,
    valets: Arc<ValetDispatcher>,
    scheduler: Arc<MarkOutScheduler>,
    clock: Arc<dyn Clock>,
    /// Serializa entradas de la misma matrícula normalizada
    entry_locks: KeyedLocks<String>,
    vehicle_locks: KeyedLocks<Uuid>,
}

/// Qué pasa con el valet sustituido en una tarea activa
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handover {
    /// Vuelve a FREE con sus contadores deshechos
    Release,
    /// Queda OFF_DUTY
    Withdraw,
}

impl VehicleLifecycle {
    pub fn new(
        vehicles: Arc<dyn VehicleRepository>,
        zones: Arc<ZoneAllocator>,
        valets: Arc<ValetDispatcher>,
        scheduler: Arc<MarkOutScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            vehicles,
            zones,
            valets,
            scheduler,
            clock,
            entry_locks: KeyedLocks::new(),
            vehicle_locks: KeyedLocks::new(),
        }
    }

    /// Construye asignadores y scheduler a partir de la configuración
    pub fn from_config(stores: &Stores, config: &EnvironmentConfig, clock: Arc<dyn Clock>) -> AppResult<Self> {
        let offset = config.operating_offset()?;
        let zones = Arc::new(ZoneAllocator::new(stores.zones.clone()));
        let valets = Arc::new(ValetDispatcher::new(stores.valets.clone(), clock.clone(), offset));
        let scheduler = Arc::new(MarkOutScheduler::new(
            stores.markouts.clone(),
            config.markout_lead_minutes.clone(),
            config.default_markout_minutes,
            config.overdue_threshold_minutes,
        ));

        Ok(Self::new(stores.vehicles.clone(), zones, valets, scheduler, clock))
    }

    pub fn zones(&self) -> &ZoneAllocator {
        &self.zones
    }

    pub fn valets(&self) -> &ValetDispatcher {
        &self.valets
    }

    pub fn scheduler(&self) -> &MarkOutScheduler {
        &self.scheduler
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ------------------------------------------------------------------
    // Entrada
    // ------------------------------------------------------------------

    pub async fn create_entry(&self, request: EntryRequest) -> AppResult<TransitionOutcome> {
        let plate_number = normalize_plate(&request.plate_number)?;
        let phone_number = normalize_phone(&request.phone_number)?;
        let entry_operator_id = request.entry_operator_id.trim().to_string();
        if entry_operator_id.is_empty() {
            return Err(AppError::BadRequest("Entry operator id cannot be empty".to_string()));
        }

        let _entry_guard = self.entry_locks.lock(plate_number.clone()).await;

        if let Some(active) = self.vehicles.find_active_by_plate(&plate_number).await? {
            warn!("🚫 Entrada duplicada para {} (token activo {})", plate_number, active.token);
            return Err(AppError::DuplicateEntry {
                plate: plate_number,
                token: active.token,
            });
        }

        let reservation = self.zones.reserve_slot().await?;

        let valet = match self.valets.assign(TaskType::Parking).await {
            Ok(valet) => valet,
            Err(e) => {
                self.release_reservation(&reservation).await;
                return Err(e);
            }
        };

        let now = self.clock.now();
        let entry = NewEntry {
            token: String::new(),
            plate_number,
            phone_number,
            customer_type: request.customer_type,
            entry_operator_id,
            zone_code: reservation.zone_code.clone(),
            slot_label: reservation.slot_label.clone(),
            parking_valet_id: valet.id,
        };

        let vehicle = match self.insert_with_fresh_token(entry, now).await {
            Ok(vehicle) => vehicle,
            Err(e) => {
                self.release_reservation(&reservation).await;
                self.revert_valet(valet.id).await;
                return Err(e);
            }
        };

        info!(
            "🚗 Entrada {} ({}) en {}-{}, valet {}",
            vehicle.token, vehicle.plate_number, reservation.zone_code, reservation.slot_label, valet.name
        );

        let notification = NotificationIntent::for_vehicle(&vehicle, NotificationKind::EntryConfirmation)
            .with("valet_name", valet.name.clone());
        let audit = AuditRecord::transition(&vehicle, None, &vehicle.entry_operator_id, now)
            .with("zone", reservation.zone_code)
            .with("slot", reservation.slot_label)
            .with("valet_id", valet.id.to_string());

        Ok(TransitionOutcome::new(vehicle).notify(notification).audit(audit))
    }

    async fn insert_with_fresh_token(&self, entry: NewEntry, now: DateTime<Utc>) -> AppResult<Vehicle> {
        let mut attempt = 1;
        loop {
            let vehicle = Vehicle::new_entry(
                NewEntry {
                    token: generate_token(now),
                    ..entry.clone()
                },
                now,
            );

            match self.vehicles.insert(&vehicle).await {
                Ok(()) => return Ok(vehicle),
                Err(e) if e.is_retryable() && attempt < MAX_TOKEN_ATTEMPTS => {
                    warn!("🔁 Colisión de token {} (intento {}), reintentando", vehicle.token, attempt);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ------------------------------------------------------------------
    // Transiciones
    // ------------------------------------------------------------------

    pub async fn mark_parked(&self, vehicle_id: Uuid) -> AppResult<TransitionOutcome> {
        let _guard = self.vehicle_locks.lock(vehicle_id).await;

        let vehicle = self.load(vehicle_id).await?;
        vehicle.ensure_state(&[VehicleState::Parking], VehicleState::Parked)?;
        let valet_id = vehicle.parking_valet_id.ok_or_else(|| {
            AppError::InvalidState(format!("Vehicle {} has no parking valet", vehicle.token))
        })?;

        let now = self.clock.now();
        let parked = vehicle.transition(VehicleState::Parked, now)?;
        self.vehicles.update(&parked, vehicle.state).await?;

        if let Err(e) = self.valets.complete(valet_id).await {
            self.rollback(&parked, &vehicle).await;
            return Err(e);
        }

        info!("🅿️ Vehículo {} aparcado", parked.token);
        let audit = AuditRecord::transition(&parked, Some(vehicle.state), &valet_actor(valet_id), now);
        Ok(TransitionOutcome::new(parked).audit(audit))
    }

    pub async fn send_markout_options(&self, vehicle_id: Uuid) -> AppResult<TransitionOutcome> {
        let _guard = self.vehicle_locks.lock(vehicle_id).await;

        let vehicle = self.load(vehicle_id).await?;
        let now = self.clock.now();
        let waiting = vehicle.transition(VehicleState::WaitingMarkout, now)?;
        self.vehicles.update(&waiting, vehicle.state).await?;

        info!("📨 Opciones de mark-out enviadas para {}", waiting.token);
        let notification = NotificationIntent::for_vehicle(&waiting, NotificationKind::MarkOutOptions)
            .with("options", self.scheduler.allowed_minutes().to_vec())
            .with("default_minutes", self.scheduler.default_minutes());
        let audit = AuditRecord::transition(&waiting, Some(vehicle.state), SYSTEM_ACTOR, now);
        Ok(TransitionOutcome::new(waiting).notify(notification).audit(audit))
    }

    /// `selected_minutes = None` o fuente DEFAULT usan el tiempo por defecto
    pub async fn request_markout(
        &self,
        vehicle_id: Uuid,
        selected_minutes: Option<u32>,
        source: MarkOutSource,
    ) -> AppResult<TransitionOutcome> {
        let _guard = self.vehicle_locks.lock(vehicle_id).await;

        let vehicle = self.load(vehicle_id).await?;
        vehicle.ensure_state(
            &[VehicleState::Parked, VehicleState::WaitingMarkout],
            VehicleState::Scheduled,
        )?;
        let minutes = self.scheduler.resolve_minutes(selected_minutes, source)?;

        let now = self.clock.now();
        let retrieve_at = self.scheduler.retrieve_at(now, minutes)?;
        let scheduled = vehicle.schedule(now, retrieve_at)?;
        self.vehicles.update(&scheduled, vehicle.state).await?;

        let request = match self.scheduler.open_request(vehicle_id, minutes, source, now).await {
            Ok(request) => request,
            Err(e) => {
                self.rollback(&scheduled, &vehicle).await;
                return Err(e);
            }
        };

        info!(
            "⏱️ Vehículo {} programado para {} ({} min)",
            scheduled.token,
            retrieve_at.to_rfc3339(),
            minutes
        );
        let audit = AuditRecord::transition(&scheduled, Some(vehicle.state), SYSTEM_ACTOR, now)
            .with("selected_minutes", minutes)
            .with("source", source.as_str())
            .with("markout_request_id", request.id.to_string());
        Ok(TransitionOutcome::new(scheduled).audit(audit))
    }

    /// Desde SCHEDULED asigna un valet de recogida; desde RETRIEVAL_ASSIGNED lo sustituye
    pub async fn assign_retrieval_valet(&self, vehicle_id: Uuid) -> AppResult<TransitionOutcome> {
        let _guard = self.vehicle_locks.lock(vehicle_id).await;

        let vehicle = self.load(vehicle_id).await?;
        vehicle.ensure_state(
            &[VehicleState::Scheduled, VehicleState::RetrievalAssigned],
            VehicleState::RetrievalAssigned,
        )?;
        let now = self.clock.now();

        if vehicle.state == VehicleState::RetrievalAssigned {
            return self.replace_active_valet(vehicle, Handover::Release, now).await;
        }

        let (assigned, valet) = self.attach_retrieval_valet(&vehicle, now).await?;
        if let Err(e) = self.vehicles.update(&assigned, vehicle.state).await {
            self.revert_valet(valet.id).await;
            return Err(e);
        }

        info!("🧑‍✈️ Valet {} asignado a la recogida de {}", valet.name, assigned.token);
        let audit = AuditRecord::transition(&assigned, Some(vehicle.state), SYSTEM_ACTOR, now)
            .with("valet_id", valet.id.to_string());
        Ok(TransitionOutcome::new(assigned).audit(audit))
    }

    pub async fn start_retrieval(&self, vehicle_id: Uuid) -> AppResult<TransitionOutcome> {
        let _guard = self.vehicle_locks.lock(vehicle_id).await;

        let vehicle = self.load(vehicle_id).await?;
        vehicle.ensure_state(
            &[VehicleState::Scheduled, VehicleState::RetrievalAssigned],
            VehicleState::OnTheWay,
        )?;

        let now = self.clock.now();
        let scheduled_at = vehicle.scheduled_at.ok_or_else(|| {
            AppError::InvalidState(format!("Vehicle {} has no retrieval time", vehicle.token))
        })?;
        if now < scheduled_at {
            return Err(AppError::RetrievalTooEarly { scheduled_at, now });
        }

        let mut outcome_audits = Vec::new();
        let (assigned, new_valet) = if vehicle.state == VehicleState::Scheduled {
            let (assigned, valet) = self.attach_retrieval_valet(&vehicle, now).await?;
            outcome_audits.push(
                AuditRecord::transition(&assigned, Some(vehicle.state), SYSTEM_ACTOR, now)
                    .with("valet_id", valet.id.to_string()),
            );
            (assigned, Some(valet))
        } else {
            (vehicle.clone(), None)
        };

        let on_the_way = match assigned.transition(VehicleState::OnTheWay, now) {
            Ok(next) => next,
            Err(e) => {
                if let Some(valet) = &new_valet {
                    self.revert_valet(valet.id).await;
                }
                return Err(e);
            }
        };
        if let Err(e) = self.vehicles.update(&on_the_way, vehicle.state).await {
            if let Some(valet) = &new_valet {
                self.revert_valet(valet.id).await;
            }
            return Err(e);
        }

        let valet_id = on_the_way.retrieval_valet_id;
        info!("🚙 Recogida de {} en camino", on_the_way.token);

        let mut notification = NotificationIntent::for_vehicle(&on_the_way, NotificationKind::RetrievalStarted);
        if let Some(valet) = &new_valet {
            notification = notification.with("valet_name", valet.name.clone());
        }
        let actor = valet_id.map_or_else(|| SYSTEM_ACTOR.to_string(), valet_actor);
        outcome_audits.push(AuditRecord::transition(&on_the_way, Some(assigned.state), &actor, now));

        let outcome = outcome_audits
            .into_iter()
            .fold(TransitionOutcome::new(on_the_way).notify(notification), TransitionOutcome::audit);
        Ok(outcome)
    }

    pub async fn mark_delivered(&self, vehicle_id: Uuid) -> AppResult<TransitionOutcome> {
        let _guard = self.vehicle_locks.lock(vehicle_id).await;

        let vehicle = self.load(vehicle_id).await?;
        vehicle.ensure_state(&[VehicleState::OnTheWay], VehicleState::Delivered)?;
        let valet_id = vehicle.retrieval_valet_id.ok_or_else(|| {
            AppError::InvalidState(format!("Vehicle {} has no retrieval valet", vehicle.token))
        })?;

        let now = self.clock.now();
        let delivered = vehicle.transition(VehicleState::Delivered, now)?;
        self.vehicles.update(&delivered, vehicle.state).await?;

        let released_slot = match (&delivered.zone_code, &delivered.slot_label) {
            (Some(zone_code), Some(slot_label)) => {
                if let Err(e) = self.zones.release_slot(zone_code, slot_label).await {
                    error!("❌ Slot {}-{} de {} no liberado: {}", zone_code, slot_label, delivered.token, e);
                    self.rollback(&delivered, &vehicle).await;
                    return Err(e);
                }
                Some((zone_code.as_str(), slot_label.as_str()))
            }
            _ => None,
        };

        if let Err(e) = self.valets.complete(valet_id).await {
            self.rollback(&delivered, &vehicle).await;
            if let Some((zone_code, slot_label)) = released_slot {
                self.restore_reservation(zone_code, slot_label).await;
            }
            return Err(e);
        }

        let mut audit = AuditRecord::transition(&delivered, Some(vehicle.state), &valet_actor(valet_id), now);

        match self.scheduler.complete_pending(vehicle_id, now).await {
            Ok(Some(request)) => audit = audit.with("markout_request_id", request.id.to_string()),
            Ok(None) => {}
            Err(e) => warn!("⚠️ Mark-out de {} no completado: {}", delivered.token, e),
        }

        let mut notification = NotificationIntent::for_vehicle(&delivered, NotificationKind::DeliveryConfirmation);
        if let Some(total) = delivered.total_duration() {
            notification = notification.with("total_minutes", total.num_minutes());
        }

        info!("✅ Vehículo {} entregado", delivered.token);
        Ok(TransitionOutcome::new(delivered).notify(notification).audit(audit))
    }

    pub async fn close(&self, vehicle_id: Uuid) -> AppResult<TransitionOutcome> {
        let _guard = self.vehicle_locks.lock(vehicle_id).await;

        let vehicle = self.load(vehicle_id).await?;
        let now = self.clock.now();
        let closed = vehicle.transition(VehicleState::Closed, now)?;
        self.vehicles.update(&closed, vehicle.state).await?;

        info!("📁 Registro {} cerrado", closed.token);
        let audit = AuditRecord::transition(&closed, Some(vehicle.state), SYSTEM_ACTOR, now);
        Ok(TransitionOutcome::new(closed).audit(audit))
    }

    /// Sustituye al valet que tiene la tarea activa del vehículo
    pub async fn reassign_valet(&self, vehicle_id: Uuid) -> AppResult<TransitionOutcome> {
        let _guard = self.vehicle_locks.lock(vehicle_id).await;

        let vehicle = self.load(vehicle_id).await?;
        let now = self.clock.now();
        self.replace_active_valet(vehicle, Handover::Withdraw, now).await
    }

    /// Cambio de estado de un valet desde operaciones. Un valet BUSY que pasa a
    /// BREAK u OFF_DUTY entrega antes su tarea a otro valet.
    pub async fn change_valet_status(&self, valet_id: Uuid, status: ValetStatus) -> AppResult<Valet> {
        let valet = self.valets.find(valet_id).await?;
        if valet.status != ValetStatus::Busy {
            return self.valets.set_status(valet_id, status).await;
        }
        if status == ValetStatus::Free {
            return Err(AppError::InvalidState(format!(
                "Valet {} is busy; mark the task finished instead",
                valet.name
            )));
        }

        if let Some(vehicle) = self.vehicles.find_active_by_valet(valet_id).await? {
            self.reassign_valet(vehicle.id).await?;
        }

        let valet = self.valets.find(valet_id).await?;
        if valet.status == status {
            Ok(valet)
        } else {
            self.valets.set_status(valet_id, status).await
        }
    }

    // ------------------------------------------------------------------
    // Scheduler
    // ------------------------------------------------------------------

    /// Asigna valet de recogida a cada vehículo SCHEDULED cuya hora ya llegó.
    /// Los fallos se acumulan por vehículo y nunca abortan el tick.
    pub async fn dispatch_due_retrievals(&self) -> AppResult<DispatchReport> {
        let now = self.clock.now();
        let due: Vec<Vehicle> = self
            .vehicles
            .list_by_state(VehicleState::Scheduled)
            .await?
            .into_iter()
            .filter(|vehicle| vehicle.scheduled_at.is_some_and(|at| at <= now))
            .collect();

        let mut report = DispatchReport::default();
        for vehicle in due {
            match self.assign_retrieval_valet(vehicle.id).await {
                Ok(outcome) => report.dispatched.push(outcome),
                Err(e) => {
                    warn!("⚠️ Recogida de {} no despachada: {}", vehicle.token, e);
                    report.failures.push(DispatchFailure {
                        vehicle_id: vehicle.id,
                        token: vehicle.token,
                        error: e.to_string(),
                    });
                }
            }
        }

        if !report.dispatched.is_empty() || !report.failures.is_empty() {
            info!(
                "⏰ Tick: {} recogidas despachadas, {} fallidas",
                report.dispatched.len(),
                report.failures.len()
            );
        }
        Ok(report)
    }

    pub async fn overdue_retrievals(&self) -> AppResult<Vec<Vehicle>> {
        let now = self.clock.now();
        let threshold = self.scheduler.overdue_threshold_minutes();
        Ok(self
            .vehicles
            .list_by_state(VehicleState::Scheduled)
            .await?
            .into_iter()
            .filter(|vehicle| vehicle.is_overdue_for_retrieval(now, threshold))
            .collect())
    }

    // ------------------------------------------------------------------
    // Consultas
    // ------------------------------------------------------------------

    pub async fn find_by_id(&self, vehicle_id: Uuid) -> AppResult<Vehicle> {
        self.load(vehicle_id).await
    }

    pub async fn find_by_token(&self, token: &str) -> AppResult<Vehicle> {
        let token = token.trim();
        if !is_valid_token(token) {
            return Err(AppError::BadRequest(format!("Malformed token: {}", token)));
        }
        self.vehicles
            .find_by_token(token)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", token))
    }

    pub async fn list_by_state(&self, state: VehicleState) -> AppResult<Vec<Vehicle>> {
        self.vehicles.list_by_state(state).await
    }

    pub async fn list_arrived_on(&self, date: NaiveDate) -> AppResult<Vec<Vehicle>> {
        self.vehicles.list_arrived_on(date).await
    }

    // ------------------------------------------------------------------
    // Internos
    // ------------------------------------------------------------------

    async fn load(&self, vehicle_id: Uuid) -> AppResult<Vehicle> {
        self.vehicles
            .find_by_id(vehicle_id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", &vehicle_id.to_string()))
    }

    async fn attach_retrieval_valet(&self, vehicle: &Vehicle, now: DateTime<Utc>) -> AppResult<(Vehicle, Valet)> {
        let valet = self.valets.assign(TaskType::Retrieval).await?;
        match vehicle.with_retrieval_valet(valet.id, now) {
            Ok(assigned) => Ok((assigned, valet)),
            Err(e) => {
                self.revert_valet(valet.id).await;
                Err(e)
            }
        }
    }

    async fn replace_active_valet(
        &self,
        vehicle: Vehicle,
        handover: Handover,
        now: DateTime<Utc>,
    ) -> AppResult<TransitionOutcome> {
        let Some(previous_valet) = vehicle.active_valet() else {
            return Err(AppError::InvalidState(format!(
                "Vehicle {} in {} has no valet task to reassign",
                vehicle.token, vehicle.state
            )));
        };
        let task_type = if vehicle.state == VehicleState::Parking {
            TaskType::Parking
        } else {
            TaskType::Retrieval
        };

        let valet = match handover {
            Handover::Release => self.valets.replace(previous_valet, task_type).await?,
            Handover::Withdraw => self.valets.reassign(previous_valet, task_type).await?,
        };
        let mut updated = vehicle.clone();
        match task_type {
            TaskType::Parking => updated.parking_valet_id = Some(valet.id),
            TaskType::Retrieval => updated.retrieval_valet_id = Some(valet.id),
        }
        if let Err(e) = self.vehicles.update(&updated, vehicle.state).await {
            error!(
                "❌ Valet {} reasignado pero el vehículo {} no se actualizó: {}",
                valet.name, vehicle.token, e
            );
            return Err(e);
        }

        info!("🔁 Vehículo {}: valet {} sustituye a {}", updated.token, valet.name, previous_valet);
        let audit = AuditRecord::transition(&updated, Some(vehicle.state), SYSTEM_ACTOR, now)
            .with("previous_valet_id", previous_valet.to_string())
            .with("valet_id", valet.id.to_string());
        Ok(TransitionOutcome::new(updated).audit(audit))
    }

    /// Restaura el snapshot anterior tras un fallo posterior a la escritura
    async fn rollback(&self, written: &Vehicle, previous: &Vehicle) {
        if let Err(e) = self.vehicles.update(previous, written.state).await {
            error!("❌ No se pudo revertir el vehículo {}: {}", previous.token, e);
        }
    }

    async fn release_reservation(&self, reservation: &SlotReservation) {
        if let Err(e) = self
            .zones
            .release_slot(&reservation.zone_code, &reservation.slot_label)
            .await
        {
            error!(
                "❌ Compensación fallida: slot {}-{} no liberado: {}",
                reservation.zone_code, reservation.slot_label, e
            );
        }
    }

    async fn restore_reservation(&self, zone_code: &str, slot_label: &str) {
        if let Err(e) = self.zones.restore_slot(zone_code, slot_label).await {
            error!("❌ Compensación fallida: slot {}-{} no restaurado: {}", zone_code, slot_label, e);
        }
    }

    async fn revert_valet(&self, valet_id: Uuid) {
        if let Err(e) = self.valets.revert(valet_id).await {
            error!("❌ Compensación fallida: valet {} no revertido: {}", valet_id, e);
        }
    }
}
