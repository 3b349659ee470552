//! Dispatcher round-robin de valets
//!
//! Elige, entre los valets FREE, activos y en turno, el de menor
//! `assignment_sequence` (empate por `today_count` y luego por id), y lo
//! reserva para una tarea. Todas las operaciones que leen y escriben el
//! estado de los valets se ejecutan dentro de una sección crítica por pool.

use std::sync::Arc;

use chrono::{FixedOffset, NaiveTime};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{ShiftWindow, TaskType, Valet, ValetAvailabilityReport, ValetStatus};
use crate::repositories::ValetRepository;
use crate::utils::clock::Clock;
use crate::utils::errors::{not_found_error, AppError, AppResult};
use crate::utils::validation::normalize_phone;

/// Siguiente valet según la política round-robin, sin modificar nada
pub fn select_next(valets: &[Valet], local_time: NaiveTime) -> Option<&Valet> {
    valets
        .iter()
        .filter(|valet| valet.is_eligible(local_time))
        .min_by(|a, b| {
            a.assignment_sequence
                .cmp(&b.assignment_sequence)
                .then(a.today_count.cmp(&b.today_count))
                .then(a.id.cmp(&b.id))
        })
}

/// Reserva el valet para la tarea y avanza sus contadores
fn reserve(valet: &Valet, task_type: TaskType) -> Valet {
    Valet {
        status: ValetStatus::Busy,
        current_task: Some(task_type),
        assignment_sequence: valet.assignment_sequence + 1,
        today_count: valet.today_count + 1,
        total_count: valet.total_count + 1,
        ..valet.clone()
    }
}

/// Deshace los contadores de una asignación (nunca por debajo de 0)
fn rewind(valet: &Valet) -> Valet {
    Valet {
        assignment_sequence: valet.assignment_sequence.saturating_sub(1),
        today_count: valet.today_count.saturating_sub(1),
        ..valet.clone()
    }
}

pub struct ValetDispatcher {
    valets: Arc<dyn ValetRepository>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    lock: Mutex<()>,
}

impl ValetDispatcher {
    pub fn new(valets: Arc<dyn ValetRepository>, clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self {
            valets,
            clock,
            offset,
            lock: Mutex::new(()),
        }
    }

    /// Hora local del parking, usada para evaluar los turnos
    pub fn local_time(&self) -> NaiveTime {
        self.clock.now().with_timezone(&self.offset).time()
    }

    pub async fn onboard(&self, name: &str, phone: &str, shift: Option<ShiftWindow>) -> AppResult<Valet> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Valet name cannot be empty".to_string()));
        }
        let phone = normalize_phone(phone)?;

        let valet = Valet::new(name.to_string(), phone, shift);
        self.valets.insert(&valet).await?;

        info!("🧑‍✈️ Valet {} ({}) dado de alta", valet.name, valet.id);
        Ok(valet)
    }

    pub async fn assign(&self, task_type: TaskType) -> AppResult<Valet> {
        let _guard = self.lock.lock().await;

        let valets = self.valets.list_all().await?;
        let local_time = self.local_time();

        let Some(chosen) = select_next(&valets, local_time) else {
            let report = ValetAvailabilityReport::from_valets(&valets, local_time);
            warn!("🚫 Ningún valet disponible para {}: {}", task_type, report);
            return Err(AppError::NoAvailableValet(report));
        };

        let assigned = self.persist(reserve(chosen, task_type)).await?;

        info!(
            "🧑‍✈️ Valet {} asignado a {} (secuencia {}, hoy {})",
            assigned.name, task_type, assigned.assignment_sequence, assigned.today_count
        );
        Ok(assigned)
    }

    pub async fn complete(&self, valet_id: Uuid) -> AppResult<Valet> {
        let _guard = self.lock.lock().await;

        let valet = self.find(valet_id).await?;
        if valet.status != ValetStatus::Busy {
            return Err(AppError::InvalidState(format!(
                "Valet {} is {} and has no task to complete",
                valet.id, valet.status
            )));
        }

        let freed = self
            .persist(Valet {
                status: ValetStatus::Free,
                current_task: None,
                ..valet
            })
            .await?;

        info!("✅ Valet {} libre", freed.name);
        Ok(freed)
    }

    /// Pone a cero la secuencia y el contador diario de todos los valets
    pub async fn reset_daily_counters(&self) -> AppResult<usize> {
        let _guard = self.lock.lock().await;

        let valets = self.valets.list_all().await?;
        let mut reset = 0;
        for valet in valets {
            if valet.assignment_sequence == 0 && valet.today_count == 0 {
                continue;
            }
            self.persist(Valet {
                assignment_sequence: 0,
                today_count: 0,
                ..valet
            })
            .await?;
            reset += 1;
        }

        info!("🔄 Contadores diarios reiniciados ({} valets)", reset);
        Ok(reset)
    }

    /// Mueve la tarea del valet abandonado a otro. El abandonado pierde la
    /// asignación en sus contadores y queda OFF_DUTY si estaba BUSY. Si no hay
    /// sustituto no se modifica nada.
    pub async fn reassign(&self, valet_id: Uuid, task_type: TaskType) -> AppResult<Valet> {
        self.hand_over(valet_id, task_type, ValetStatus::OffDuty).await
    }

    /// Como `reassign`, pero el valet sustituido vuelve a FREE: no ha dejado de
    /// estar disponible, solo se le retira esta tarea
    pub async fn replace(&self, valet_id: Uuid, task_type: TaskType) -> AppResult<Valet> {
        self.hand_over(valet_id, task_type, ValetStatus::Free).await
    }

    async fn hand_over(&self, valet_id: Uuid, task_type: TaskType, released_as: ValetStatus) -> AppResult<Valet> {
        let _guard = self.lock.lock().await;

        let valets = self.valets.list_all().await?;
        let original = valets
            .iter()
            .find(|valet| valet.id == valet_id)
            .cloned()
            .ok_or_else(|| not_found_error("Valet", &valet_id.to_string()))?;

        let mut abandoned = rewind(&original);
        if abandoned.status == ValetStatus::Busy {
            abandoned.status = released_as;
            abandoned.current_task = None;
        }

        let local_time = self.local_time();
        let candidates: Vec<Valet> = valets.into_iter().filter(|valet| valet.id != valet_id).collect();
        let Some(chosen) = select_next(&candidates, local_time) else {
            let report = ValetAvailabilityReport::from_valets(&candidates, local_time);
            warn!("🚫 Sin sustituto para el valet {}: {}", valet_id, report);
            return Err(AppError::NoAvailableValet(report));
        };

        let abandoned = self.persist(abandoned).await?;
        let assigned = match self.persist(reserve(chosen, task_type)).await {
            Ok(assigned) => assigned,
            Err(e) => {
                let restore = Valet {
                    version: abandoned.version,
                    ..original
                };
                if let Err(restore_error) = self.persist(restore).await {
                    error!("❌ Valet {} no restaurado: {}", valet_id, restore_error);
                }
                return Err(e);
            }
        };

        info!(
            "🔁 Tarea {} de {} pasa a {} ({} queda {})",
            task_type, abandoned.name, assigned.name, abandoned.name, abandoned.status
        );
        Ok(assigned)
    }

    /// Deshace una asignación cuando un paso posterior de la misma transición falla
    pub async fn revert(&self, valet_id: Uuid) -> AppResult<Valet> {
        let _guard = self.lock.lock().await;

        let valet = self.find(valet_id).await?;
        if valet.status != ValetStatus::Busy {
            return Err(AppError::InvalidState(format!(
                "Valet {} is {} and has no assignment to revert",
                valet.id, valet.status
            )));
        }

        let reverted = self
            .persist(Valet {
                status: ValetStatus::Free,
                current_task: None,
                total_count: valet.total_count.saturating_sub(1),
                ..rewind(&valet)
            })
            .await?;

        warn!("↩️ Asignación del valet {} revertida", reverted.name);
        Ok(reverted)
    }

    /// FREE / BREAK / OFF_DUTY. BUSY solo se alcanza con `assign` y un valet
    /// BUSY solo sale con `complete` o `reassign`.
    pub async fn set_status(&self, valet_id: Uuid, status: ValetStatus) -> AppResult<Valet> {
        if status == ValetStatus::Busy {
            return Err(AppError::BadRequest(
                "BUSY is only set by a task assignment".to_string(),
            ));
        }

        let _guard = self.lock.lock().await;

        let valet = self.find(valet_id).await?;
        if valet.status == ValetStatus::Busy {
            return Err(AppError::InvalidState(format!(
                "Valet {} holds a {} task; complete or reassign it first",
                valet.id,
                valet.current_task.map_or("pending", |task| task.as_str())
            )));
        }

        let updated = self.persist(Valet { status, ..valet }).await?;

        info!("🧑‍✈️ Valet {} ahora {}", updated.name, updated.status);
        Ok(updated)
    }

    pub async fn set_active(&self, valet_id: Uuid, is_active: bool) -> AppResult<Valet> {
        let _guard = self.lock.lock().await;

        let valet = self.find(valet_id).await?;
        let updated = self.persist(Valet { is_active, ..valet }).await?;

        info!(
            "🧑‍✈️ Valet {} {}",
            updated.name,
            if is_active { "activado" } else { "desactivado" }
        );
        Ok(updated)
    }

    /// Escribe el snapshot con la versión siguiente a la leída
    async fn persist(&self, valet: Valet) -> AppResult<Valet> {
        let expected = valet.version;
        let next = Valet {
            version: expected + 1,
            ..valet
        };
        self.valets.save(&next, expected).await?;
        Ok(next)
    }

    pub async fn find(&self, valet_id: Uuid) -> AppResult<Valet> {
        self.valets
            .find_by_id(valet_id)
            .await?
            .ok_or_else(|| not_found_error("Valet", &valet_id.to_string()))
    }

    pub async fn list_valets(&self) -> AppResult<Vec<Valet>> {
        self.valets.list_all().await
    }

    pub async fn availability_report(&self) -> AppResult<ValetAvailabilityReport> {
        let valets = self.valets.list_all().await?;
        Ok(ValetAvailabilityReport::from_valets(&valets, self.local_time()))
    }
}
