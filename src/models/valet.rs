//! Modelo de Valet
//!
//! Conductores de valet, su turno y los contadores de equidad que usa el
//! dispatcher round-robin.

use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

/// Estado operativo del valet - mapea al ENUM valet_status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "valet_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValetStatus {
    Free,
    Busy,
    Break,
    OffDuty,
}

impl ValetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValetStatus::Free => "FREE",
            ValetStatus::Busy => "BUSY",
            ValetStatus::Break => "BREAK",
            ValetStatus::OffDuty => "OFF_DUTY",
        }
    }
}

impl fmt::Display for ValetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tipo de tarea que reserva a un valet - mapea al ENUM task_type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "task_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Parking,
    Retrieval,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Parking => "PARKING",
            TaskType::Retrieval => "RETRIEVAL",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ventana de turno en hora local. Si `end <= start` el turno cruza la medianoche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ShiftWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// `start` incluido, `end` excluido. `start == end` cubre las 24 horas.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start == self.end {
            true
        } else if self.start < self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// Valet principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valet {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub status: ValetStatus,
    pub is_active: bool,
    pub assignment_sequence: u64,
    pub today_count: u32,
    pub total_count: u64,
    pub shift: Option<ShiftWindow>,
    /// Tarea reservada; `Some` si y solo si el valet está BUSY
    pub current_task: Option<TaskType>,
    /// Se incrementa en cada escritura; el store la usa como compare-and-swap
    pub version: i64,
}

impl Valet {
    pub fn new(name: String, phone: String, shift: Option<ShiftWindow>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            phone,
            status: ValetStatus::Free,
            is_active: true,
            assignment_sequence: 0,
            today_count: 0,
            total_count: 0,
            shift,
            current_task: None,
            version: 0,
        }
    }

    /// Sin ventana de turno el valet siempre está en turno
    pub fn in_shift(&self, local_time: NaiveTime) -> bool {
        self.shift.map_or(true, |shift| shift.contains(local_time))
    }

    pub fn is_eligible(&self, local_time: NaiveTime) -> bool {
        self.status == ValetStatus::Free && self.is_active && self.in_shift(local_time)
    }
}

/// Diagnóstico cuando ningún valet es elegible
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValetAvailabilityReport {
    pub total: usize,
    pub free: usize,
    pub busy: usize,
    pub on_break: usize,
    pub off_duty: usize,
    pub inactive: usize,
    /// Valets FREE y activos pero fuera de su turno
    pub out_of_shift: usize,
    pub eligible: usize,
}

impl ValetAvailabilityReport {
    pub fn from_valets(valets: &[Valet], local_time: NaiveTime) -> Self {
        let mut report = Self {
            total: valets.len(),
            ..Self::default()
        };

        for valet in valets {
            match valet.status {
                ValetStatus::Free => report.free += 1,
                ValetStatus::Busy => report.busy += 1,
                ValetStatus::Break => report.on_break += 1,
                ValetStatus::OffDuty => report.off_duty += 1,
            }
            if !valet.is_active {
                report.inactive += 1;
            } else if valet.status == ValetStatus::Free && !valet.in_shift(local_time) {
                report.out_of_shift += 1;
            }
            if valet.is_eligible(local_time) {
                report.eligible += 1;
            }
        }

        report
    }
}

impl fmt::Display for ValetAvailabilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} valets (free: {}, busy: {}, break: {}, off duty: {}, inactive: {}, out of shift: {})",
            self.total,
            self.free,
            self.busy,
            self.on_break,
            self.off_duty,
            self.inactive,
            self.out_of_shift
        )
    }
}
