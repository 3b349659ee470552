use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{ShiftWindow, ValetStatus};
use crate::utils::validation::validate_phone;

// Request para dar de alta un valet
#[derive(Debug, Deserialize, Validate)]
pub struct OnboardValetRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    pub shift_start: Option<NaiveTime>,
    pub shift_end: Option<NaiveTime>,
}

impl OnboardValetRequest {
    /// Turno solo si vienen inicio y fin
    pub fn shift(&self) -> Option<ShiftWindow> {
        match (self.shift_start, self.shift_end) {
            (Some(start), Some(end)) => Some(ShiftWindow::new(start, end)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateValetStatusRequest {
    pub status: ValetStatus,
}

#[derive(Debug, Deserialize)]
pub struct SetValetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetDailyResponse {
    pub valets_reset: usize,
}
