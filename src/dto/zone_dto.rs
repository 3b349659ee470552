use serde::Deserialize;
use validator::Validate;

// Request para crear una zona
#[derive(Debug, Deserialize, Validate)]
pub struct CreateZoneRequest {
    #[validate(length(min = 1, max = 16))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 10000))]
    pub total_slots: u32,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Deserialize)]
pub struct SetZoneActiveRequest {
    pub is_active: bool,
}
