//! Controladores de la API
//!
//! Validan los DTOs, llaman al ciclo de vida y convierten el resultado en
//! respuestas. Los efectos secundarios de cada transición se ejecutan aquí.

pub mod valet_controller;
pub mod vehicle_controller;
pub mod zone_controller;
