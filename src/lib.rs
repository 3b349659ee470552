//! Motor de asignación y ciclo de vida de un valet parking
//!
//! Asigna slots por zona y valets en round-robin, y lleva cada vehículo por
//! PARKING → PARKED → ... → CLOSED. Las notificaciones y la auditoría se
//! devuelven como intenciones que ejecuta la capa HTTP.

pub mod config;
pub mod controllers;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
