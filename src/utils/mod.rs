//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores, validación,
//! generación de tokens, reloj y locks por clave.

pub mod clock;
pub mod errors;
pub mod keyed_lock;
pub mod token;
pub mod validation;
