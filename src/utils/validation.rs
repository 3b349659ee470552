//! Utilidades de validación
//!
//! Normalización y validación de matrículas y teléfonos móviles. Las
//! funciones `normalize_*` devuelven la forma canónica que se guarda en el
//! store; las `validate_*` se usan desde los DTO con `validator`.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

use crate::utils::errors::{AppError, AppResult};

lazy_static! {
    // KL07AB1234, DL3CAB1234, MH12A1234
    static ref STATE_PLATE: Regex = Regex::new(r"^[A-Z]{2}\d{1,2}[A-Z]{0,3}\d{4}$").unwrap();
    // Serie BH: 22BH1234AA
    static ref BH_PLATE: Regex = Regex::new(r"^\d{2}BH\d{4}[A-Z]{1,2}$").unwrap();
    static ref MOBILE: Regex = Regex::new(r"^[6-9]\d{9}$").unwrap();
}

/// Mayúsculas y sin espacios, guiones ni puntos
pub fn normalize_plate(value: &str) -> AppResult<String> {
    let plate: String = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '_'))
        .flat_map(|c| c.to_uppercase())
        .collect();

    if STATE_PLATE.is_match(&plate) || BH_PLATE.is_match(&plate) {
        Ok(plate)
    } else {
        Err(AppError::InvalidPlate(value.to_string()))
    }
}

/// Móvil local de 10 dígitos, sin prefijo de país (+91 / 91) ni 0 inicial
pub fn normalize_phone(value: &str) -> AppResult<String> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();

    let local = match digits.len() {
        12 if digits.starts_with("91") => &digits[2..],
        11 if digits.starts_with('0') => &digits[1..],
        _ => digits.as_str(),
    };

    if MOBILE.is_match(local) {
        Ok(local.to_string())
    } else {
        Err(AppError::InvalidPhone(value.to_string()))
    }
}

/// Validar formato de matrícula de vehículo
pub fn validate_license_plate(value: &str) -> Result<(), ValidationError> {
    normalize_plate(value).map(|_| ()).map_err(|_| {
        let mut error = ValidationError::new("license_plate");
        error.add_param("value".into(), &value.to_string());
        error
    })
}

/// Validar formato de teléfono móvil
pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    normalize_phone(value).map(|_| ()).map_err(|_| {
        let mut error = ValidationError::new("phone");
        error.add_param("value".into(), &value.to_string());
        error
    })
}

/// Validar que un string no esté vacío
pub fn validate_not_empty(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_empty");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}
