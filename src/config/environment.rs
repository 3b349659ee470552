//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y la política operativa
//! (tiempos de mark-out, umbral de retraso, zona horaria del turno).

use std::env;
use std::str::FromStr;

use chrono::FixedOffset;

use crate::utils::errors::{AppError, AppResult};

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub log_level: String,
    /// Tiempos de aviso que puede elegir el cliente
    pub markout_lead_minutes: Vec<u32>,
    /// Tiempo usado cuando el cliente no elige (fuente DEFAULT)
    pub default_markout_minutes: u32,
    pub overdue_threshold_minutes: i64,
    /// Desfase de la hora local del parking respecto a UTC, en minutos
    pub operating_utc_offset_minutes: i32,
    pub scheduler_tick_seconds: u64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 8080,
            host: "0.0.0.0".to_string(),
            cors_origins: Vec::new(),
            log_level: "info".to_string(),
            markout_lead_minutes: vec![5, 7, 10],
            default_markout_minutes: 10,
            overdue_threshold_minutes: 2,
            operating_utc_offset_minutes: 330,
            scheduler_tick_seconds: 30,
        }
    }
}

impl EnvironmentConfig {
    /// Leer la configuración del entorno; las variables ausentes toman el valor por defecto
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let config = Self {
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            port: parse_var("PORT", defaults.port)?,
            host: env::var("HOST").unwrap_or(defaults.host),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|origins| split_list(&origins))
                .unwrap_or(defaults.cors_origins),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            markout_lead_minutes: match env::var("MARKOUT_LEAD_MINUTES") {
                Ok(raw) => split_list(&raw)
                    .iter()
                    .map(|value| parse_value("MARKOUT_LEAD_MINUTES", value))
                    .collect::<AppResult<Vec<u32>>>()?,
                Err(_) => defaults.markout_lead_minutes,
            },
            default_markout_minutes: parse_var("DEFAULT_MARKOUT_MINUTES", defaults.default_markout_minutes)?,
            overdue_threshold_minutes: parse_var("OVERDUE_THRESHOLD_MINUTES", defaults.overdue_threshold_minutes)?,
            operating_utc_offset_minutes: parse_var(
                "OPERATING_UTC_OFFSET_MINUTES",
                defaults.operating_utc_offset_minutes,
            )?,
            scheduler_tick_seconds: parse_var("SCHEDULER_TICK_SECONDS", defaults.scheduler_tick_seconds)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Coherencia de la política de mark-out y del desfase horario
    pub fn validate(&self) -> AppResult<()> {
        if self.markout_lead_minutes.is_empty() || self.markout_lead_minutes.contains(&0) {
            return Err(AppError::Internal(
                "MARKOUT_LEAD_MINUTES must list at least one positive value".to_string(),
            ));
        }
        if !self.markout_lead_minutes.contains(&self.default_markout_minutes) {
            return Err(AppError::Internal(format!(
                "DEFAULT_MARKOUT_MINUTES ({}) must be one of {:?}",
                self.default_markout_minutes, self.markout_lead_minutes
            )));
        }
        if self.overdue_threshold_minutes < 0 {
            return Err(AppError::Internal(
                "OVERDUE_THRESHOLD_MINUTES cannot be negative".to_string(),
            ));
        }
        if self.scheduler_tick_seconds == 0 {
            return Err(AppError::Internal(
                "SCHEDULER_TICK_SECONDS must be positive".to_string(),
            ));
        }
        self.operating_offset()?;
        Ok(())
    }

    pub fn operating_offset(&self) -> AppResult<FixedOffset> {
        FixedOffset::east_opt(self.operating_utc_offset_minutes * 60).ok_or_else(|| {
            AppError::Internal(format!(
                "OPERATING_UTC_OFFSET_MINUTES out of range: {}",
                self.operating_utc_offset_minutes
            ))
        })
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Internal(format!("{} must be a valid number, got '{}'", name, raw)))
}

fn parse_var<T: FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}
