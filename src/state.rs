//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::repositories::Stores;
use crate::services::{SideEffectExecutor, VehicleLifecycle};
use crate::utils::clock::Clock;
use crate::utils::errors::AppResult;

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub lifecycle: Arc<VehicleLifecycle>,
    pub side_effects: SideEffectExecutor,
}

impl AppState {
    pub fn new(config: EnvironmentConfig, lifecycle: Arc<VehicleLifecycle>, side_effects: SideEffectExecutor) -> Self {
        Self {
            config,
            lifecycle,
            side_effects,
        }
    }

    /// Estado completo sobre los stores dados, con sinks de tracing
    pub fn build(stores: &Stores, config: EnvironmentConfig, clock: Arc<dyn Clock>) -> AppResult<Self> {
        let lifecycle = VehicleLifecycle::from_config(stores, &config, clock)?;
        Ok(Self::new(config, Arc::new(lifecycle), SideEffectExecutor::tracing()))
    }
}
