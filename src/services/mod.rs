//! Services module
//!
//! Este módulo contiene la lógica de negocio del valet parking: asignación de
//! slots y valets, la máquina de estados del vehículo, la política de
//! mark-out y la ejecución de efectos secundarios.

pub mod markout_scheduler;
pub mod notification_service;
pub mod valet_dispatcher;
pub mod vehicle_lifecycle;
pub mod zone_allocator;

pub use markout_scheduler::MarkOutScheduler;
pub use notification_service::*;
pub use valet_dispatcher::ValetDispatcher;
pub use vehicle_lifecycle::*;
pub use zone_allocator::*;
