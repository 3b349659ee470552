//! Modelos del sistema
//!
//! Snapshots de dominio del valet parking: vehículos, valets, zonas,
//! solicitudes de mark-out e intenciones de efectos secundarios.

pub mod intent;
pub mod markout;
pub mod valet;
pub mod vehicle;
pub mod zone;

pub use intent::*;
pub use markout::*;
pub use valet::*;
pub use vehicle::*;
pub use zone::*;
