pub mod entities;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use fleet_core::{FleetError, FleetResult};
pub use repositories::*;
pub use services::*;
pub use value_objects::*;
