pub mod assemble;
pub mod engine;
pub mod identity;
pub mod thresholds;

pub use assemble::{assemble, FlightError};
pub use engine::{diagnose, Diagnosis, EngineInputs};
pub use identity::{parse_aircraft_id, IdentityError, IdentityRule};
pub use thresholds::Thresholds;
