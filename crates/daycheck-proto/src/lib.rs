pub mod report;
pub mod sensor;

pub use report::{DiagnosticResult, FlightIdentity, FlightMetrics, HealthReport, Status, Subsystems};
pub use sensor::{SensorCheck, SensorChecks};
