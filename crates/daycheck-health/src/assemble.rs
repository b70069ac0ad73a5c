use daycheck_extract::{LoadError, LoadedFlight, MessageType};
use daycheck_proto::{FlightIdentity, FlightMetrics, HealthReport};
use thiserror::Error;
use tracing::debug;

use crate::engine::{diagnose, EngineInputs};
use crate::identity::{parse_aircraft_id, IdentityError, IdentityRule};
use crate::thresholds::Thresholds;

const BATTERY_CONSUMED_COLUMN: &str = "CurrTot";

/// Reasons a flight produces no report at all.
#[derive(Debug, Error)]
pub enum FlightError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("aircraft identity: {0}")]
    Identity(#[from] IdentityError),
    #[error("{0} series not loaded")]
    MissingSeries(MessageType),
    #[error("flight start {0} is not a valid epoch timestamp")]
    InvalidTimestamp(f64),
}

/// Runs the diagnostics over a loaded flight and freezes the result into a
/// [`HealthReport`]. Either every field is filled or nothing is returned.
pub fn assemble(flight: &LoadedFlight, th: &Thresholds, rule: &IdentityRule) -> Result<HealthReport, FlightError> {
    let msg = flight
        .series(MessageType::StatusText)
        .ok_or(FlightError::MissingSeries(MessageType::StatusText))?;
    let aircraft_id = parse_aircraft_id(msg, rule)?;

    let window = flight.window();
    let flight_start = window.start_datetime().ok_or(FlightError::InvalidTimestamp(window.start))?;

    let diagnosis = diagnose(&EngineInputs::from_flight(flight), th);
    let battery_consumed_mah = flight
        .series(MessageType::Battery)
        .and_then(|bat| bat.last_numeric(BATTERY_CONSUMED_COLUMN));

    debug!("assemble: {} @ {}", aircraft_id, flight_start);
    Ok(HealthReport::new(
        FlightIdentity { flight_start, aircraft_id },
        diagnosis.subsystems,
        FlightMetrics {
            motor_pwm: diagnosis.motor_pwm,
            vcc_mean: diagnosis.vcc_mean,
            vcc_std: diagnosis.vcc_std,
            flight_duration_s: window.duration_s(),
            battery_consumed_mah,
        },
    ))
}
