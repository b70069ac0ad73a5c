use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Outcome of one diagnostic sub-test.
///
/// `Unknown` is a completed state: the test ran but its inputs were missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Warn,
    Fail,
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warn => "WARN",
            Status::Fail => "FAIL",
            Status::Unknown => "UNKNOWN",
        }
    }

    /// Ranking used when picking the worst of several results. Unknown ranks
    /// between OK and WARN: it hides nothing but proves nothing either.
    pub fn severity(&self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::Unknown => 1,
            Status::Warn => 2,
            Status::Fail => 3,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    status: Status,
    feedback: String,
}

impl DiagnosticResult {
    pub fn new(status: Status, feedback: impl Into<String>) -> Self {
        Self { status, feedback: feedback.into() }
    }

    pub fn ok(feedback: impl Into<String>) -> Self { Self::new(Status::Ok, feedback) }
    pub fn warn(feedback: impl Into<String>) -> Self { Self::new(Status::Warn, feedback) }
    pub fn fail(feedback: impl Into<String>) -> Self { Self::new(Status::Fail, feedback) }
    pub fn unknown(feedback: impl Into<String>) -> Self { Self::new(Status::Unknown, feedback) }

    pub fn status(&self) -> Status { self.status }
    pub fn feedback(&self) -> &str { &self.feedback }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightIdentity {
    #[serde(with = "time::serde::rfc3339")]
    pub flight_start: OffsetDateTime,
    pub aircraft_id: String,
}

/// The four sub-test results of one flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subsystems {
    pub motors: DiagnosticResult,
    pub imu: DiagnosticResult,
    pub vcc: DiagnosticResult,
    pub trigger: DiagnosticResult,
}

impl Subsystems {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &DiagnosticResult)> {
        [
            ("motors", &self.motors),
            ("imu", &self.imu),
            ("vcc", &self.vcc),
            ("trigger", &self.trigger),
        ]
        .into_iter()
    }
}

/// Derived scalars. Each is absent when the sub-test feeding it could not run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlightMetrics {
    /// Mean output per motor channel, truncated to whole PWM units.
    pub motor_pwm: Option<[i64; 4]>,
    pub vcc_mean: Option<f64>,
    pub vcc_std: Option<f64>,
    pub flight_duration_s: f64,
    pub battery_consumed_mah: Option<f64>,
}

/// Frozen per-flight diagnosis. There is no mutable access once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    identity: FlightIdentity,
    subsystems: Subsystems,
    metrics: FlightMetrics,
}

impl HealthReport {
    pub fn new(identity: FlightIdentity, subsystems: Subsystems, metrics: FlightMetrics) -> Self {
        Self { identity, subsystems, metrics }
    }

    pub fn flight_start(&self) -> OffsetDateTime { self.identity.flight_start }
    pub fn aircraft_id(&self) -> &str { &self.identity.aircraft_id }
    pub fn identity(&self) -> &FlightIdentity { &self.identity }
    pub fn subsystems(&self) -> &Subsystems { &self.subsystems }
    pub fn metrics(&self) -> &FlightMetrics { &self.metrics }

    pub fn worst_status(&self) -> Status {
        self.subsystems
            .iter()
            .map(|(_, r)| r.status())
            .max_by_key(Status::severity)
            .unwrap_or(Status::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn report(imu: DiagnosticResult) -> HealthReport {
        HealthReport::new(
            FlightIdentity { flight_start: datetime!(2022-04-21 17:17:20 UTC), aircraft_id: "0030002D".into() },
            Subsystems {
                motors: DiagnosticResult::ok("balanced"),
                imu,
                vcc: DiagnosticResult::unknown("no POWR series"),
                trigger: DiagnosticResult::ok("No photos skipped (12)."),
            },
            FlightMetrics::default(),
        )
    }

    #[test]
    fn worst_status_prefers_fail_over_unknown() {
        assert_eq!(report(DiagnosticResult::fail("clipped")).worst_status(), Status::Fail);
        assert_eq!(report(DiagnosticResult::ok("no vibe issues")).worst_status(), Status::Unknown);
    }

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&DiagnosticResult::warn("small")).unwrap();
        assert_eq!(json, r#"{"status":"WARN","feedback":"small"}"#);
    }

    #[test]
    fn report_serializes_timestamp_as_rfc3339() {
        let json = serde_json::to_value(report(DiagnosticResult::ok("x"))).unwrap();
        assert_eq!(json["identity"]["flight_start"], "2022-04-21T17:17:20Z");
        assert_eq!(json["identity"]["aircraft_id"], "0030002D");
    }
}
