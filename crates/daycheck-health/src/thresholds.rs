use serde::Deserialize;
use thiserror::Error;

/// Escalation levels for the diagnostic rules. Every comparison against a
/// warn/fail level is inclusive except the vibration magnitude, which must
/// strictly exceed `vibe_warn`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// PWM difference inside a motor pair
    pub motor_warn: i64,
    pub motor_fail: i64,
    /// Mean vibration per axis, m/s/s
    pub vibe_warn: f64,
    /// Board voltage standard deviation, volts
    pub vcc_warn: f64,
    pub vcc_fail: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            motor_warn: 30,
            motor_fail: 45,
            vibe_warn: 30.0,
            vcc_warn: 0.10,
            vcc_fail: 0.15,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("thresholds.{name}: warn level {warn} must be below fail level {fail}")]
    Inverted { name: &'static str, warn: f64, fail: f64 },
    #[error("thresholds.{0} must be positive")]
    NotPositive(&'static str),
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        if self.motor_warn <= 0 {
            return Err(ThresholdError::NotPositive("motor_warn"));
        }
        if self.motor_warn >= self.motor_fail {
            return Err(ThresholdError::Inverted {
                name: "motor",
                warn: self.motor_warn as f64,
                fail: self.motor_fail as f64,
            });
        }
        if self.vibe_warn <= 0.0 {
            return Err(ThresholdError::NotPositive("vibe_warn"));
        }
        if self.vcc_warn <= 0.0 {
            return Err(ThresholdError::NotPositive("vcc_warn"));
        }
        if self.vcc_warn >= self.vcc_fail {
            return Err(ThresholdError::Inverted { name: "vcc", warn: self.vcc_warn, fail: self.vcc_fail });
        }
        Ok(())
    }
}
