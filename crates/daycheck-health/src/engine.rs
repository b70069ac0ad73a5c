//! Threshold rules over the per-flight series. Pure: no I/O, no shared state.
//!
//! Each sub-test is independent. When the series or column a test needs is
//! missing, that test alone reports UNKNOWN and the others still run.

use daycheck_extract::{LoadedFlight, MessageType, TimeSeries};
use daycheck_proto::{DiagnosticResult, Status, Subsystems};
use std::fmt;

use crate::thresholds::Thresholds;

const MOTOR_CHANNELS: [&str; 4] = ["C1", "C2", "C3", "C4"];
const VIBE_AXES: [&str; 3] = ["VibeX", "VibeY", "VibeZ"];
const CLIP_COUNTERS: [&str; 3] = ["Clip0", "Clip1", "Clip2"];
const VCC_COLUMN: &str = "Vcc";

/// The five series the rules look at. Any of them may be absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineInputs<'a> {
    pub motors: Option<&'a TimeSeries>,
    pub vibration: Option<&'a TimeSeries>,
    pub power: Option<&'a TimeSeries>,
    pub camera: Option<&'a TimeSeries>,
    pub trigger: Option<&'a TimeSeries>,
}

impl<'a> EngineInputs<'a> {
    pub fn from_flight(flight: &'a LoadedFlight) -> Self {
        Self {
            motors: flight.series(MessageType::MotorOutput),
            vibration: flight.series(MessageType::Vibration),
            power: flight.series(MessageType::PowerRail),
            camera: flight.series(MessageType::CameraFeedback),
            trigger: flight.series(MessageType::Trigger),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    pub subsystems: Subsystems,
    pub motor_pwm: Option<[i64; 4]>,
    pub vcc_mean: Option<f64>,
    pub vcc_std: Option<f64>,
}

pub fn diagnose(inputs: &EngineInputs<'_>, th: &Thresholds) -> Diagnosis {
    let (motors, motor_pwm) = match motor_means(inputs.motors) {
        Ok(pwm) => (evaluate_motors(pwm, th), Some(pwm)),
        Err(p) => (p.into_result(), None),
    };
    let imu = vibe_test(inputs.vibration, th).unwrap_or_else(Precondition::into_result);
    let (vcc, vcc_mean, vcc_std) = match vcc_stats(inputs.power) {
        Ok((mean, std)) => (evaluate_vcc(mean, std, th), Some(mean), Some(std)),
        Err(p) => (p.into_result(), None, None),
    };
    let trigger = trigger_test(inputs.trigger, inputs.camera).unwrap_or_else(Precondition::into_result);

    Diagnosis { subsystems: Subsystems { motors, imu, vcc, trigger }, motor_pwm, vcc_mean, vcc_std }
}

/// Why a sub-test could not evaluate its rule.
#[derive(Debug, Clone, PartialEq)]
enum Precondition {
    MissingSeries(MessageType),
    MissingColumn(MessageType, &'static str),
    NotEnoughSamples(MessageType, &'static str),
}

impl Precondition {
    fn into_result(self) -> DiagnosticResult {
        DiagnosticResult::unknown(self.to_string())
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::MissingSeries(ty) => write!(f, "No {} data in log.", ty),
            Precondition::MissingColumn(ty, col) => write!(f, "{} data has no {} field.", ty, col),
            Precondition::NotEnoughSamples(ty, col) => write!(f, "Not enough {}.{} samples.", ty, col),
        }
    }
}

fn series(s: Option<&TimeSeries>, ty: MessageType) -> Result<&TimeSeries, Precondition> {
    s.ok_or(Precondition::MissingSeries(ty))
}

fn column(s: &TimeSeries, col: &'static str, min_samples: usize) -> Result<Vec<f64>, Precondition> {
    let values = s.numeric(col).ok_or(Precondition::MissingColumn(s.kind(), col))?;
    if values.len() < min_samples {
        return Err(Precondition::NotEnoughSamples(s.kind(), col));
    }
    Ok(values)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
fn sample_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ----- Motors -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MotorPair {
    Front,
    Back,
}

impl MotorPair {
    /// Zero-based channel indices sharing an airframe side.
    fn channels(self) -> (usize, usize) {
        match self {
            MotorPair::Front => (0, 2),
            MotorPair::Back => (1, 3),
        }
    }
}

impl fmt::Display for MotorPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MotorPair::Front => "front",
            MotorPair::Back => "back",
        })
    }
}

fn motor_means(rcou: Option<&TimeSeries>) -> Result<[i64; 4], Precondition> {
    let rcou = series(rcou, MessageType::MotorOutput)?;
    let mut pwm = [0i64; 4];
    for (slot, ch) in pwm.iter_mut().zip(MOTOR_CHANNELS) {
        *slot = mean(&column(rcou, ch, 1)?).trunc() as i64;
    }
    Ok(pwm)
}

/// Flags the worst motor pair. FAIL supersedes WARN within a pair; between
/// pairs the more severe wins and the front pair wins a tie. The suspect is
/// the higher-output motor of the pair, the lower channel on equal output.
pub fn evaluate_motors(pwm: [i64; 4], th: &Thresholds) -> DiagnosticResult {
    let mut flagged: Option<(Status, MotorPair, usize)> = None;

    for pair in [MotorPair::Front, MotorPair::Back] {
        let (a, b) = pair.channels();
        let diff = (pwm[a] - pwm[b]).abs();
        let status = if diff >= th.motor_fail {
            Status::Fail
        } else if diff >= th.motor_warn {
            Status::Warn
        } else {
            continue;
        };
        let suspect = if pwm[b] > pwm[a] { b } else { a };
        if flagged.map_or(true, |(s, _, _)| status.severity() > s.severity()) {
            flagged = Some((status, pair, suspect));
        }
    }

    match flagged {
        None => DiagnosticResult::ok("balanced"),
        Some((Status::Fail, pair, m)) => DiagnosticResult::fail(format!(
            "Big difference in {} motors PWM avg. Check motor {}.",
            pair,
            m + 1
        )),
        Some((status, pair, m)) => DiagnosticResult::new(
            status,
            format!("Small difference between {} motors PWM. Check motor {}.", pair, m + 1),
        ),
    }
}

// ----- Vibration -----

fn vibe_test(vibe: Option<&TimeSeries>, th: &Thresholds) -> Result<DiagnosticResult, Precondition> {
    let vibe = series(vibe, MessageType::Vibration)?;

    let mut means = [0.0f64; 3];
    for (slot, axis) in means.iter_mut().zip(VIBE_AXES) {
        *slot = mean(&column(vibe, axis, 1)?);
    }
    let mut clips = [0.0f64; 3];
    for (slot, counter) in clips.iter_mut().zip(CLIP_COUNTERS) {
        column(vibe, counter, 1)?;
        *slot = vibe
            .last_numeric(counter)
            .ok_or(Precondition::NotEnoughSamples(MessageType::Vibration, counter))?;
    }

    // Both checks always run; the clip check is evaluated last and wins.
    let mut result = DiagnosticResult::ok("no vibe issues");
    if means.iter().any(|m| *m > th.vibe_warn) {
        let worst = means.iter().cloned().fold(f64::MIN, f64::max);
        result = DiagnosticResult::warn(format!("Severe vibration ({:.1} m/s/s).", worst));
    }
    if clips.iter().any(|c| *c > 0.0) {
        let worst = clips.iter().cloned().fold(f64::MIN, f64::max);
        result = DiagnosticResult::fail(format!("Accel was clipped {} times.", worst as i64));
    }
    Ok(result)
}

// ----- Board voltage -----

fn vcc_stats(powr: Option<&TimeSeries>) -> Result<(f64, f64), Precondition> {
    let powr = series(powr, MessageType::PowerRail)?;
    let vcc = column(powr, VCC_COLUMN, 2)?;
    Ok((round2(mean(&vcc)), round2(sample_std(&vcc))))
}

/// `std` is expected already rounded to two decimals.
pub fn evaluate_vcc(mean: f64, std: f64, th: &Thresholds) -> DiagnosticResult {
    if std >= th.vcc_fail {
        DiagnosticResult::fail(format!("Big voltage deviation ({}v), please check the board.", std))
    } else if std >= th.vcc_warn {
        DiagnosticResult::warn(format!("Small voltage deviation ({}v), please check the board.", std))
    } else {
        DiagnosticResult::ok(format!("No board voltage issues (avg: {}v, std: {}v).", mean, std))
    }
}

// ----- Camera trigger -----

fn trigger_test(trig: Option<&TimeSeries>, cam: Option<&TimeSeries>) -> Result<DiagnosticResult, Precondition> {
    let triggers = series(trig, MessageType::Trigger)?.len();
    let feedbacks = series(cam, MessageType::CameraFeedback)?.len();
    Ok(evaluate_trigger(triggers, feedbacks))
}

pub fn evaluate_trigger(triggers: usize, feedbacks: usize) -> DiagnosticResult {
    use std::cmp::Ordering;
    match triggers.cmp(&feedbacks) {
        Ordering::Equal => DiagnosticResult::ok(format!("No photos skipped ({}).", triggers)),
        Ordering::Greater => DiagnosticResult::fail(format!(
            "{} photos were taken without feedback.",
            triggers - feedbacks
        )),
        Ordering::Less => DiagnosticResult::fail(format!("The camera skipped {} photos.", feedbacks - triggers)),
    }
}
