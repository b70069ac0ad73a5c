pub mod doctor;

use anyhow::{Context, Result};
use daycheck_proto::HealthReport;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A report for the same flight timestamp is already stored.
    Duplicate,
}

/// Insert-only report sink, keyed by flight start timestamp.
pub trait ReportStore {
    fn insert(&mut self, report: &HealthReport) -> Result<InsertOutcome>;
}

/// One flat row per flight, mirroring the report/motors tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReport {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub drone_uid: String,
    pub motor_status: String,
    pub motor_feedback: String,
    pub imu_status: String,
    pub imu_feedback: String,
    pub vcc_status: String,
    pub vcc_feedback: String,
    pub vcc_mean: Option<f64>,
    pub vcc_std: Option<f64>,
    pub trig_status: String,
    pub trig_feedback: String,
    pub m1_avg_pwm: Option<i64>,
    pub m2_avg_pwm: Option<i64>,
    pub m3_avg_pwm: Option<i64>,
    pub m4_avg_pwm: Option<i64>,
    pub flight_duration_s: f64,
    pub battery_consumed_mah: Option<f64>,
}

impl From<&HealthReport> for StoredReport {
    fn from(r: &HealthReport) -> Self {
        let s = r.subsystems();
        let m = r.metrics();
        let pwm = |i: usize| m.motor_pwm.map(|p| p[i]);
        Self {
            timestamp: r.flight_start(),
            drone_uid: r.aircraft_id().to_string(),
            motor_status: s.motors.status().to_string(),
            motor_feedback: s.motors.feedback().to_string(),
            imu_status: s.imu.status().to_string(),
            imu_feedback: s.imu.feedback().to_string(),
            vcc_status: s.vcc.status().to_string(),
            vcc_feedback: s.vcc.feedback().to_string(),
            vcc_mean: m.vcc_mean,
            vcc_std: m.vcc_std,
            trig_status: s.trigger.status().to_string(),
            trig_feedback: s.trigger.feedback().to_string(),
            m1_avg_pwm: pwm(0),
            m2_avg_pwm: pwm(1),
            m3_avg_pwm: pwm(2),
            m4_avg_pwm: pwm(3),
            flight_duration_s: m.flight_duration_s,
            battery_consumed_mah: m.battery_consumed_mah,
        }
    }
}

/// Append-only JSON-lines file. Existing flight timestamps are indexed at
/// open so re-running a folder never writes a flight twice.
pub struct JsonlStore {
    path: PathBuf,
    seen: HashSet<i128>,
}

impl JsonlStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut seen = HashSet::new();

        if path.exists() {
            let f = fs::File::open(&path).with_context(|| format!("open store {}", path.display()))?;
            for (n, line) in BufReader::new(f).lines().enumerate() {
                let line = line.with_context(|| format!("read store {}", path.display()))?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<StoredReport>(&line) {
                    Ok(rec) => {
                        seen.insert(rec.timestamp.unix_timestamp_nanos());
                    }
                    Err(e) => warn!("store: {} line {} unreadable, ignored: {}", path.display(), n + 1, e),
                }
            }
        }
        info!("store: {} ({} flights recorded)", path.display(), seen.len());
        Ok(Self { path, seen })
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn contains(&self, flight_start: OffsetDateTime) -> bool {
        self.seen.contains(&flight_start.unix_timestamp_nanos())
    }

    /// All records currently in the file, in insertion order.
    pub fn records(&self) -> Result<Vec<StoredReport>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let body = fs::read_to_string(&self.path).with_context(|| format!("read store {}", self.path.display()))?;
        Ok(body
            .lines()
            .filter_map(|l| serde_json::from_str::<StoredReport>(l).ok())
            .collect())
    }
}

impl ReportStore for JsonlStore {
    fn insert(&mut self, report: &HealthReport) -> Result<InsertOutcome> {
        let key = report.flight_start().unix_timestamp_nanos();
        if self.seen.contains(&key) {
            debug!("store: flight {} already recorded", report.flight_start());
            return Ok(InsertOutcome::Duplicate);
        }

        let mut line = serde_json::to_string(&StoredReport::from(report))?;
        line.push('\n');
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open store {}", self.path.display()))?;
        f.write_all(line.as_bytes())?;
        f.flush()?;

        self.seen.insert(key);
        Ok(InsertOutcome::Inserted)
    }
}
