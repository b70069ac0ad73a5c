use std::fmt::Write;

use daycheck_proto::{DiagnosticResult, HealthReport};

/// Human-readable report, one subsystem per line.
pub fn render_text(report: &HealthReport, sensors: Option<&DiagnosticResult>) -> String {
    let mut out = String::new();
    let m = report.metrics();
    let _ = writeln!(out, "aircraft  {}", report.aircraft_id());
    let _ = writeln!(out, "start     {}", report.flight_start());
    let _ = writeln!(out, "duration  {:.0}s", m.flight_duration_s);
    if let Some(mah) = m.battery_consumed_mah {
        let _ = writeln!(out, "battery   {:.0} mAh", mah);
    }
    for (name, res) in report.subsystems().iter() {
        let _ = writeln!(out, "{:<9} {:<7} {}", name, res.status(), res.feedback());
    }
    if let Some(s) = sensors {
        let _ = writeln!(out, "{:<9} {:<7} {}", "sensor", s.status(), s.feedback());
    }
    if let Some(p) = m.motor_pwm {
        let _ = writeln!(out, "pwm       {} {} {} {}", p[0], p[1], p[2], p[3]);
    }
    let _ = writeln!(out, "overall   {}", report.worst_status());
    out
}
