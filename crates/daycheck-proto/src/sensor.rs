use serde::{Deserialize, Serialize};

use crate::report::{DiagnosticResult, Status};

/// One camera metadata check produced outside the pipeline (ISO, shutter, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorCheck {
    pub name: String,
    pub status: Status,
    #[serde(default)]
    pub note: Option<String>,
}

/// Auxiliary pass/fail set merged into the report presentation only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorChecks {
    checks: Vec<SensorCheck>,
}

impl SensorChecks {
    pub fn new(checks: Vec<SensorCheck>) -> Self {
        Self { checks }
    }

    pub fn checks(&self) -> &[SensorCheck] {
        &self.checks
    }

    /// All checks OK gives a single OK line; otherwise the last failing check
    /// is reported. `None` when nothing was checked.
    pub fn summary(&self) -> Option<DiagnosticResult> {
        if self.checks.is_empty() {
            return None;
        }
        let failing = self.checks.iter().rev().find(|c| c.status != Status::Ok);
        Some(match failing {
            None => DiagnosticResult::ok("no sensor issues"),
            Some(c) => DiagnosticResult::new(
                c.status,
                c.note.clone().unwrap_or_else(|| format!("Check camera {}.", c.name.to_lowercase())),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, status: Status, note: Option<&str>) -> SensorCheck {
        SensorCheck { name: name.into(), status, note: note.map(Into::into) }
    }

    #[test]
    fn all_ok_reports_no_issues() {
        let c = SensorChecks::new(vec![check("ISO", Status::Ok, None), check("Shutter", Status::Ok, None)]);
        assert_eq!(c.summary(), Some(DiagnosticResult::ok("no sensor issues")));
    }

    #[test]
    fn last_failure_wins() {
        let c = SensorChecks::new(vec![
            check("ISO", Status::Fail, Some("Check camera ISO.")),
            check("Shutter", Status::Ok, None),
            check("Artist", Status::Fail, None),
        ]);
        assert_eq!(c.summary(), Some(DiagnosticResult::fail("Check camera artist.")));
    }

    #[test]
    fn empty_set_has_no_summary() {
        assert_eq!(SensorChecks::default().summary(), None);
    }

    #[test]
    fn parses_plain_json_array() {
        let c: SensorChecks = serde_json::from_str(
            r#"[{"name":"ISO","status":"OK"},{"name":"Copyright","status":"FAIL","note":"Check camera copyright."}]"#,
        )
        .unwrap();
        assert_eq!(c.checks().len(), 2);
        assert_eq!(c.summary().unwrap().feedback(), "Check camera copyright.");
    }
}
