use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use daycheck_extract::{load_flight, LogDecoder, Orchestrator};
use daycheck_health::{assemble, FlightError, IdentityRule, Thresholds};
use daycheck_proto::HealthReport;

/// One flight end to end: decode every series, load them all, drop the
/// artifacts, then diagnose. A load failure leaves the artifacts on disk.
pub async fn process_flight<D: LogDecoder>(
    orch: &Orchestrator<D>,
    log: &Path,
    th: &Thresholds,
    rule: &IdentityRule,
) -> Result<HealthReport> {
    let batch = orch.extract(log).await?;

    let (flight, receipt) = load_flight(&batch)
        .map_err(FlightError::from)
        .with_context(|| format!("load {}", log.display()))?;
    debug!("pipeline: loaded {:?}", flight.loaded_types().collect::<Vec<_>>());

    let removed = orch.cleanup(batch, receipt).await?;
    debug!("pipeline: {} artifacts removed", removed);

    let report = assemble(&flight, th, rule).with_context(|| format!("diagnose {}", log.display()))?;
    info!(
        "pipeline: {} aircraft={} worst={}",
        log.display(),
        report.aircraft_id(),
        report.worst_status()
    );
    Ok(report)
}
