mod pipeline;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use daycheck_extract::{discover::discover_logs, doctor as extract_doctor, CommandDecoder, DecoderConfig, Orchestrator};
use daycheck_health::{IdentityRule, Thresholds};
use daycheck_proto::SensorChecks;
use daycheck_store::{doctor as store_doctor, InsertOutcome, JsonlStore, ReportStore};

#[derive(Debug, Parser)]
#[command(name = "daycheck", version, about = "Post-flight health checks for ArduPilot dataflash logs")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate config, decoder and store paths.
    Doctor,
    /// Process every log under logs.root and store the reports.
    Run,
    /// Process one log and print its report without storing it.
    Check {
        log: PathBuf,
        /// JSON list of camera metadata checks to print alongside the report.
        #[arg(long)]
        sensor_checks: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    logs: LogsCfg,
    decoder: DecoderConfig,
    #[serde(default)]
    thresholds: Thresholds,
    #[serde(default)]
    identity: IdentityRule,
    store: StoreCfg,
}

#[derive(Debug, serde::Deserialize)]
struct LogsCfg {
    root: PathBuf,
    #[serde(default = "default_extension")]
    extension: String,
}

fn default_extension() -> String {
    "BIN".into()
}

#[derive(Debug, serde::Deserialize)]
struct StoreCfg { path: PathBuf }

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg).await?,
        Command::Run => run(&cfg).await?,
        Command::Check { log, sensor_checks, json } => check(&cfg, &log, sensor_checks.as_deref(), json).await?,
    }
    Ok(())
}

fn orchestrator(cfg: &Config) -> Orchestrator<CommandDecoder> {
    Orchestrator::new(CommandDecoder::new(&cfg.decoder), cfg.decoder.workers)
        .with_artifact_dir(cfg.decoder.artifact_dir.clone())
}

async fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    cfg.thresholds.validate()?;
    extract_doctor::check_decoder(&cfg.decoder)?;
    extract_doctor::check_logs_root(&cfg.logs.root).or_else(|e| {
        warn!("logs root not usable yet: {:#}", e);
        Ok::<(), anyhow::Error>(())
    })?;
    store_doctor::check_store(&cfg.store.path)?;

    info!("doctor: OK");
    Ok(())
}

#[derive(Debug, Default)]
struct Summary {
    processed: usize,
    stored: usize,
    duplicate: usize,
    failed: usize,
}

async fn run(cfg: &Config) -> Result<()> {
    info!("run: starting");
    cfg.thresholds.validate()?;

    let logs = discover_logs(&cfg.logs.root, &cfg.logs.extension)?;
    info!("run: {} logs under {}", logs.len(), cfg.logs.root.display());

    let orch = orchestrator(cfg);
    let mut store = JsonlStore::open(&cfg.store.path)?;
    let mut summary = Summary::default();

    for log in &logs {
        summary.processed += 1;
        let report = match pipeline::process_flight(&orch, log, &cfg.thresholds, &cfg.identity).await {
            Ok(r) => r,
            Err(e) => {
                warn!("run: {} skipped: {:#}", log.display(), e);
                summary.failed += 1;
                continue;
            }
        };
        match store.insert(&report) {
            Ok(InsertOutcome::Inserted) => summary.stored += 1,
            Ok(InsertOutcome::Duplicate) => {
                info!("run: {} already stored ({})", log.display(), report.flight_start());
                summary.duplicate += 1;
            }
            Err(e) => {
                warn!("run: {} not stored: {:#}", log.display(), e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "run: done processed={} stored={} duplicate={} failed={}",
        summary.processed, summary.stored, summary.duplicate, summary.failed
    );
    Ok(())
}

async fn check(cfg: &Config, log: &Path, sensor_checks: Option<&Path>, json: bool) -> Result<()> {
    cfg.thresholds.validate()?;
    let sensors = match sensor_checks {
        Some(p) => Some(load_sensor_checks(p)?),
        None => None,
    };

    let report = pipeline::process_flight(&orchestrator(cfg), log, &cfg.thresholds, &cfg.identity).await?;

    if json {
        let body = serde_json::json!({
            "report": report,
            "sensors": sensors.as_ref().and_then(SensorChecks::summary),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        let summary = sensors.as_ref().and_then(SensorChecks::summary);
        print!("{}", render::render_text(&report, summary.as_ref()));
    }
    Ok(())
}

fn load_sensor_checks(path: &Path) -> Result<SensorChecks> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse sensor checks {}", path.display()))
}
