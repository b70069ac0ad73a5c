use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

use crate::message::MessageType;

/// External log decoder. One call per (log, message type); it either writes
/// the artifact or leaves it absent/empty.
pub trait LogDecoder: Send + Sync + 'static {
    fn decode(&self, log: &Path, ty: MessageType, artifact: &Path) -> Result<()>;

    /// Removes an artifact this decoder produced. Already-gone files are fine.
    fn discard(&self, artifact: &Path) -> Result<()> {
        remove_artifact(artifact)
    }
}

/// Deletes `artifact` if present.
pub fn remove_artifact(artifact: &Path) -> Result<()> {
    match std::fs::remove_file(artifact) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove artifact {}", artifact.display())),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecoderConfig {
    /// Decoder executable, e.g. `mavlogdump.py`
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Upper bound on concurrent decode/delete jobs
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Where artifacts go. Defaults to the log's own folder.
    pub artifact_dir: Option<PathBuf>,
}

fn default_args() -> Vec<String> {
    vec!["--planner".into(), "--format".into(), "csv".into()]
}

fn default_workers() -> usize {
    4
}

/// Runs an external program as
/// `<program> <args..> --types <TYPE> <log>` with stdout captured into the artifact.
#[derive(Debug, Clone)]
pub struct CommandDecoder {
    program: String,
    args: Vec<String>,
}

impl CommandDecoder {
    pub fn new(cfg: &DecoderConfig) -> Self {
        Self { program: cfg.program.clone(), args: cfg.args.clone() }
    }
}

impl LogDecoder for CommandDecoder {
    fn decode(&self, log: &Path, ty: MessageType, artifact: &Path) -> Result<()> {
        let out = File::create(artifact)
            .with_context(|| format!("create artifact {}", artifact.display()))?;

        debug!("decoder: {} --types {} {}", self.program, ty, log.display());
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg("--types")
            .arg(ty.code())
            .arg(log)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("run {}", self.program))?;

        anyhow::ensure!(status.success(), "{} exited with {} for {}", self.program, status, ty);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::scratch_dir;

    #[test]
    fn config_defaults() {
        let cfg: DecoderConfig = toml::from_str(r#"program = "mavlogdump.py""#).unwrap();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.args, vec!["--planner", "--format", "csv"]);
        assert!(cfg.artifact_dir.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn command_decoder_captures_stdout() {
        let dir = scratch_dir("decoder-echo");
        let artifact = dir.join("out_EV.csv");
        let dec = CommandDecoder { program: "echo".into(), args: vec!["timestamp,Id".into()] };
        dec.decode(Path::new("flight.BIN"), MessageType::EventMarker, &artifact).unwrap();
        let body = std::fs::read_to_string(&artifact).unwrap();
        assert_eq!(body.trim(), "timestamp,Id --types EV flight.BIN");
    }

    #[test]
    fn missing_program_is_an_error() {
        let dir = scratch_dir("decoder-missing");
        let dec = CommandDecoder { program: "daycheck-no-such-decoder".into(), args: vec![] };
        assert!(dec.decode(Path::new("x.BIN"), MessageType::Trigger, &dir.join("x_TRIG.csv")).is_err());
    }

    #[test]
    fn discard_tolerates_missing_file() {
        let dir = scratch_dir("decoder-discard");
        let dec = CommandDecoder { program: "true".into(), args: vec![] };
        let p = dir.join("gone.csv");
        std::fs::write(&p, "x").unwrap();
        dec.discard(&p).unwrap();
        assert!(!p.exists());
        dec.discard(&p).unwrap();
    }
}
