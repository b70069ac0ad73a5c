use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::message::MessageType;
use crate::orchestrator::ExtractedBatch;
use crate::series::{FlightWindow, Row, TimeSeries, Value};

const TIMESTAMP_COLUMN: &str = "timestamp";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("required {ty} series missing: {} not produced or has no header", path.display())]
    Missing { ty: MessageType, path: PathBuf },
    #[error("required {ty} series has no parsable rows ({})", path.display())]
    Empty { ty: MessageType, path: PathBuf },
    #[error("cannot read {ty} artifact {}", path.display())]
    Unreadable {
        ty: MessageType,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Proof that every artifact of a batch has been read into memory. Only
/// [`load_flight`] can produce one, and artifact deletion requires it.
#[derive(Debug)]
pub struct LoadReceipt {
    log: PathBuf,
    confirmed: Vec<(MessageType, PathBuf)>,
}

impl LoadReceipt {
    pub fn log(&self) -> &Path {
        &self.log
    }

    pub fn covers(&self, ty: MessageType, artifact: &Path) -> bool {
        self.confirmed.iter().any(|(t, p)| *t == ty && p == artifact)
    }
}

/// All series of one flight, in memory.
#[derive(Debug)]
pub struct LoadedFlight {
    series: BTreeMap<MessageType, TimeSeries>,
    window: FlightWindow,
}

impl LoadedFlight {
    pub fn series(&self, ty: MessageType) -> Option<&TimeSeries> {
        self.series.get(&ty)
    }

    pub fn window(&self) -> FlightWindow {
        self.window
    }

    pub fn loaded_types(&self) -> impl Iterator<Item = MessageType> + '_ {
        self.series.keys().copied()
    }
}

/// Parses one decoded artifact. `Ok(None)` means the decoder left nothing
/// usable behind: no file, an empty file, or no timestamp column.
pub fn parse_artifact(ty: MessageType, path: &Path) -> io::Result<Option<TimeSeries>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(file);

    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(e) => {
            debug!("loader: {} has no readable header: {}", path.display(), e);
            return Ok(None);
        }
    };
    let Some(ts_idx) = headers.iter().position(|h| h == TIMESTAMP_COLUMN) else {
        return Ok(None);
    };
    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != ts_idx)
        .map(|(_, h)| h.to_string())
        .collect();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let Ok(record) = record else {
            skipped += 1;
            continue;
        };
        if record.len() != headers.len() {
            skipped += 1;
            continue;
        }
        let ts = match record.get(ts_idx).map(|c| c.trim().parse::<f64>()) {
            Some(Ok(ts)) if ts.is_finite() => ts,
            _ => {
                skipped += 1;
                continue;
            }
        };
        let values = record
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != ts_idx)
            .map(|(_, cell)| Value::parse(cell))
            .collect();
        rows.push(Row { ts, values });
    }

    if skipped > 0 {
        warn!("loader: {}: skipped {} malformed rows", ty, skipped);
    }
    Ok(Some(TimeSeries::new(ty, columns, rows)))
}

/// Reads every artifact of the batch. Hard-required series must be present
/// and non-empty; a missing soft series is only logged and left out.
pub fn load_flight(batch: &ExtractedBatch) -> Result<(LoadedFlight, LoadReceipt), LoadError> {
    let mut series = BTreeMap::new();
    let mut confirmed = Vec::with_capacity(batch.artifacts().len());

    for (ty, path) in batch.artifacts() {
        let (ty, path) = (*ty, path.as_path());
        let parsed = match parse_artifact(ty, path) {
            Ok(p) => p,
            Err(source) if ty.is_hard_required() => {
                return Err(LoadError::Unreadable { ty, path: path.to_path_buf(), source });
            }
            Err(e) => {
                warn!("loader: {} unreadable, treating as missing: {}", ty, e);
                None
            }
        };

        match parsed {
            Some(s) if s.is_empty() && ty.is_hard_required() => {
                return Err(LoadError::Empty { ty, path: path.to_path_buf() });
            }
            Some(s) => {
                debug!("loader: {} rows={}", ty, s.len());
                series.insert(ty, s);
            }
            None if ty.is_hard_required() => {
                return Err(LoadError::Missing { ty, path: path.to_path_buf() });
            }
            None => warn!("loader: {} series missing ({})", ty, path.display()),
        }
        confirmed.push((ty, path.to_path_buf()));
    }

    let window = series
        .get(&MessageType::EventMarker)
        .and_then(FlightWindow::from_series)
        .ok_or_else(|| LoadError::Missing {
            ty: MessageType::EventMarker,
            path: batch.log().to_path_buf(),
        })?;

    Ok((
        LoadedFlight { series, window },
        LoadReceipt { log: batch.log().to_path_buf(), confirmed },
    ))
}
