use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::decoder::{remove_artifact, LogDecoder};
use crate::loader::LoadReceipt;
use crate::message::MessageType;

/// Artifacts requested for one log. Holding a batch does not mean the
/// artifacts exist: a failed decode leaves its slot absent or empty.
#[derive(Debug)]
pub struct ExtractedBatch {
    log: PathBuf,
    artifacts: Vec<(MessageType, PathBuf)>,
}

impl ExtractedBatch {
    pub fn new(log: PathBuf, artifacts: Vec<(MessageType, PathBuf)>) -> Self {
        Self { log, artifacts }
    }

    pub fn log(&self) -> &Path {
        &self.log
    }

    pub fn artifacts(&self) -> &[(MessageType, PathBuf)] {
        &self.artifacts
    }
}

/// Drives the external decoder over a bounded pool.
///
/// The lifecycle of a batch is fixed: [`extract`](Self::extract) returns
/// only after every decode job has finished, and [`cleanup`](Self::cleanup)
/// consumes the batch together with the [`LoadReceipt`] the loader issued
/// for it, so artifacts cannot be removed before they are in memory.
pub struct Orchestrator<D> {
    decoder: Arc<D>,
    workers: usize,
    artifact_dir: Option<PathBuf>,
}

impl<D: LogDecoder> Orchestrator<D> {
    pub fn new(decoder: D, workers: usize) -> Self {
        Self {
            decoder: Arc::new(decoder),
            workers: workers.max(1),
            artifact_dir: None,
        }
    }

    pub fn with_artifact_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.artifact_dir = dir;
        self
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Artifacts sit next to the log, or under `artifact_dir` in a subfolder
    /// mirroring the log's folder so logs sharing a file name never collide.
    pub fn artifact_path(&self, log: &Path, ty: MessageType) -> PathBuf {
        let stem = log.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        let name = format!("{}_{}.csv", stem, ty.code());
        let parent = log.parent().unwrap_or(Path::new(""));
        match &self.artifact_dir {
            Some(dir) => {
                let mut out = dir.clone();
                out.extend(parent.components().filter_map(|c| match c {
                    Component::Normal(part) => Some(part),
                    _ => None,
                }));
                out.join(name)
            }
            None => parent.join(name),
        }
    }

    /// Decodes every message type concurrently and waits for all of them.
    /// Individual decode failures are logged, never propagated. Leftover
    /// artifacts from an earlier run are removed first, so a decode that
    /// writes nothing yields a missing series.
    pub async fn extract(&self, log: &Path) -> Result<ExtractedBatch> {
        let artifacts: Vec<(MessageType, PathBuf)> =
            MessageType::ALL.iter().map(|ty| (*ty, self.artifact_path(log, *ty))).collect();

        if self.artifact_dir.is_some() {
            if let Some(dir) = artifacts.first().and_then(|(_, p)| p.parent()) {
                tokio::fs::create_dir_all(dir)
                    .await
                    .with_context(|| format!("create artifact dir {}", dir.display()))?;
            }
        }

        let jobs = artifacts.iter().map(|(ty, artifact)| {
            let ty = *ty;
            let decoder = self.decoder.clone();
            let log = log.to_path_buf();
            let artifact = artifact.clone();
            (ty, move || {
                remove_artifact(&artifact)?;
                decoder.decode(&log, ty, &artifact)
            })
        });
        let failed = run_pool(self.workers, jobs).await;

        if failed.is_empty() {
            info!("extract: {} decoded ({} types)", log.display(), artifacts.len());
        } else {
            warn!("extract: {} decoded with {} failures: {:?}", log.display(), failed.len(), failed);
        }
        Ok(ExtractedBatch { log: log.to_path_buf(), artifacts })
    }

    /// Deletes the batch's artifacts. Refuses unless `receipt` confirms every
    /// one of them was loaded.
    pub async fn cleanup(&self, batch: ExtractedBatch, receipt: LoadReceipt) -> Result<usize> {
        anyhow::ensure!(
            receipt.log() == batch.log(),
            "load receipt for {} does not match batch {}",
            receipt.log().display(),
            batch.log().display()
        );
        if let Some((ty, path)) = batch.artifacts.iter().find(|(ty, p)| !receipt.covers(*ty, p)) {
            anyhow::bail!("refusing cleanup: {} artifact {} not confirmed loaded", ty, path.display());
        }

        let total = batch.artifacts.len();
        let jobs = batch.artifacts.into_iter().map(|(ty, artifact)| {
            let decoder = self.decoder.clone();
            (ty, move || decoder.discard(&artifact))
        });
        let failed = run_pool(self.workers, jobs).await;
        for ty in &failed {
            warn!("cleanup: could not remove {} artifact", ty);
        }
        debug!("cleanup: removed {}/{}", total - failed.len(), total);
        Ok(total - failed.len())
    }
}

/// Runs blocking jobs with at most `workers` in flight and joins them all.
/// Returns the message types whose job failed.
async fn run_pool<F, I>(workers: usize, jobs: I) -> Vec<MessageType>
where
    F: FnOnce() -> Result<()> + Send + 'static,
    I: IntoIterator<Item = (MessageType, F)>,
{
    let permits = Arc::new(Semaphore::new(workers));
    let mut set = JoinSet::new();

    for (ty, job) in jobs {
        let permits = permits.clone();
        set.spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(p) => p,
                Err(e) => return (ty, Err(anyhow::Error::new(e))),
            };
            let res = match tokio::task::spawn_blocking(job).await {
                Ok(r) => r,
                Err(e) => Err(anyhow::Error::new(e)),
            };
            (ty, res)
        });
    }

    let mut failed = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((ty, Err(e))) => {
                warn!("pool: {} job failed: {:#}", ty, e);
                failed.push(ty);
            }
            Err(e) => warn!("pool: job panicked: {}", e),
        }
    }
    failed.sort();
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_flight;
    use crate::testutil::scratch_dir;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Decoded(MessageType),
        Loaded,
        Discarded(MessageType),
    }

    /// Writes a small CSV per type after a type-dependent delay, so decode
    /// completions arrive out of request order.
    struct FakeDecoder {
        events: Arc<Mutex<Vec<Event>>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        fail: Option<MessageType>,
    }

    impl FakeDecoder {
        fn new(events: Arc<Mutex<Vec<Event>>>) -> Self {
            Self { events, in_flight: AtomicUsize::new(0), peak: AtomicUsize::new(0), fail: None }
        }
    }

    impl LogDecoder for FakeDecoder {
        fn decode(&self, _log: &Path, ty: MessageType, artifact: &Path) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let idx = MessageType::ALL.iter().position(|t| *t == ty).unwrap_or(0);
            std::thread::sleep(Duration::from_millis(5 * (MessageType::ALL.len() - idx) as u64));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            anyhow::ensure!(self.fail != Some(ty), "simulated decoder crash");
            let body = match ty {
                MessageType::StatusText => "timestamp,Message\n100,CubeOrange 0030002D\n".to_string(),
                _ => "timestamp,Value\n100,1\n101,2\n".to_string(),
            };
            std::fs::write(artifact, body)?;
            self.events.lock().unwrap().push(Event::Decoded(ty));
            Ok(())
        }

        fn discard(&self, artifact: &Path) -> Result<()> {
            std::fs::remove_file(artifact)?;
            let name = artifact.file_stem().unwrap().to_string_lossy().to_string();
            let code = name.rsplit('_').next().unwrap().to_string();
            let ty = MessageType::from_code(&code).unwrap();
            self.events.lock().unwrap().push(Event::Discarded(ty));
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn extract_load_delete_ordering() {
        let dir = scratch_dir("orch-order");
        let events = Arc::new(Mutex::new(Vec::new()));
        let orch = Orchestrator::new(FakeDecoder::new(events.clone()), 3);
        let log = dir.join("flight.BIN");

        let batch = orch.extract(&log).await.unwrap();
        // join barrier: every artifact is on disk before extract returns
        for (_, p) in batch.artifacts() {
            assert!(p.exists(), "{} missing after extract", p.display());
        }
        let (_flight, receipt) = load_flight(&batch).unwrap();
        events.lock().unwrap().push(Event::Loaded);

        let removed = orch.cleanup(batch, receipt).await.unwrap();
        assert_eq!(removed, MessageType::ALL.len());

        let events = events.lock().unwrap();
        let loaded_at = events.iter().position(|e| *e == Event::Loaded).unwrap();
        assert!(events[..loaded_at].iter().all(|e| matches!(e, Event::Decoded(_))));
        assert_eq!(events[loaded_at + 1..].len(), MessageType::ALL.len());
        assert!(events[loaded_at + 1..].iter().all(|e| matches!(e, Event::Discarded(_))));

        let peak = orch.decoder().peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "pool exceeded its bound: {}", peak);
    }

    #[tokio::test]
    async fn one_failed_decode_does_not_block_siblings() {
        let dir = scratch_dir("orch-fail");
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut dec = FakeDecoder::new(events.clone());
        dec.fail = Some(MessageType::PowerRail);
        let orch = Orchestrator::new(dec, 2);

        let batch = orch.extract(&dir.join("flight.BIN")).await.unwrap();
        let decoded = events.lock().unwrap().len();
        assert_eq!(decoded, MessageType::ALL.len() - 1);

        let (flight, _) = load_flight(&batch).unwrap();
        assert!(flight.series(MessageType::PowerRail).is_none());
        assert!(flight.series(MessageType::Vibration).is_some());
    }

    #[tokio::test]
    async fn failed_load_leaves_artifacts_in_place() {
        let dir = scratch_dir("orch-keep");
        let mut dec = FakeDecoder::new(Arc::default());
        dec.fail = Some(MessageType::EventMarker);
        let orch = Orchestrator::new(dec, 4).with_artifact_dir(Some(dir.join("artifacts")));

        let batch = orch.extract(&dir.join("a.BIN")).await.unwrap();
        assert!(batch.artifacts()[0].1.starts_with(dir.join("artifacts")));
        assert!(load_flight(&batch).is_err());
        // no receipt, so no cleanup: the decoded artifacts stay for inspection
        let kept = batch.artifacts().iter().filter(|(_, p)| p.exists()).count();
        assert_eq!(kept, MessageType::ALL.len() - 1);
    }

    #[tokio::test]
    async fn receipt_from_another_flight_is_refused() {
        let dir = scratch_dir("orch-refuse");
        let events = Arc::new(Mutex::new(Vec::new()));
        let orch = Orchestrator::new(FakeDecoder::new(events.clone()), 4);

        let a = orch.extract(&dir.join("a.BIN")).await.unwrap();
        let b = orch.extract(&dir.join("b.BIN")).await.unwrap();
        let (_, receipt_b) = load_flight(&b).unwrap();

        assert!(orch.cleanup(a, receipt_b).await.is_err());
        assert!(!events.lock().unwrap().iter().any(|e| matches!(e, Event::Discarded(_))));
        assert!(dir.join("a_EV.csv").exists());
    }

    #[test]
    fn artifact_names_follow_log_stem() {
        let orch = Orchestrator::new(FakeDecoder::new(Arc::default()), 1);
        let p = orch.artifact_path(Path::new("/data/day1/00000042.BIN"), MessageType::Vibration);
        assert_eq!(p, PathBuf::from("/data/day1/00000042_VIBE.csv"));

        let orch = orch.with_artifact_dir(Some(PathBuf::from("/tmp/art")));
        let p = orch.artifact_path(Path::new("/data/day1/00000042.BIN"), MessageType::Vibration);
        assert_eq!(p, PathBuf::from("/tmp/art/data/day1/00000042_VIBE.csv"));
    }

    /// day1 only ever gets VIBE, day2 gets just the hard-required pair.
    struct PerDayDecoder;

    impl LogDecoder for PerDayDecoder {
        fn decode(&self, log: &Path, ty: MessageType, artifact: &Path) -> Result<()> {
            let day1 = log.components().any(|c| c.as_os_str() == "day1");
            let body = match (day1, ty) {
                (true, MessageType::Vibration) => "timestamp,VibeX\n100,99\n",
                (false, MessageType::EventMarker) => "timestamp,Id\n200,10\n260,11\n",
                (false, MessageType::StatusText) => "timestamp,Message\n200,CubeOrange 0030002D\n",
                _ => return Ok(()),
            };
            std::fs::write(artifact, body)?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn same_named_logs_do_not_share_artifacts() {
        let dir = scratch_dir("orch-same-stem");
        let orch = Orchestrator::new(PerDayDecoder, 2).with_artifact_dir(Some(dir.join("artifacts")));
        let day1 = dir.join("day1/00000001.BIN");
        let day2 = dir.join("day2/00000001.BIN");

        let b1 = orch.extract(&day1).await.unwrap();
        assert!(load_flight(&b1).is_err());
        let day1_vibe = orch.artifact_path(&day1, MessageType::Vibration);
        assert!(day1_vibe.exists());

        // leftover from an earlier run of the same log
        let stale = orch.artifact_path(&day2, MessageType::Vibration);
        assert_ne!(stale, day1_vibe);
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "timestamp,VibeX\n1,55\n").unwrap();

        let b2 = orch.extract(&day2).await.unwrap();
        let (flight, _) = load_flight(&b2).unwrap();
        assert!(flight.series(MessageType::Vibration).is_none());
        assert!(day1_vibe.exists(), "day1 artifacts must stay for inspection");
    }
}
