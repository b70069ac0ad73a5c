pub mod decoder;
pub mod discover;
pub mod doctor;
pub mod loader;
pub mod message;
pub mod orchestrator;
pub mod series;

pub use decoder::{CommandDecoder, DecoderConfig, LogDecoder};
pub use loader::{load_flight, LoadError, LoadReceipt, LoadedFlight};
pub use message::MessageType;
pub use orchestrator::{ExtractedBatch, Orchestrator};
pub use series::{FlightWindow, Row, TimeSeries, Value};

/// Fixture helpers shared by the workspace's tests.
#[cfg(any(test, feature = "testutil"))]
pub mod testutil {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    static NEXT: AtomicU32 = AtomicU32::new(0);

    /// Fresh scratch directory under the system temp dir.
    pub fn scratch_dir(tag: &str) -> PathBuf {
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("daycheck-{}-{}-{}", tag, std::process::id(), n));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
