//! Diagnostics: `env_logger` setup and a bounded in-memory log
//!
//! The `DiagnosticLog` keeps the last few bridge events (library search attempts,
//! degraded round trips) so a host can show them without a log subscriber.
//! Every entry is also forwarded to the `log` facade.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::SystemTime;

use log::Level;
use serde::Serialize;

/// Default number of entries kept before the oldest is evicted
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Install `env_logger`, honouring `RUST_LOG` and falling back to `info`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticEntry {
    pub level: String,
    pub message: String,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u128,
}

/// Ring buffer of diagnostic messages shared by the resolver and the service
#[derive(Debug)]
pub struct DiagnosticLog {
    entries: Mutex<VecDeque<DiagnosticEntry>>,
    capacity: usize,
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<DiagnosticEntry>> {
        match self.entries.lock() {
            Ok(lock) => lock,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn record(&self, level: Level, message: impl Into<String>) {
        let message = message.into();
        log::log!(target: "geobridge::diagnostics", level, "{}", message);

        let timestamp_ms = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(DiagnosticEntry {
            level: level.to_string(),
            message,
            timestamp_ms,
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(Level::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(Level::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(Level::Error, message);
    }

    /// Snapshot, oldest first
    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.message.clone()).collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
