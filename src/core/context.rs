//! Per-run logging and progress handle.
//!
//! Every job gets its own [`JobContext`]. Messages are recorded in the job's
//! [`JobLog`] and emitted as `tracing` events inside the job span, so two
//! jobs running in the same process never share log state.
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{Level, Span};

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub level: Level,
    pub timestamp: String,
    pub message: String,
    pub target: String,
}

impl LogEntry {
    pub fn new(level: Level, message: String, target: String) -> Self {
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        Self {
            level,
            timestamp,
            message,
            target,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:>5} {}: {}",
            self.timestamp, self.level, self.target, self.message
        )
    }
}

/// In-memory log of one job run
#[derive(Clone, Default)]
pub struct JobLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl JobLog {
    pub fn push(&self, entry: LogEntry) {
        if let Ok(mut buf) = self.entries.lock() {
            buf.push(entry);
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Entries at or above `level` in severity
    pub fn entries_at(&self, level: Level) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level <= level)
            .collect()
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let body: String = self
            .entries()
            .iter()
            .map(|e| format!("{}\n", e))
            .collect();
        fs::write(path, body)
    }
}

/// Receiver of job progress updates
pub trait StatusSink: Send + Sync {
    fn update(&self, message: &str, percent: u8);
}

/// Status sink that drops updates; progress still lands in the job log
pub struct NoStatus;

impl StatusSink for NoStatus {
    fn update(&self, _message: &str, _percent: u8) {}
}

/// Status sink that remembers every update, mostly for tests
#[derive(Default)]
pub struct RecordingStatus {
    updates: Mutex<Vec<(String, u8)>>,
}

impl RecordingStatus {
    pub fn updates(&self) -> Vec<(String, u8)> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl StatusSink for RecordingStatus {
    fn update(&self, message: &str, percent: u8) {
        if let Ok(mut u) = self.updates.lock() {
            u.push((message.to_string(), percent));
        }
    }
}

/// Logging, progress and scratch space for one job run
#[derive(Clone)]
pub struct JobContext {
    pub process: &'static str,
    pub run_id: String,
    span: Span,
    log: JobLog,
    status: Arc<dyn StatusSink>,
    workdir: PathBuf,
}

static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

impl JobContext {
    /// New run of `process`; its scratch space is `<base>/<run_id>`
    pub fn new(process: &'static str, base: &Path) -> Self {
        let run_id = format!(
            "{}-{}-{}-{}",
            process,
            chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f"),
            std::process::id(),
            RUN_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        let workdir = base.join(&run_id);
        let span = tracing::info_span!("job", process, run_id = %run_id);
        Self {
            process,
            run_id,
            span,
            log: JobLog::default(),
            status: Arc::new(NoStatus),
            workdir,
        }
    }

    pub fn with_status(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn log(&self) -> &JobLog {
        &self.log
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn status(&self, message: &str, percent: u8) {
        self.info(format!("{}% {}", percent, message));
        self.status.update(message, percent);
    }

    fn record(&self, level: Level, message: String) {
        let _enter = self.span.enter();
        match level {
            Level::ERROR => tracing::error!("{}", message),
            Level::WARN => tracing::warn!("{}", message),
            Level::INFO => tracing::info!("{}", message),
            Level::DEBUG => tracing::debug!("{}", message),
            Level::TRACE => tracing::trace!("{}", message),
        }
        self.log
            .push(LogEntry::new(level, message, self.process.to_string()));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(Level::INFO, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(Level::WARN, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(Level::ERROR, message.into());
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.record(Level::DEBUG, message.into());
    }

    /// Write the log to `<workdir>/log.txt` and return its path
    pub fn write_log(&self) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.workdir)?;
        let path = self.workdir.join("log.txt");
        self.log.write_to(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_keep_separate_logs() {
        let tmp = tempfile::tempdir().unwrap();
        let a = JobContext::new("EO_ndvi", tmp.path());
        let b = JobContext::new("EO_COPERNICUS_rgb", tmp.path());
        a.info("fetching");
        a.warn("one bundle skipped");
        b.info("rendering");
        assert_eq!(a.log().entries().len(), 2);
        assert_eq!(b.log().entries().len(), 1);
        assert_eq!(a.log().entries_at(Level::WARN).len(), 1);
    }

    #[test]
    fn status_updates_are_forwarded_and_logged() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingStatus::default());
        let ctx = JobContext::new("EO_ndvi", tmp.path()).with_status(sink.clone());
        ctx.status("start fetch data", 10);
        ctx.status("done", 100);
        assert_eq!(
            sink.updates(),
            vec![("start fetch data".to_string(), 10), ("done".to_string(), 100)]
        );
        let log = ctx.write_log().unwrap();
        let body = fs::read_to_string(log).unwrap();
        assert!(body.contains("10% start fetch data"));
        assert_eq!(body.lines().count(), 2);
    }

    #[test]
    fn runs_on_one_base_get_their_own_workdir() {
        let tmp = tempfile::tempdir().unwrap();
        let a = JobContext::new("EO_ndvi", tmp.path());
        let b = JobContext::new("EO_ndvi", tmp.path());
        assert_ne!(a.run_id, b.run_id);
        assert_ne!(a.workdir(), b.workdir());
        assert_eq!(a.workdir().parent(), Some(tmp.path()));
        assert!(a.workdir().ends_with(&a.run_id));

        a.info("first");
        b.info("second");
        let (la, lb) = (a.write_log().unwrap(), b.write_log().unwrap());
        assert_ne!(la, lb);
        assert!(fs::read_to_string(la).unwrap().contains("first"));
        assert!(fs::read_to_string(lb).unwrap().contains("second"));
    }
}
