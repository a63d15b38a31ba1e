//! Fire-and-forget background persistence.
//!
//! The service owns one worker thread fed by a crossbeam channel.
//! Callers submit owned documents and return immediately; the worker
//! writes them with [`write_json_atomic`], retrying failed writes with
//! exponential backoff before logging and dropping them. Shutdown
//! drains every queued write before the worker exits.

use crate::config::PersistConfig;
use crate::error::PersistError;
use crate::session::SessionLog;
use crate::store::{load_json, load_or_discard, write_json_atomic};
use brood_policy::PolicyDocument;
use crossbeam_channel::{Receiver, Sender};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

enum Payload {
    Policy(Box<PolicyDocument>),
    Session(Box<SessionLog>),
}

impl Payload {
    fn write(&self, path: &Path) -> Result<(), PersistError> {
        match self {
            Payload::Policy(doc) => write_json_atomic(path, doc.as_ref()),
            Payload::Session(log) => write_json_atomic(path, log.as_ref()),
        }
    }
}

enum Command {
    Save { path: PathBuf, payload: Payload },
    Flush(Sender<()>),
    Shutdown,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    written: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time persistence counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PersistStats {
    /// Writes submitted.
    pub submitted: u64,
    /// Writes that eventually succeeded.
    pub written: u64,
    /// Retry attempts made.
    pub retried: u64,
    /// Writes abandoned after exhausting retries.
    pub dropped: u64,
}

/// Background writer for policy documents and session logs.
///
/// Dropping the service drains queued writes and joins the worker.
///
/// # Examples
///
/// ```
/// use brood_persist::{PersistConfig, PersistenceService, SessionLog};
///
/// let dir = tempfile::tempdir().unwrap();
/// let service = PersistenceService::spawn(PersistConfig::in_dir(dir.path())).unwrap();
/// service.save_session(SessionLog::default());
/// service.flush();
/// assert_eq!(service.stats().written, 1);
/// assert!(service.load_session().is_some());
/// ```
pub struct PersistenceService {
    config: PersistConfig,
    tx: Sender<Command>,
    counters: Arc<Counters>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PersistenceService {
    /// Start the worker thread.
    ///
    /// # Errors
    ///
    /// [`PersistError::Worker`] if the thread cannot be spawned.
    pub fn spawn(config: PersistConfig) -> Result<Self, PersistError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let counters = Arc::new(Counters::default());
        let worker_counters = Arc::clone(&counters);
        let worker_config = config.clone();
        let handle = thread::Builder::new()
            .name("brood-persist".into())
            .spawn(move || worker_loop(rx, worker_config, worker_counters))
            .map_err(|e| PersistError::Worker(format!("failed to spawn worker thread: {e}")))?;
        Ok(Self {
            config,
            tx,
            counters,
            handle: Some(handle),
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    /// Queue a policy document for writing. Never blocks.
    pub fn save_policy(&self, doc: PolicyDocument) {
        self.submit(self.config.policy_path(), Payload::Policy(Box::new(doc)));
    }

    /// Queue a session log for writing. Never blocks.
    pub fn save_session(&self, log: SessionLog) {
        self.submit(self.config.session_path(), Payload::Session(Box::new(log)));
    }

    fn submit(&self, path: PathBuf, payload: Payload) {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        if self.tx.send(Command::Save { path, payload }).is_err() {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("persistence worker gone, save dropped");
        }
    }

    /// Block until every write queued so far has finished or been dropped.
    pub fn flush(&self) {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(Command::Flush(reply_tx)).is_ok() {
            let _ = reply_rx.recv();
        }
    }

    /// Current counters.
    pub fn stats(&self) -> PersistStats {
        PersistStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            written: self.counters.written.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Load the saved policy document, if any.
    ///
    /// A missing file is a cold start; an unreadable one is logged and
    /// also treated as a cold start.
    pub fn load_policy(&self) -> Option<PolicyDocument> {
        load_or_discard(&self.config.policy_path())
    }

    /// Load the saved session log, if any, re-applying the configured
    /// compaction limits.
    pub fn load_session(&self) -> Option<SessionLog> {
        let path = self.config.session_path();
        let mut log: SessionLog = match load_json(&path) {
            Ok(log) => log?,
            Err(error) => {
                warn!(path = %path.display(), %error, "discarding unreadable session log");
                return None;
            }
        };
        log.set_limits(self.config.session_raw_cap, self.config.session_bucket_size);
        Some(log)
    }

    /// Drain queued writes and stop the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.tx.send(Command::Shutdown);
            if handle.join().is_err() {
                warn!("persistence worker panicked");
            }
        }
    }
}

impl Drop for PersistenceService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(rx: Receiver<Command>, config: PersistConfig, counters: Arc<Counters>) {
    while let Ok(command) = rx.recv() {
        match command {
            Command::Save { path, payload } => write_with_retry(&path, &payload, &config, &counters),
            Command::Flush(reply) => {
                let _ = reply.send(());
            }
            Command::Shutdown => break,
        }
    }
    // Commands queued behind Shutdown are still honored.
    for command in rx.try_iter() {
        match command {
            Command::Save { path, payload } => write_with_retry(&path, &payload, &config, &counters),
            Command::Flush(reply) => {
                let _ = reply.send(());
            }
            Command::Shutdown => {}
        }
    }
    info!(written = counters.written.load(Ordering::Relaxed), "persistence worker stopped");
}

fn write_with_retry(path: &Path, payload: &Payload, config: &PersistConfig, counters: &Counters) {
    let mut attempt = 0u32;
    loop {
        match payload.write(path) {
            Ok(()) => {
                counters.written.fetch_add(1, Ordering::Relaxed);
                debug!(path = %path.display(), "saved");
                return;
            }
            Err(error) if attempt < config.retries => {
                attempt += 1;
                counters.retried.fetch_add(1, Ordering::Relaxed);
                debug!(path = %path.display(), %error, attempt, "save failed, retrying");
                thread::sleep(config.backoff(attempt));
            }
            Err(error) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(path = %path.display(), %error, "save failed, giving up");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brood_obs::StateKey;
    use brood_policy::{PolicyBody, DOCUMENT_VERSION};
    use indexmap::IndexMap;

    fn doc(epsilon: f64) -> PolicyDocument {
        let mut table = IndexMap::new();
        table.insert(StateKey(3), vec![1.0, 2.0, 3.0]);
        PolicyDocument {
            version: DOCUMENT_VERSION,
            fingerprint: 9,
            action_count: 3,
            epsilon,
            episodes: 4,
            body: PolicyBody::Tabular { table },
        }
    }

    #[test]
    fn saves_and_loads_policy() {
        let dir = tempfile::tempdir().unwrap();
        let service = PersistenceService::spawn(PersistConfig::in_dir(dir.path())).unwrap();
        assert!(service.load_policy().is_none());
        service.save_policy(doc(0.25));
        service.flush();
        assert_eq!(service.load_policy(), Some(doc(0.25)));
    }

    #[test]
    fn last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let service = PersistenceService::spawn(PersistConfig::in_dir(dir.path())).unwrap();
        for i in 0..5 {
            service.save_policy(doc(i as f64 / 10.0));
        }
        service.flush();
        assert_eq!(service.load_policy().map(|d| d.epsilon), Some(0.4));
        assert_eq!(service.stats().written, 5);
    }

    #[test]
    fn shutdown_drains_queue() {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistConfig::in_dir(dir.path());
        let path = config.policy_path();
        let service = PersistenceService::spawn(config).unwrap();
        service.save_policy(doc(0.5));
        service.shutdown();
        assert!(path.exists());
    }

    #[test]
    fn failing_write_retries_then_drops() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let config = PersistConfig {
            retries: 2,
            backoff_ms: 1,
            ..PersistConfig::in_dir(&blocker)
        };
        let service = PersistenceService::spawn(config).unwrap();
        service.save_policy(doc(0.1));
        service.flush();
        let stats = service.stats();
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.written, 0);
    }

    #[test]
    fn corrupt_policy_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistConfig::in_dir(dir.path());
        std::fs::write(config.policy_path(), b"[1, 2").unwrap();
        let service = PersistenceService::spawn(config).unwrap();
        assert!(service.load_policy().is_none());
    }
}
