//! Persistence configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where and how learned state is saved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Directory holding every persisted file.
    pub dir: PathBuf,
    /// File name of the policy document.
    pub policy_file: String,
    /// File name of the session log.
    pub session_file: String,
    /// Extra attempts after a failed write.
    pub retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub backoff_ms: u64,
    /// Raw episodes kept before the oldest are compacted.
    pub session_raw_cap: usize,
    /// Episodes merged into one bucket per compaction.
    pub session_bucket_size: usize,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("brood-data"),
            policy_file: "policy.json".into(),
            session_file: "session.json".into(),
            retries: 3,
            backoff_ms: 50,
            session_raw_cap: 500,
            session_bucket_size: 100,
        }
    }
}

impl PersistConfig {
    /// A configuration rooted at `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Full path of the policy document.
    pub fn policy_path(&self) -> PathBuf {
        self.dir.join(&self.policy_file)
    }

    /// Full path of the session log.
    pub fn session_path(&self) -> PathBuf {
        self.dir.join(&self.session_file)
    }

    /// Backoff before retry `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}
