//! Time-compacting log of completed episodes.

use brood_core::TickId;
use serde::{Deserialize, Serialize};

/// One completed episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// Tick the agent was born.
    pub start: TickId,
    /// Tick the agent died.
    pub end: TickId,
    /// Final score.
    pub score: u64,
    /// Final body length.
    pub length: usize,
}

impl EpisodeRecord {
    /// Lifetime in ticks.
    pub fn duration(&self) -> u64 {
        self.end.since(self.start)
    }
}

/// Order statistics over one quantity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Arithmetic mean.
    pub mean: f64,
    /// Median (mean of the middle two for even counts).
    pub median: f64,
    /// Minimum.
    pub min: f64,
    /// Maximum.
    pub max: f64,
}

impl Summary {
    /// Summarize `values`. Empty input yields all zeros.
    pub fn of(values: &mut [f64]) -> Summary {
        if values.is_empty() {
            return Summary::default();
        }
        values.sort_by(f64::total_cmp);
        let n = values.len();
        let median = if n % 2 == 1 {
            values[n / 2]
        } else {
            (values[n / 2 - 1] + values[n / 2]) / 2.0
        };
        Summary {
            mean: values.iter().sum::<f64>() / n as f64,
            median,
            min: values[0],
            max: values[n - 1],
        }
    }
}

/// Aggregate of a run of compacted episodes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeBucket {
    /// Episodes merged into this bucket.
    pub count: u64,
    /// Earliest start tick in the bucket.
    pub first: TickId,
    /// Latest end tick in the bucket.
    pub last: TickId,
    /// Score statistics.
    pub score: Summary,
    /// Duration statistics, in ticks.
    pub duration: Summary,
}

/// Append-only episode log that compacts its oldest entries.
///
/// Once more than `raw_cap` raw records accumulate, the oldest are
/// merged into an [`EpisodeBucket`]. Bucket counts plus raw records
/// always equal [`recorded()`](SessionLog::recorded).
///
/// # Examples
///
/// ```
/// use brood_core::TickId;
/// use brood_persist::{EpisodeRecord, SessionLog};
///
/// let mut log = SessionLog::new(4, 2);
/// for i in 0..5u64 {
///     log.record(EpisodeRecord { start: TickId(i), end: TickId(i + 10), score: i, length: 1 });
/// }
/// assert_eq!(log.recorded(), 5);
/// assert!(log.raw().len() <= 4);
/// assert_eq!(log.all_time_high(), 4);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionLog {
    raw: Vec<EpisodeRecord>,
    buckets: Vec<EpisodeBucket>,
    all_time_high: u64,
    recorded: u64,
    #[serde(default = "default_raw_cap")]
    raw_cap: usize,
    #[serde(default = "default_bucket_size")]
    bucket_size: usize,
}

fn default_raw_cap() -> usize {
    500
}

fn default_bucket_size() -> usize {
    100
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new(default_raw_cap(), default_bucket_size())
    }
}

impl SessionLog {
    /// An empty log keeping at most `raw_cap` raw records and merging
    /// `bucket_size` records per compaction.
    pub fn new(raw_cap: usize, bucket_size: usize) -> Self {
        Self {
            raw: Vec::new(),
            buckets: Vec::new(),
            all_time_high: 0,
            recorded: 0,
            raw_cap: raw_cap.max(1),
            bucket_size: bucket_size.max(1),
        }
    }

    /// Replace the compaction limits, e.g. after loading a log written
    /// under a different configuration. Compacts immediately if needed.
    pub fn set_limits(&mut self, raw_cap: usize, bucket_size: usize) {
        self.raw_cap = raw_cap.max(1);
        self.bucket_size = bucket_size.max(1);
        self.compact();
    }

    /// Append a completed episode.
    pub fn record(&mut self, record: EpisodeRecord) {
        self.all_time_high = self.all_time_high.max(record.score);
        self.recorded += 1;
        self.raw.push(record);
        self.compact();
    }

    fn compact(&mut self) {
        while self.raw.len() > self.raw_cap {
            let overflow = self.raw.len() - self.raw_cap;
            let take = overflow.max(self.bucket_size).min(self.raw.len());
            let merged: Vec<EpisodeRecord> = self.raw.drain(..take).collect();
            self.buckets.push(bucket_of(&merged));
        }
    }

    /// Raw records, oldest first.
    pub fn raw(&self) -> &[EpisodeRecord] {
        &self.raw
    }

    /// Compacted buckets, oldest first.
    pub fn buckets(&self) -> &[EpisodeBucket] {
        &self.buckets
    }

    /// Highest score ever recorded.
    pub fn all_time_high(&self) -> u64 {
        self.all_time_high
    }

    /// Total episodes ever recorded.
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Mean score over every recorded episode.
    pub fn mean_score(&self) -> f64 {
        if self.recorded == 0 {
            return 0.0;
        }
        let bucketed: f64 = self
            .buckets
            .iter()
            .map(|b| b.score.mean * b.count as f64)
            .sum();
        let raw: f64 = self.raw.iter().map(|r| r.score as f64).sum();
        (bucketed + raw) / self.recorded as f64
    }
}

fn bucket_of(records: &[EpisodeRecord]) -> EpisodeBucket {
    let mut scores: Vec<f64> = records.iter().map(|r| r.score as f64).collect();
    let mut durations: Vec<f64> = records.iter().map(|r| r.duration() as f64).collect();
    EpisodeBucket {
        count: records.len() as u64,
        first: records.iter().map(|r| r.start).min().unwrap_or_default(),
        last: records.iter().map(|r| r.end).max().unwrap_or_default(),
        score: Summary::of(&mut scores),
        duration: Summary::of(&mut durations),
    }
}
