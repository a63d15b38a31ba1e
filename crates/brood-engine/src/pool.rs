//! Decision worker pool.
//!
//! Decisions are pure reads of the start-of-tick snapshot, so they can
//! be computed on any thread. Each tick the coordinator splits the
//! living agents into one batch per worker, sends the batches over a
//! crossbeam channel, and blocks until every batch has replied. All
//! mutation happens afterwards, on the coordinator.
//!
//! Every decision draws from its own RNG seeded by
//! `(seed, tick, spawn sequence)`, so the pool and the inline path
//! produce identical decisions regardless of batching.

use std::sync::Arc;
use std::thread;

use brood_core::{AgentHandle, SimError, SpawnSeq, TickId};
use brood_obs::{AgentView, EncodedState, PerceptionEncoder};
use brood_policy::SharedPolicy;
use brood_space::GridWorld;
use crossbeam_channel::{Receiver, Sender};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::agent::read_policy;
use crate::config::ConfigError;

/// One agent's decision request.
#[derive(Clone, Debug)]
pub struct DecisionTask {
    /// The deciding agent.
    pub handle: AgentHandle,
    /// Its spawn order, which seeds its RNG.
    pub seq: SpawnSeq,
    /// What it perceives of itself.
    pub view: AgentView,
    /// The policy it acts through.
    pub policy: SharedPolicy,
}

/// One agent's encoded state and chosen action.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    /// The deciding agent.
    pub handle: AgentHandle,
    /// Its perception at the start of the tick.
    pub state: EncodedState,
    /// Chosen action index.
    pub action: usize,
}

/// Read-only inputs shared by every decision in a tick.
#[derive(Debug)]
pub struct DecisionContext {
    /// Start-of-tick world.
    pub world: GridWorld,
    /// The run's encoder.
    pub encoder: PerceptionEncoder,
    /// Master seed.
    pub seed: u64,
    /// The tick being decided.
    pub tick: TickId,
}

/// SplitMix64 finalizer.
pub(crate) fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Seed of the RNG for one decision.
pub fn decision_seed(seed: u64, tick: TickId, seq: SpawnSeq) -> u64 {
    mix(seed ^ mix(tick.0 ^ mix(seq.0)))
}

/// Encode and choose, exactly as a worker would.
pub fn decide(
    task: &DecisionTask,
    world: &GridWorld,
    encoder: &PerceptionEncoder,
    seed: u64,
    tick: TickId,
) -> Decision {
    let state = encoder.encode(&task.view, world);
    let mut rng = ChaCha8Rng::seed_from_u64(decision_seed(seed, tick, task.seq));
    let action = read_policy(&task.policy).select_action(&state, &mut rng);
    Decision {
        handle: task.handle,
        state,
        action,
    }
}

/// Decide every task on the calling thread.
pub fn decide_inline(
    tasks: &[DecisionTask],
    world: &GridWorld,
    encoder: &PerceptionEncoder,
    seed: u64,
    tick: TickId,
) -> Vec<Decision> {
    tasks
        .iter()
        .map(|t| decide(t, world, encoder, seed, tick))
        .collect()
}

type Indexed = Vec<(usize, Decision)>;

struct Batch {
    ctx: Arc<DecisionContext>,
    tasks: Vec<(usize, DecisionTask)>,
    reply: Sender<Indexed>,
}

fn worker_loop(rx: Receiver<Batch>) {
    while let Ok(batch) = rx.recv() {
        let ctx = &batch.ctx;
        let decided: Indexed = batch
            .tasks
            .iter()
            .map(|(i, task)| (*i, decide(task, &ctx.world, &ctx.encoder, ctx.seed, ctx.tick)))
            .collect();
        let _ = batch.reply.send(decided);
    }
}

/// A fixed set of decision worker threads.
///
/// Dropping the pool closes the task channel and joins the workers.
pub struct DecisionPool {
    tx: Option<Sender<Batch>>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for DecisionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionPool")
            .field("workers", &self.handles.len())
            .finish()
    }
}

impl DecisionPool {
    /// Spawn `workers` threads (at least one).
    ///
    /// # Errors
    ///
    /// [`ConfigError::ThreadSpawnFailed`] if a thread cannot be started.
    pub fn new(workers: usize) -> Result<Self, ConfigError> {
        let (tx, rx) = crossbeam_channel::unbounded::<Batch>();
        let mut handles = Vec::with_capacity(workers.max(1));
        for i in 0..workers.max(1) {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("brood-decide-{i}"))
                .spawn(move || worker_loop(rx))
                .map_err(|e| ConfigError::ThreadSpawnFailed {
                    reason: format!("decision worker {i}: {e}"),
                })?;
            handles.push(handle);
        }
        debug!(workers = handles.len(), "decision pool started");
        Ok(Self {
            tx: Some(tx),
            handles,
        })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Decide every task, preserving task order.
    ///
    /// Blocks until all batches reply.
    ///
    /// # Errors
    ///
    /// [`SimError::WorkerLost`] if a worker died before answering its
    /// batch.
    pub fn decide_all(
        &self,
        ctx: Arc<DecisionContext>,
        tasks: &[DecisionTask],
    ) -> Result<Vec<Decision>, SimError> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        let Some(tx) = &self.tx else {
            return Err(SimError::WorkerLost {
                missing: tasks.len(),
            });
        };
        let chunk = tasks.len().div_ceil(self.workers().max(1));
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
        for (c, slice) in tasks.chunks(chunk).enumerate() {
            let batch = Batch {
                ctx: Arc::clone(&ctx),
                tasks: slice
                    .iter()
                    .cloned()
                    .enumerate()
                    .map(|(i, t)| (c * chunk + i, t))
                    .collect(),
                reply: reply_tx.clone(),
            };
            if tx.send(batch).is_err() {
                break;
            }
        }
        drop(reply_tx);

        let mut slots: Vec<Option<Decision>> = vec![None; tasks.len()];
        // Ends when every batch has replied or been dropped.
        for decided in reply_rx.iter() {
            for (i, d) in decided {
                slots[i] = Some(d);
            }
        }
        let missing = slots.iter().filter(|s| s.is_none()).count();
        if missing > 0 {
            warn!(missing, "decision worker lost");
            return Err(SimError::WorkerLost { missing });
        }
        Ok(slots.into_iter().flatten().collect())
    }
}

impl Drop for DecisionPool {
    fn drop(&mut self) {
        self.tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
