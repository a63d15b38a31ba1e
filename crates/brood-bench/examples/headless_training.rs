//! Headless training run.
//!
//! Demonstrates: build config → Simulation → run in chunks → print
//! progress → shut down, saving learned state.
//!
//! Usage: `headless_training [TICKS] [STATE_DIR] [CONFIG_JSON]`
//!
//! Set `RUST_LOG=brood_engine=info` for per-interval population metrics.

use std::sync::atomic::AtomicBool;

use brood_bench::reference_profile;
use brood_engine::{SimConfig, Simulation};
use brood_persist::PersistConfig;
use tracing::info;

const CHUNK: u64 = 500;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut args = std::env::args().skip(1);
    let ticks: u64 = match args.next() {
        Some(n) => n.parse()?,
        None => 5_000,
    };
    let state_dir = args.next().unwrap_or_else(|| "brood-state".into());
    let mut config = match args.next() {
        Some(path) => SimConfig::from_json_file(path)?,
        None => reference_profile(42),
    };
    if config.metrics_interval == 0 {
        config.metrics_interval = CHUNK;
    }
    if config.autosave_interval == 0 {
        config.autosave_interval = CHUNK * 2;
    }
    std::fs::create_dir_all(&state_dir)?;
    config.persist = Some(PersistConfig::in_dir(&state_dir));

    println!("=== Brood Headless Training ===\n");
    let mut sim = Simulation::new(config)?;
    info!(ticks, state_dir = %state_dir, "training");

    let stop = AtomicBool::new(false);
    let mut done = 0;
    while done < ticks {
        let chunk = CHUNK.min(ticks - done);
        let summary = sim.run(&stop, Some(chunk))?;
        done += summary.ticks;

        let snap = sim.snapshot();
        let best_gen = snap.agents.iter().map(|a| a.generation).max().unwrap_or(0);
        println!(
            "  tick {:>7}: living={:>3} births={:>4} deaths={:>4} food={:>5} high={:>3} all_time={:>3} mean={:>6.2} max_gen={:>3}",
            snap.tick.0,
            snap.agents.len(),
            summary.births,
            summary.deaths,
            summary.food_eaten,
            snap.session_high,
            snap.all_time_high,
            snap.mean_score,
            best_gen,
        );
    }

    sim.request_shutdown();
    println!("\nSaved learned state to {state_dir}");
    Ok(())
}
