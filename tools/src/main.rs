//! sim-runner: headless persona simulation runner.
//!
//! Usage:
//!   sim-runner --seed 12345 --days 30 --db run.db
//!   sim-runner --data-dir ./data --max-actions 8 --batch-size 256

use anyhow::Result;
use personasim_core::{engine::SimEngine, summary::SimulationState};
use sim_runner::{
    catalog::CatalogState,
    inputs::RunInputs,
    store::{SimStore, SqliteSink},
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str())
        .unwrap_or("./data");

    let RunInputs { mut config, personas, adapter } = RunInputs::load(data_dir)?;
    config.seed = parse_arg(&args, "--seed", config.seed);
    config.days = parse_arg(&args, "--days", config.days);
    config.max_actions_per_day = parse_arg(&args, "--max-actions", config.max_actions_per_day);
    config.batch_size = parse_arg(&args, "--batch-size", config.batch_size);

    println!("personasim: sim-runner");
    println!("  seed:        {}", config.seed);
    println!("  days:        {}", config.days);
    println!("  personas:    {}", personas.len());
    println!("  max actions: {}", config.max_actions_per_day);
    println!("  db:          {db}");
    println!("  data_dir:    {data_dir}");
    println!();

    let store = SimStore::open(db)?;
    store.migrate()?;
    log::info!("db={db} journal_mode={}", store.journal_mode()?);

    let engine = SimEngine::new(config, adapter)?;
    let initial_state = engine.adapter().catalog().initial_state.clone();

    let run_id = format!("run-{}-{}", engine.config().seed, wall_clock_secs());
    store.insert_run(
        &run_id,
        engine.config().seed,
        env!("CARGO_PKG_VERSION"),
        &serde_json::to_string(engine.config())?,
    )?;

    let mut sink = SqliteSink::new(&store, run_id.clone());
    let state = engine.run_with_sink(&personas, initial_state, &mut sink)?;
    for summary in &state.personas {
        store.save_persona_summary(&run_id, summary)?;
    }

    print_summary(&store, &run_id, &state)?;
    Ok(())
}

fn print_summary(store: &SimStore, run_id: &str, state: &SimulationState<CatalogState>) -> Result<()> {
    let stored = store.event_count(run_id)?;
    let per_day = if state.days_completed > 0 {
        stored as f64 / state.days_completed as f64
    } else {
        0.0
    };

    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {run_id}");
    println!("  simulation_id:  {}", state.simulation_id);
    println!("  days run:       {}", state.days_completed);
    println!("  events stored:  {stored}");
    println!("  avg per day:    {per_day:.1}");
    println!("  successes:      {}", state.totals.successes);
    println!("  failures:       {}", state.totals.failures);
    println!("  abandoned:      {}", state.totals.abandoned);

    println!();
    println!("=== LIFECYCLE ===");
    for (stage, count) in store.stage_counts(run_id)? {
        println!("  {stage:<10} {count}");
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn wall_clock_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
