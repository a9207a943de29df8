//! Swarm scenario harness CLI
//!
//! Run deterministic engine scenarios with pass/fail assertions, optionally
//! exporting frame-by-frame world data for visualization.

use clap::Parser;
use nalgebra::Point2;
use swarm_core::{Command, DroneId, DroneMode, MovePattern, SimConfig, SimulationEngine, TaskCommand, TaskKind, TaskParams, Team};
use swarm_sim::{ScenarioId, ScenarioResult, ScenarioRunner, SimExport, SimFrame};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Run a demonstration world with frame-by-frame export for visualization:
/// the standard grid rallies across the map while one drone hunts a
/// bouncing intruder.
fn run_with_export(seed: u64, duration: f64, export_path: &str) -> std::io::Result<bool> {
    let config = SimConfig::default();

    // Standard grid plus an intruder on a bounce track.
    let mut world = swarm_core::WorldState::standard_grid(&config);
    let intruder = world.spawn_drone(Team::Enemy, Point2::new(100.0, 650.0), config.drone_radius);
    if let Some(enemy) = world.drones.get_mut(&intruder) {
        enemy.mode = DroneMode::Patrolling;
        enemy.pattern = Some(MovePattern::BounceX {
            min: 100.0,
            max: 900.0,
            dir: 1.0,
        });
    }
    let mut engine = SimulationEngine::new(config.clone(), world);

    // Rally half the grid, send one hunter after the intruder.
    let movers: Vec<DroneId> = (1..=6).map(DroneId).collect();
    let _ = engine.apply(Command::Move {
        drone_ids: movers,
        target: Point2::new(700.0, 700.0),
    });
    let _ = engine.apply(Command::Task(TaskCommand {
        kind: TaskKind::Intercept,
        drone_ids: vec![DroneId(7)],
        params: TaskParams {
            target_id: Some(intruder),
            ..Default::default()
        },
    }));

    let mut export = SimExport::new("export_demo", seed);
    let target_ticks = (duration / config.dt).ceil() as u64;
    // Export every 5 ticks (10 FPS at the 50 Hz step).
    let export_interval = 5;

    for tick in 0..target_ticks {
        engine.tick();
        if tick % export_interval == 0 {
            export.add_frame(SimFrame::from_view(&engine.world_view(), config.dt));
        }
    }

    let passed = !engine.world().drones.is_empty();
    export.finalize(passed);
    export.write_to_file(export_path)?;
    info!("Exported {} frames to {}", export.frames.len(), export_path);
    Ok(passed)
}

/// Swarm engine scenario harness
#[derive(Parser, Debug)]
#[command(name = "swarm-sim")]
#[command(about = "Run deterministic scenarios against the swarm engine", long_about = None)]
struct Args {
    /// Master seed for randomized placements (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (rally_point, group_dispersal, bounce_intercept,
    /// circle_intercept, standoff, collision_sweep, rewind, jump_back, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Maximum simulated duration per scenario in seconds
    #[arg(short, long, default_value = "60")]
    duration: f64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export demonstration frames to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    // Handle --export mode for visualization
    if let Some(export_path) = &args.export {
        info!("Running export demo to: {}", export_path);
        match run_with_export(base_seed, args.duration, export_path) {
            Ok(true) => return,
            Ok(false) => {
                error!("export demo ended with an empty world");
                std::process::exit(1);
            }
            Err(e) => {
                error!("failed to write export: {e}");
                std::process::exit(1);
            }
        }
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: rally_point, group_dispersal, bounce_intercept, circle_intercept, standoff, collision_sweep, rewind, jump_back, all");
            std::process::exit(1);
        })]
    };

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed).with_duration(args.duration);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!("PASS {} (seed={})", scenario.name(), seed);
                } else {
                    error!(
                        "FAIL {} (seed={}): {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "drones": r.final_drone_count,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("failed to serialize summary: {e}"),
        }
    } else if failed_count == 0 {
        info!("All {} scenario runs passed", total);
    } else {
        error!("{}/{} scenario runs failed", failed_count, total);
        for result in &all_results {
            if !result.passed {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    if failed_count > 0 {
        std::process::exit(1);
    }
}
