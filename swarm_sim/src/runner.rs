//! Scenario runner - executes named engine scenarios with assertions.
//!
//! Every scenario drives the engine exclusively through its command
//! boundary, the way any front end would, and checks the observable
//! contract: arrival timing, dispersal atomicity, rendezvous feasibility,
//! standoff holding, collision fate, and history replay arithmetic.

use nalgebra::Point2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use swarm_core::{
    intercept, Command, DroneId, DroneMode, EnemyObservation, MovePattern, SimConfig,
    SimulationEngine, TaskCommand, TaskKind, TaskParams, Team, TimeDirection, WorldState,
};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: crate::scenarios::ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether the scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Number of live drones at the end
    pub final_drone_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during the run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Drones destroyed by collisions
    pub drones_destroyed: usize,

    /// Groups that resolved into a formation
    pub groups_dispersed: usize,

    /// Worst standoff error observed after convergence (tail scenarios)
    pub max_standoff_error: f64,
}

/// Runs named scenarios against fresh engines.
pub struct ScenarioRunner {
    /// Seed for randomized placements
    seed: u64,

    /// Cap on ticks a scenario may run
    max_ticks: u64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            max_ticks: 3000,
        }
    }

    /// Sets the tick cap from a duration in simulated seconds.
    pub fn with_duration(mut self, secs: f64) -> Self {
        let dt = SimConfig::default().dt;
        self.max_ticks = (secs / dt).ceil() as u64;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: crate::scenarios::ScenarioId) -> ScenarioResult {
        use crate::scenarios::ScenarioId;

        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        match scenario {
            ScenarioId::RallyPoint => self.run_rally_point(),
            ScenarioId::GroupDispersal => self.run_group_dispersal(),
            ScenarioId::BounceIntercept => self.run_bounce_intercept(),
            ScenarioId::CircleIntercept => self.run_circle_intercept(),
            ScenarioId::Standoff => self.run_standoff(),
            ScenarioId::CollisionSweep => self.run_collision_sweep(),
            ScenarioId::Rewind => self.run_rewind(),
            ScenarioId::JumpBack => self.run_jump_back(),
        }
    }

    fn result(
        &self,
        scenario: crate::scenarios::ScenarioId,
        engine: &SimulationEngine,
        failure_reason: Option<String>,
        metrics: ScenarioMetrics,
    ) -> ScenarioResult {
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: failure_reason.is_none(),
            total_ticks: engine.world().tick,
            final_time_secs: engine.time(),
            final_drone_count: engine.world().drones.len(),
            failure_reason,
            metrics,
        }
    }

    /// SWM-001: one drone rallies to a random point; it must be within the
    /// arrival threshold no later than ceil(D / (S * dt)) ticks and idle
    /// right after its one-drone group disperses in place.
    fn run_rally_point(&self) -> ScenarioResult {
        let scenario = crate::scenarios::ScenarioId::RallyPoint;
        let config = SimConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let target = Point2::new(rng.gen_range(300.0..800.0), rng.gen_range(300.0..800.0));

        let mut engine = SimulationEngine::standard(config.clone());
        let id = DroneId(1);
        let start = engine.world().drone(id).map(|d| d.position);
        let start = match start {
            Some(start) => start,
            None => {
                return self.result(scenario, &engine, Some("drone 1 missing".into()), Default::default())
            }
        };

        if let Err(e) = engine.apply(Command::Move {
            drone_ids: vec![id],
            target,
        }) {
            return self.result(scenario, &engine, Some(format!("command rejected: {e}")), Default::default());
        }

        let distance = (target - start).norm();
        let bound = (distance / (config.friendly_speed * config.dt)).ceil() as u64;

        for _ in 0..bound {
            engine.tick();
        }

        let mut failure = None;
        match engine.world().drone(id) {
            Some(drone) => {
                let remaining = (target - drone.position).norm();
                if remaining > config.arrival_threshold {
                    failure = Some(format!(
                        "still {remaining:.1} units out after {bound} ticks"
                    ));
                }
            }
            None => failure = Some("drone vanished".into()),
        }

        // The one-drone group disperses onto its own destination; one more
        // tick settles it to idle.
        engine.tick();
        engine.tick();
        if failure.is_none() {
            match engine.world().drone(id) {
                Some(drone) if drone.mode != DroneMode::Idle => {
                    failure = Some(format!("expected idle, found {:?}", drone.mode));
                }
                _ => {}
            }
        }

        self.result(scenario, &engine, failure, ScenarioMetrics::default())
    }

    /// SWM-002: six drones move as one group; no member may leave `Moving`
    /// before the slowest arrives, and dispersal hands out distinct slots.
    fn run_group_dispersal(&self) -> ScenarioResult {
        let scenario = crate::scenarios::ScenarioId::GroupDispersal;
        let config = SimConfig::default();
        let mut engine = SimulationEngine::standard(config.clone());
        let ids: Vec<DroneId> = (1..=6).map(DroneId).collect();
        let destination = Point2::new(700.0, 600.0);

        if let Err(e) = engine.apply(Command::Move {
            drone_ids: ids.clone(),
            target: destination,
        }) {
            return self.result(scenario, &engine, Some(format!("command rejected: {e}")), Default::default());
        }

        let mut failure = None;
        let mut dispersed = false;
        for _ in 0..self.max_ticks {
            engine.tick();
            let world = engine.world();
            if world.groups.is_empty() {
                dispersed = true;
                break;
            }
            for id in &ids {
                match world.drone(*id) {
                    Some(drone) if drone.mode == DroneMode::Moving => {}
                    Some(drone) => {
                        failure = Some(format!(
                            "{id} left moving ({:?}) before the group resolved",
                            drone.mode
                        ));
                        break;
                    }
                    None => {
                        failure = Some(format!("{id} vanished"));
                        break;
                    }
                }
            }
            if failure.is_some() {
                break;
            }
        }

        if failure.is_none() && !dispersed {
            failure = Some("group never resolved".into());
        }

        // Let everyone settle onto their slots.
        for _ in 0..200 {
            engine.tick();
        }

        if failure.is_none() {
            let world = engine.world();
            let positions: Vec<Point2<f64>> = ids
                .iter()
                .filter_map(|id| world.drone(*id).map(|d| d.position))
                .collect();
            if positions.len() != ids.len() {
                failure = Some("member lost during dispersal".into());
            } else {
                for (i, a) in positions.iter().enumerate() {
                    for b in positions.iter().skip(i + 1) {
                        if (a - b).norm() < 1.0 {
                            failure = Some("formation slots overlap".into());
                        }
                    }
                }
                if !world.drones.values().take(6).all(|d| d.mode == DroneMode::Idle) {
                    failure = Some("members did not settle to idle".into());
                }
            }
        }

        let metrics = ScenarioMetrics {
            groups_dispersed: usize::from(dispersed),
            ..Default::default()
        };
        self.result(scenario, &engine, failure, metrics)
    }

    /// SWM-003: intercept a left-right bouncing enemy. Checks the planner's
    /// solution directly, then runs the engagement to destruction.
    fn run_bounce_intercept(&self) -> ScenarioResult {
        let scenario = crate::scenarios::ScenarioId::BounceIntercept;
        let config = SimConfig::default();
        let mut world = WorldState::new();
        let hunter = world.spawn_drone(Team::Friendly, Point2::new(300.0, 50.0), config.drone_radius);
        let bogey = world.spawn_drone(Team::Enemy, Point2::new(100.0, 50.0), config.drone_radius);
        if let Some(enemy) = world.drones.get_mut(&bogey) {
            enemy.mode = DroneMode::Patrolling;
            enemy.pattern = Some(MovePattern::BounceX {
                min: 100.0,
                max: 300.0,
                dir: 1.0,
            });
        }

        // Planner sanity before the engagement runs.
        let observation = EnemyObservation {
            id: bogey,
            position: Point2::new(100.0, 50.0),
            speed: config.enemy_speed,
            pattern: Some(MovePattern::BounceX {
                min: 100.0,
                max: 300.0,
                dir: 1.0,
            }),
        };
        let solution = intercept::plan(Point2::new(300.0, 50.0), config.friendly_speed, &observation, &config);
        let mut failure = match solution {
            Some(solution) if solution.eta <= 1.0 => {
                debug!(eta = solution.eta, x = solution.point.x, "planned rendezvous");
                None
            }
            Some(solution) => Some(format!("rendezvous too late: eta {:.2}", solution.eta)),
            None => Some("planner found no intercept".into()),
        };

        let mut engine = SimulationEngine::new(config, world);
        if let Err(e) = engine.apply(Command::Task(TaskCommand {
            kind: TaskKind::Intercept,
            drone_ids: vec![hunter],
            params: TaskParams {
                target_id: Some(bogey),
                ..Default::default()
            },
        })) {
            failure = failure.or(Some(format!("command rejected: {e}")));
        }

        let mut destroyed = 0;
        for _ in 0..self.max_ticks {
            engine.tick();
            if engine.world().drones.is_empty() {
                destroyed = 2;
                break;
            }
        }
        if failure.is_none() && destroyed != 2 {
            failure = Some("engagement never destroyed the pair".into());
        }

        let metrics = ScenarioMetrics {
            drones_destroyed: destroyed,
            ..Default::default()
        };
        self.result(scenario, &engine, failure, metrics)
    }

    /// SWM-004: intercept a circling enemy.
    fn run_circle_intercept(&self) -> ScenarioResult {
        let scenario = crate::scenarios::ScenarioId::CircleIntercept;
        let config = SimConfig::default();
        let mut world = WorldState::new();
        let hunter = world.spawn_drone(Team::Friendly, Point2::new(200.0, 200.0), config.drone_radius);
        let bogey = world.spawn_drone(Team::Enemy, Point2::new(600.0, 500.0), config.drone_radius);
        if let Some(enemy) = world.drones.get_mut(&bogey) {
            enemy.mode = DroneMode::Patrolling;
            enemy.pattern = Some(MovePattern::Circle {
                center: Point2::new(500.0, 500.0),
                radius: 100.0,
                angle: 0.0,
                dir: 1.0,
            });
        }

        let mut engine = SimulationEngine::new(config, world);
        let mut failure = None;
        if let Err(e) = engine.apply(Command::Task(TaskCommand {
            kind: TaskKind::Intercept,
            drone_ids: vec![hunter],
            params: TaskParams {
                target_id: Some(bogey),
                ..Default::default()
            },
        })) {
            failure = Some(format!("command rejected: {e}"));
        }

        let mut destroyed = 0;
        for _ in 0..self.max_ticks {
            engine.tick();
            if engine.world().drones.is_empty() {
                destroyed = 2;
                break;
            }
        }
        if failure.is_none() && destroyed != 2 {
            failure = Some("engagement never destroyed the pair".into());
        }

        let metrics = ScenarioMetrics {
            drones_destroyed: destroyed,
            ..Default::default()
        };
        self.result(scenario, &engine, failure, metrics)
    }

    /// SWM-005: tail a bouncing enemy at a 60-unit standoff; once converged
    /// the separation error must stay inside the dead zone plus one
    /// correction step.
    fn run_standoff(&self) -> ScenarioResult {
        let scenario = crate::scenarios::ScenarioId::Standoff;
        let config = SimConfig::default();
        let standoff = 60.0;
        let mut world = WorldState::new();
        let shadow = world.spawn_drone(Team::Friendly, Point2::new(100.0, 100.0), config.drone_radius);
        let bogey = world.spawn_drone(Team::Enemy, Point2::new(300.0, 400.0), config.drone_radius);
        if let Some(enemy) = world.drones.get_mut(&bogey) {
            enemy.mode = DroneMode::Patrolling;
            enemy.pattern = Some(MovePattern::BounceX {
                min: 300.0,
                max: 700.0,
                dir: 1.0,
            });
        }

        let mut engine = SimulationEngine::new(config.clone(), world);
        let mut failure = None;
        if let Err(e) = engine.apply(Command::Task(TaskCommand {
            kind: TaskKind::Tail,
            drone_ids: vec![shadow],
            params: TaskParams {
                target_id: Some(bogey),
                distance: Some(standoff),
                ..Default::default()
            },
        })) {
            failure = Some(format!("command rejected: {e}"));
        }

        // Converge, then observe.
        for _ in 0..500 {
            engine.tick();
        }

        let mut max_error: f64 = 0.0;
        for _ in 0..500 {
            engine.tick();
            let world = engine.world();
            let (tailer, target) = match (world.drone(shadow), world.drone(bogey)) {
                (Some(t), Some(e)) => (t, e),
                _ => {
                    failure = failure.or(Some("tail pair vanished".into()));
                    break;
                }
            };
            let error = ((target.position - tailer.position).norm() - standoff).abs();
            max_error = max_error.max(error);
        }

        // One correction step past the dead zone is the worst a moving
        // target can force.
        let allowed = config.tail_deadzone + config.friendly_speed * config.dt;
        if failure.is_none() && max_error > allowed {
            failure = Some(format!(
                "standoff error {max_error:.2} exceeded allowance {allowed:.2}"
            ));
        }

        let metrics = ScenarioMetrics {
            max_standoff_error: max_error,
            ..Default::default()
        };
        self.result(scenario, &engine, failure, metrics)
    }

    /// SWM-006: a commanded drone flies through a parked enemy; the pair is
    /// destroyed, a distant bystander is untouched, and the emptied group is
    /// discarded.
    fn run_collision_sweep(&self) -> ScenarioResult {
        let scenario = crate::scenarios::ScenarioId::CollisionSweep;
        let config = SimConfig::default();
        let mut world = WorldState::new();
        let runner = world.spawn_drone(Team::Friendly, Point2::new(100.0, 500.0), config.drone_radius);
        let bystander = world.spawn_drone(Team::Friendly, Point2::new(800.0, 800.0), config.drone_radius);
        let bogey = world.spawn_drone(Team::Enemy, Point2::new(200.0, 500.0), config.drone_radius);
        if let Some(enemy) = world.drones.get_mut(&bogey) {
            // Degenerate bounce: parked in the flight path.
            enemy.mode = DroneMode::Patrolling;
            enemy.pattern = Some(MovePattern::BounceX {
                min: 200.0,
                max: 200.0,
                dir: 1.0,
            });
        }

        let mut engine = SimulationEngine::new(config, world);
        let mut failure = None;
        if let Err(e) = engine.apply(Command::Move {
            drone_ids: vec![runner],
            target: Point2::new(300.0, 500.0),
        }) {
            failure = Some(format!("command rejected: {e}"));
        }

        for _ in 0..200 {
            engine.tick();
        }

        let world = engine.world();
        if failure.is_none() {
            if world.drone(runner).is_some() || world.drone(bogey).is_some() {
                failure = Some("colliding pair survived".into());
            } else if !world.groups.is_empty() {
                failure = Some("emptied group not discarded".into());
            } else {
                match world.drone(bystander) {
                    Some(drone)
                        if drone.position == Point2::new(800.0, 800.0)
                            && drone.mode == DroneMode::Idle => {}
                    Some(_) => failure = Some("bystander disturbed".into()),
                    None => failure = Some("bystander destroyed".into()),
                }
            }
        }

        let destroyed = 3 - engine.world().drones.len();
        let metrics = ScenarioMetrics {
            drones_destroyed: destroyed,
            ..Default::default()
        };
        self.result(scenario, &engine, failure, metrics)
    }

    /// SWM-007: reverse playback restores the recorded world exactly, and
    /// resuming forward discards the rewound-away future.
    fn run_rewind(&self) -> ScenarioResult {
        let scenario = crate::scenarios::ScenarioId::Rewind;
        let config = SimConfig::default();
        let mut engine = SimulationEngine::standard(config);
        let ids: Vec<DroneId> = engine.world().drones.keys().copied().collect();

        let mut failure = None;
        if let Err(e) = engine.apply(Command::Move {
            drone_ids: ids,
            target: Point2::new(600.0, 600.0),
        }) {
            failure = Some(format!("command rejected: {e}"));
        }

        let mut view_at_100 = None;
        for _ in 0..150 {
            engine.tick();
            if engine.world().tick == 100 {
                view_at_100 = serde_json::to_string(&engine.world_view()).ok();
            }
        }

        if let Err(e) = engine.apply(Command::SetDirection {
            direction: TimeDirection::Reverse,
        }) {
            failure = failure.or(Some(format!("command rejected: {e}")));
        }
        for _ in 0..50 {
            engine.tick();
        }

        if failure.is_none() {
            if engine.world().tick != 100 {
                failure = Some(format!("expected tick 100, found {}", engine.world().tick));
            } else {
                let replayed = serde_json::to_string(&engine.world_view()).ok();
                if replayed != view_at_100 {
                    failure = Some("replayed state diverged from recording".into());
                }
            }
        }

        if let Err(e) = engine.apply(Command::SetDirection {
            direction: TimeDirection::Forward,
        }) {
            failure = failure.or(Some(format!("command rejected: {e}")));
        }
        engine.tick();
        if failure.is_none() && engine.history().newest_tick() != Some(101) {
            failure = Some("forward resume did not overwrite the rewound future".into());
        }

        self.result(scenario, &engine, failure, ScenarioMetrics::default())
    }

    /// SWM-008: run past the buffer capacity, check the FIFO arithmetic,
    /// jump back, and verify the restored state matches the recording.
    fn run_jump_back(&self) -> ScenarioResult {
        let scenario = crate::scenarios::ScenarioId::JumpBack;
        let config = SimConfig::default();
        let capacity = config.history_capacity;
        let offset = config.jump_back_ticks;

        let mut world = WorldState::new();
        let bogey = world.spawn_drone(Team::Enemy, Point2::new(600.0, 500.0), config.drone_radius);
        if let Some(enemy) = world.drones.get_mut(&bogey) {
            enemy.mode = DroneMode::Patrolling;
            enemy.pattern = Some(MovePattern::Circle {
                center: Point2::new(500.0, 500.0),
                radius: 100.0,
                angle: 0.0,
                dir: 1.0,
            });
        }
        let mut engine = SimulationEngine::new(config, world);

        let total = 700u64;
        let mut view_at_target = None;
        for _ in 0..total {
            engine.tick();
            if engine.world().tick == total - offset {
                view_at_target = serde_json::to_string(&engine.world_view()).ok();
            }
        }

        let mut failure = None;
        if engine.history().len() != capacity {
            failure = Some(format!(
                "expected {capacity} snapshots, found {}",
                engine.history().len()
            ));
        } else if engine.history().oldest_tick() != Some(total - capacity as u64 + 1) {
            failure = Some(format!(
                "oldest snapshot tick {:?}, expected {}",
                engine.history().oldest_tick(),
                total - capacity as u64 + 1
            ));
        }

        if let Err(e) = engine.apply(Command::JumpBack) {
            failure = failure.or(Some(format!("command rejected: {e}")));
        }

        if failure.is_none() {
            if engine.world().tick != total - offset {
                failure = Some(format!(
                    "expected tick {}, found {}",
                    total - offset,
                    engine.world().tick
                ));
            } else {
                let restored = serde_json::to_string(&engine.world_view()).ok();
                if restored != view_at_target {
                    failure = Some("jump-back state diverged from recording".into());
                }
            }
        }

        // Forward continues from the restored point.
        for _ in 0..10 {
            engine.tick();
        }
        if failure.is_none() && engine.world().tick != total - offset + 10 {
            failure = Some("forward resume after jump-back miscounted ticks".into());
        }

        self.result(scenario, &engine, failure, ScenarioMetrics::default())
    }
}
