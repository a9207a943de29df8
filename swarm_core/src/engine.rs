//! Simulation engine - the fixed-timestep clock over the world model.
//!
//! Owns the `WorldState` and everything needed to step it: configuration,
//! the history ring, and the clock state machine. There is exactly one tick
//! path and exactly one command path, both behind `&mut self`, so the
//! single-writer discipline of the world is enforced by the borrow checker
//! rather than by locks.
//!
//! A forward tick runs the behavior controllers in fixed mode order
//! (moving/returning, intercepting, tailing, patrolling), then collision
//! resolution, then group resolution, then appends a history snapshot. A
//! reversing tick only walks the history cursor. A paused tick does nothing.
//! The physics step is always the configured `dt`; wall-clock jitter in how
//! the caller schedules ticks never reaches the math, which is what keeps
//! histories and intercept predictions reproducible.

use tracing::{debug, info};

use crate::collision;
use crate::command::{Command, CommandError, CommandReceipt, TaskCommand, TaskKind, TimeDirection, WorldView};
use crate::formation;
use crate::history::{History, HistorySnapshot};
use crate::intercept::{self, EnemyObservation};
use crate::movement;
use crate::tail;
use crate::world::{DroneId, DroneMode, GroupId, SimConfig, Team, WorldState};

/// Clock state machine. Transitions are driven solely by external commands;
/// the clock never changes state on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    RunningForward,
    Paused,
    Reversing,
}

/// The simulation engine facade.
pub struct SimulationEngine {
    config: SimConfig,
    world: WorldState,
    /// Pristine copy of the initial world, restored wholesale on reset.
    initial: WorldState,
    history: History,
    clock: ClockState,
}

impl SimulationEngine {
    /// Creates an engine over the given initial world.
    pub fn new(config: SimConfig, world: WorldState) -> Self {
        let history = History::new(config.history_capacity);
        let initial = world.clone();
        Self {
            config,
            world,
            initial,
            history,
            clock: ClockState::RunningForward,
        }
    }

    /// Creates an engine over the standard 12-drone grid world.
    pub fn standard(config: SimConfig) -> Self {
        let world = WorldState::standard_grid(&config);
        Self::new(config, world)
    }

    /// Engine configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Read access to the live world.
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Current clock state.
    pub fn clock(&self) -> ClockState {
        self.clock
    }

    /// Read access to the history ring.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Simulated seconds elapsed.
    pub fn time(&self) -> f64 {
        self.world.tick as f64 * self.config.dt
    }

    /// An owned, immutable view of the live world for pollers.
    pub fn world_view(&self) -> WorldView {
        WorldView::of(&self.world)
    }

    /// Advances the simulation one tick according to the clock state.
    pub fn tick(&mut self) {
        match self.clock {
            ClockState::Paused => {}
            ClockState::Reversing => self.reverse_tick(),
            ClockState::RunningForward => self.forward_tick(),
        }
    }

    /// Applies one boundary command.
    ///
    /// Called between ticks (the `&mut` receiver makes interleaving with a
    /// tick impossible); effects become visible on the next tick. Reference
    /// errors are reported through the receipt, schema/task errors reject
    /// the command without touching the world.
    pub fn apply(&mut self, command: Command) -> Result<CommandReceipt, CommandError> {
        match command {
            Command::Move { drone_ids, target } => {
                let (_, joined, ignored) = formation::create_group(&mut self.world, &drone_ids, target);
                Ok(CommandReceipt::new(joined.len(), ignored))
            }
            Command::Task(task) => self.apply_task(task),
            Command::SetPaused { paused } => {
                if paused {
                    self.clock = ClockState::Paused;
                } else {
                    self.history.resume_forward();
                    self.clock = ClockState::RunningForward;
                }
                Ok(CommandReceipt::default())
            }
            Command::SetDirection { direction } => {
                match direction {
                    TimeDirection::Reverse => self.clock = ClockState::Reversing,
                    TimeDirection::Forward => {
                        self.history.resume_forward();
                        self.clock = ClockState::RunningForward;
                    }
                }
                Ok(CommandReceipt::default())
            }
            Command::JumpBack => {
                if let Some(snapshot) = self.history.jump_back(self.config.jump_back_ticks) {
                    snapshot.restore(&mut self.world);
                    info!(tick = self.world.tick, "jumped back");
                }
                self.history.resume_forward();
                self.clock = ClockState::RunningForward;
                Ok(CommandReceipt::default())
            }
            Command::Reset => {
                // All-or-nothing: world, groups, and history go together.
                self.world = self.initial.clone();
                self.history.clear();
                self.clock = ClockState::RunningForward;
                info!("world reset");
                Ok(CommandReceipt::default())
            }
            Command::SetBase { drone_ids, base_id } => self.apply_set_base(&drone_ids, base_id),
        }
    }

    fn apply_task(&mut self, task: TaskCommand) -> Result<CommandReceipt, CommandError> {
        task.validate()?;

        match task.kind {
            TaskKind::Move => {
                let target = task.params.target.ok_or(CommandError::MissingParameter {
                    task: TaskKind::Move,
                    param: "target",
                })?;
                let (_, joined, ignored) =
                    formation::create_group(&mut self.world, &task.drone_ids, target);
                Ok(CommandReceipt::new(joined.len(), ignored))
            }
            TaskKind::Patrol => {
                let pattern = task.params.pattern.ok_or(CommandError::MissingParameter {
                    task: TaskKind::Patrol,
                    param: "pattern",
                })?;
                Ok(self.assign_each(&task.drone_ids, |drone| {
                    drone.clear_engagement();
                    drone.target = None;
                    drone.pattern = Some(pattern);
                    drone.mode = DroneMode::Patrolling;
                    true
                }))
            }
            TaskKind::Tail => {
                let target_id = task.params.target_id.ok_or(CommandError::MissingParameter {
                    task: TaskKind::Tail,
                    param: "target_id",
                })?;
                self.require_enemy(target_id)?;
                let distance = task.params.distance.unwrap_or(self.config.default_tail_distance);
                Ok(self.assign_each(&task.drone_ids, |drone| {
                    drone.clear_engagement();
                    drone.target = None;
                    drone.pattern = None;
                    drone.tail_target = Some(target_id);
                    drone.tail_distance = distance;
                    drone.mode = DroneMode::Tailing;
                    true
                }))
            }
            TaskKind::Intercept => {
                let target_id = task.params.target_id.ok_or(CommandError::MissingParameter {
                    task: TaskKind::Intercept,
                    param: "target_id",
                })?;
                self.require_enemy(target_id)?;
                Ok(self.assign_each(&task.drone_ids, |drone| {
                    drone.clear_engagement();
                    drone.target = None;
                    drone.pattern = None;
                    drone.intercept_target = Some(target_id);
                    drone.mode = DroneMode::Intercepting;
                    true
                }))
            }
            TaskKind::Hold => Ok(self.assign_each(&task.drone_ids, |drone| {
                drone.clear_engagement();
                drone.target = None;
                drone.pattern = None;
                drone.halt();
                drone.mode = DroneMode::Holding;
                true
            })),
            TaskKind::ReturnToBase => {
                // Base positions looked up ahead of the mutation pass.
                let bases = self.world.bases.clone();
                Ok(self.assign_each(&task.drone_ids, move |drone| {
                    let home = drone.base.and_then(|id| bases.get(&id));
                    match home {
                        Some(base) => {
                            drone.clear_engagement();
                            drone.pattern = None;
                            drone.target = Some(base.position);
                            drone.mode = DroneMode::Returning;
                            true
                        }
                        // No assigned base: reference-style ignore.
                        None => false,
                    }
                }))
            }
        }
    }

    /// Applies `assign` to each commanded id that names a live friendly
    /// drone. Drones leaving a group are released from it; ids that are
    /// unknown, enemy, or for which `assign` declines are reported as
    /// ignored.
    fn assign_each(
        &mut self,
        drone_ids: &[DroneId],
        mut assign: impl FnMut(&mut crate::world::Drone) -> bool,
    ) -> CommandReceipt {
        let mut applied = 0;
        let mut ignored = Vec::new();

        for &id in drone_ids {
            let outcome = match self.world.drones.get_mut(&id) {
                Some(drone) if drone.team == Team::Friendly => {
                    if assign(drone) {
                        Some(drone.group.take())
                    } else {
                        None
                    }
                }
                _ => None,
            };
            match outcome {
                Some(old_group) => {
                    applied += 1;
                    if let Some(group) = old_group {
                        formation::release_member(&mut self.world, group, id);
                    }
                }
                None => ignored.push(id),
            }
        }

        CommandReceipt::new(applied, ignored)
    }

    fn apply_set_base(
        &mut self,
        drone_ids: &[DroneId],
        base_id: crate::world::BaseId,
    ) -> Result<CommandReceipt, CommandError> {
        if !self.world.bases.contains_key(&base_id) {
            return Err(CommandError::UnknownBase(base_id));
        }

        let mut applied = 0;
        let mut ignored = Vec::new();
        for &id in drone_ids {
            match self.world.drones.get_mut(&id) {
                Some(drone) if drone.team == Team::Friendly => {
                    drone.base = Some(base_id);
                    applied += 1;
                }
                _ => ignored.push(id),
            }
        }
        Ok(CommandReceipt::new(applied, ignored))
    }

    /// Rejects an engagement target that is absent or not an enemy.
    fn require_enemy(&self, id: DroneId) -> Result<(), CommandError> {
        match self.world.drones.get(&id) {
            Some(drone) if drone.team == Team::Enemy => Ok(()),
            _ => Err(CommandError::InvalidTarget(id)),
        }
    }

    /// One forward physics tick: controllers in mode order, collisions,
    /// grouping, history.
    fn forward_tick(&mut self) {
        let config = self.config.clone();

        // Movement controller: moving and returning drones.
        let mut arrivals: Vec<(GroupId, DroneId)> = Vec::new();
        let movers: Vec<DroneId> = self
            .world
            .drones
            .values()
            .filter(|d| matches!(d.mode, DroneMode::Moving | DroneMode::Returning))
            .map(|d| d.id)
            .collect();
        for id in movers {
            if let Some(drone) = self.world.drones.get_mut(&id) {
                let speed = config.speed_for(drone.team);
                if movement::update(drone, speed, &config) {
                    if let Some(group) = drone.group {
                        arrivals.push((group, id));
                    }
                }
            }
        }
        for (group, id) in arrivals {
            formation::record_arrival(&mut self.world, group, id);
        }

        // Intercept controller.
        for id in self.world.ids_in_mode(DroneMode::Intercepting) {
            let enemy = self
                .world
                .drones
                .get(&id)
                .and_then(|d| d.intercept_target)
                .and_then(|tid| self.world.drones.get(&tid))
                .filter(|e| e.team == Team::Enemy)
                .map(|e| EnemyObservation {
                    id: e.id,
                    position: e.position,
                    speed: config.speed_for(e.team),
                    pattern: e.pattern,
                });
            if let Some(drone) = self.world.drones.get_mut(&id) {
                match enemy {
                    Some(enemy) => {
                        let speed = config.speed_for(drone.team);
                        intercept::update(drone, &enemy, speed, &config);
                    }
                    None => {
                        debug!(drone = %id, "intercept target gone");
                        drone.clear_engagement();
                        drone.mode = DroneMode::Idle;
                        drone.halt();
                    }
                }
            }
        }

        // Tail controller.
        for id in self.world.ids_in_mode(DroneMode::Tailing) {
            let target_position = self
                .world
                .drones
                .get(&id)
                .and_then(|d| d.tail_target)
                .and_then(|tid| self.world.drones.get(&tid))
                .map(|t| t.position);
            if let Some(drone) = self.world.drones.get_mut(&id) {
                match target_position {
                    Some(position) => {
                        let speed = config.speed_for(drone.team);
                        tail::update(drone, position, speed, &config);
                    }
                    None => {
                        debug!(drone = %id, "tail target gone");
                        drone.clear_engagement();
                        drone.mode = DroneMode::Idle;
                        drone.halt();
                    }
                }
            }
        }

        // Pattern stepping: enemies and friendly patrols.
        for id in self.world.ids_in_mode(DroneMode::Patrolling) {
            if let Some(drone) = self.world.drones.get_mut(&id) {
                let speed = config.speed_for(drone.team);
                match drone.pattern.as_mut() {
                    Some(pattern) => {
                        let (position, velocity) = pattern.step(drone.position, speed, config.dt);
                        drone.position = position;
                        drone.velocity = velocity;
                    }
                    None => {
                        drone.mode = DroneMode::Idle;
                        drone.halt();
                    }
                }
            }
        }

        collision::resolve(&mut self.world);
        formation::resolve_groups(&mut self.world, &config);

        self.world.tick += 1;
        self.history.push(HistorySnapshot::capture(&self.world));
    }

    /// One reverse-playback tick: restore the next-older snapshot, halting
    /// at the oldest retained one.
    fn reverse_tick(&mut self) {
        if let Some(snapshot) = self.history.step_back() {
            snapshot.restore(&mut self.world);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::MovePattern;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    /// Engine with a single friendly drone at the origin.
    fn single_drone_engine() -> (SimulationEngine, DroneId) {
        let config = SimConfig::default();
        let mut world = WorldState::new();
        let id = world.spawn_drone(Team::Friendly, Point2::new(0.0, 0.0), config.drone_radius);
        (SimulationEngine::new(config, world), id)
    }

    #[test]
    fn test_concrete_move_scenario() {
        // Friendly at (0,0), speed 200 u/s, commanded to (400,0), dt 0.02:
        // halfway at tick 50, within threshold (snapped) at tick 100, idle
        // right after the one-drone group disperses in place.
        let (mut engine, id) = single_drone_engine();
        engine
            .apply(Command::Move {
                drone_ids: vec![id],
                target: Point2::new(400.0, 0.0),
            })
            .unwrap();

        for _ in 0..50 {
            engine.tick();
        }
        let drone = engine.world().drone(id).unwrap();
        assert_relative_eq!(drone.position.x, 200.0, epsilon = 1e-6);
        assert_relative_eq!(drone.position.y, 0.0);
        assert_eq!(drone.mode, DroneMode::Moving);

        for _ in 50..100 {
            engine.tick();
        }
        let drone = engine.world().drone(id).unwrap();
        assert_eq!(drone.position, Point2::new(400.0, 0.0));

        engine.tick();
        let drone = engine.world().drone(id).unwrap();
        assert_eq!(drone.mode, DroneMode::Idle);
        assert_eq!(engine.world().tick, 101);
    }

    #[test]
    fn test_group_dispersal_is_atomic() {
        let config = SimConfig::default();
        let mut world = WorldState::new();
        // Staggered starts: the far drone arrives last.
        let near = world.spawn_drone(Team::Friendly, Point2::new(450.0, 300.0), config.drone_radius);
        let mid = world.spawn_drone(Team::Friendly, Point2::new(300.0, 300.0), config.drone_radius);
        let far = world.spawn_drone(Team::Friendly, Point2::new(100.0, 300.0), config.drone_radius);
        let mut engine = SimulationEngine::new(config, world);

        engine
            .apply(Command::Move {
                drone_ids: vec![near, mid, far],
                target: Point2::new(500.0, 300.0),
            })
            .unwrap();

        let mut dispersal_tick = None;
        for _ in 0..200 {
            engine.tick();
            let world = engine.world();
            if world.groups.is_empty() {
                dispersal_tick = Some(world.tick);
                break;
            }
            // Until the whole group arrives, nobody leaves Moving.
            for id in [near, mid, far] {
                assert_eq!(world.drone(id).unwrap().mode, DroneMode::Moving);
            }
        }

        let dispersal_tick = dispersal_tick.expect("group never resolved");
        // Far drone covers 400 units at 200 u/s: 100 ticks.
        assert_eq!(dispersal_tick, 100);

        // After dispersal every member owns a distinct sub-target.
        let world = engine.world();
        let targets: Vec<_> = [near, mid, far]
            .iter()
            .map(|id| world.drone(*id).unwrap().target.unwrap())
            .collect();
        assert!(targets[0] != targets[1] && targets[1] != targets[2]);
    }

    #[test]
    fn test_pause_freezes_world_and_history() {
        let (mut engine, id) = single_drone_engine();
        engine
            .apply(Command::Move {
                drone_ids: vec![id],
                target: Point2::new(400.0, 0.0),
            })
            .unwrap();

        for _ in 0..10 {
            engine.tick();
        }
        let frozen = engine.world().clone();
        let history_len = engine.history().len();

        engine.apply(Command::SetPaused { paused: true }).unwrap();
        for _ in 0..25 {
            engine.tick();
        }

        assert_eq!(engine.world(), &frozen);
        assert_eq!(engine.history().len(), history_len);

        engine.apply(Command::SetPaused { paused: false }).unwrap();
        engine.tick();
        assert_ne!(engine.world(), &frozen);
    }

    #[test]
    fn test_reverse_restores_past_states() {
        let (mut engine, id) = single_drone_engine();
        engine
            .apply(Command::Move {
                drone_ids: vec![id],
                target: Point2::new(400.0, 0.0),
            })
            .unwrap();

        for _ in 0..20 {
            engine.tick();
        }
        let x_at_20 = engine.world().drone(id).unwrap().position.x;

        engine
            .apply(Command::SetDirection {
                direction: TimeDirection::Reverse,
            })
            .unwrap();
        for _ in 0..5 {
            engine.tick();
        }

        assert_eq!(engine.world().tick, 15);
        let x_at_15 = engine.world().drone(id).unwrap().position.x;
        assert!(x_at_15 < x_at_20);
        assert_relative_eq!(x_at_15, 15.0 * 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_reverse_halts_at_oldest_snapshot() {
        let (mut engine, id) = single_drone_engine();
        engine
            .apply(Command::Move {
                drone_ids: vec![id],
                target: Point2::new(400.0, 0.0),
            })
            .unwrap();
        for _ in 0..5 {
            engine.tick();
        }

        engine
            .apply(Command::SetDirection {
                direction: TimeDirection::Reverse,
            })
            .unwrap();
        for _ in 0..50 {
            engine.tick();
        }

        assert_eq!(engine.world().tick, 1);
    }

    #[test]
    fn test_forward_after_reverse_discards_future() {
        let (mut engine, id) = single_drone_engine();
        engine
            .apply(Command::Move {
                drone_ids: vec![id],
                target: Point2::new(400.0, 0.0),
            })
            .unwrap();
        for _ in 0..30 {
            engine.tick();
        }

        engine
            .apply(Command::SetDirection {
                direction: TimeDirection::Reverse,
            })
            .unwrap();
        for _ in 0..10 {
            engine.tick();
        }
        assert_eq!(engine.world().tick, 20);

        engine
            .apply(Command::SetDirection {
                direction: TimeDirection::Forward,
            })
            .unwrap();
        assert_eq!(engine.history().newest_tick(), Some(20));

        engine.tick();
        assert_eq!(engine.world().tick, 21);
        assert_eq!(engine.history().newest_tick(), Some(21));
    }

    #[test]
    fn test_jump_back_restores_and_resumes() {
        let (mut engine, id) = single_drone_engine();
        engine
            .apply(Command::Move {
                drone_ids: vec![id],
                target: Point2::new(400.0, 0.0),
            })
            .unwrap();
        for _ in 0..300 {
            engine.tick();
        }

        engine.apply(Command::JumpBack).unwrap();
        assert_eq!(engine.world().tick, 50);
        assert_eq!(engine.clock(), ClockState::RunningForward);

        engine.tick();
        assert_eq!(engine.world().tick, 51);
    }

    #[test]
    fn test_reset_is_atomic() {
        let config = SimConfig::default();
        let mut engine = SimulationEngine::standard(config);
        let pristine = engine.world().clone();

        let ids: Vec<DroneId> = engine.world().drones.keys().copied().collect();
        engine
            .apply(Command::Move {
                drone_ids: ids,
                target: Point2::new(900.0, 900.0),
            })
            .unwrap();
        for _ in 0..100 {
            engine.tick();
        }

        engine.apply(Command::Reset).unwrap();

        assert_eq!(engine.world(), &pristine);
        assert!(engine.history().is_empty());
        assert_eq!(engine.clock(), ClockState::RunningForward);
    }

    #[test]
    fn test_intercept_engagement_destroys_both() {
        let config = SimConfig::default();
        let mut world = WorldState::new();
        let hunter = world.spawn_drone(Team::Friendly, Point2::new(300.0, 50.0), config.drone_radius);
        let bogey = world.spawn_drone(Team::Enemy, Point2::new(100.0, 50.0), config.drone_radius);
        {
            let enemy = world.drones.get_mut(&bogey).unwrap();
            enemy.mode = DroneMode::Patrolling;
            enemy.pattern = Some(MovePattern::BounceX {
                min: 100.0,
                max: 300.0,
                dir: 1.0,
            });
        }
        let mut engine = SimulationEngine::new(config, world);

        engine
            .apply(Command::Task(TaskCommand {
                kind: TaskKind::Intercept,
                drone_ids: vec![hunter],
                params: crate::command::TaskParams {
                    target_id: Some(bogey),
                    ..Default::default()
                },
            }))
            .unwrap();

        // Plenty of ticks for a sub-second rendezvous.
        for _ in 0..250 {
            engine.tick();
            if engine.world().drones.is_empty() {
                break;
            }
        }

        assert!(
            engine.world().drones.is_empty(),
            "engagement should destroy both parties"
        );
    }

    #[test]
    fn test_task_on_enemy_drone_is_ignored() {
        let config = SimConfig::default();
        let mut world = WorldState::new();
        let enemy = world.spawn_drone(Team::Enemy, Point2::new(100.0, 100.0), config.drone_radius);
        let mut engine = SimulationEngine::new(config, world);

        let receipt = engine
            .apply(Command::Task(TaskCommand {
                kind: TaskKind::Hold,
                drone_ids: vec![enemy],
                params: Default::default(),
            }))
            .unwrap();

        assert_eq!(receipt.applied, 0);
        assert_eq!(receipt.ignored, vec![enemy]);
    }

    #[test]
    fn test_set_base_and_return() {
        let config = SimConfig::default();
        let mut world = WorldState::new();
        let id = world.spawn_drone(Team::Friendly, Point2::new(500.0, 500.0), config.drone_radius);
        let base = world.add_base(
            Point2::new(100.0, 100.0),
            crate::world::BaseShape::Square,
            "field base",
        );
        let mut engine = SimulationEngine::new(config, world);

        engine
            .apply(Command::SetBase {
                drone_ids: vec![id],
                base_id: base,
            })
            .unwrap();
        engine
            .apply(Command::Task(TaskCommand {
                kind: TaskKind::ReturnToBase,
                drone_ids: vec![id],
                params: Default::default(),
            }))
            .unwrap();

        assert_eq!(engine.world().drone(id).unwrap().mode, DroneMode::Returning);

        for _ in 0..600 {
            engine.tick();
        }
        let drone = engine.world().drone(id).unwrap();
        assert_eq!(drone.mode, DroneMode::Idle);
        assert_relative_eq!(drone.position.x, 100.0, epsilon = 1e-6);
        assert_relative_eq!(drone.position.y, 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_unknown_base_rejected_without_mutation() {
        let (mut engine, id) = single_drone_engine();
        let before = engine.world().clone();

        let result = engine.apply(Command::SetBase {
            drone_ids: vec![id],
            base_id: crate::world::BaseId(42),
        });

        assert!(matches!(result, Err(CommandError::UnknownBase(_))));
        assert_eq!(engine.world(), &before);
    }
}
