//! World model - all entity and configuration state for the swarm engine.
//!
//! This module is pure data plus invariant-preserving helpers. Behavior lives
//! in the per-mode controllers (`movement`, `intercept`, `tail`) and in the
//! engine tick; nothing here moves a drone.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::patterns::MovePattern;

/// Unique identifier for a drone.
///
/// Small monotone counters rather than UUIDs: operators type these into
/// commands, and ordered ids give the entity maps a deterministic scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DroneId(pub u32);

impl std::fmt::Display for DroneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "drone-{}", self.0)
    }
}

/// Unique identifier for a base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BaseId(pub u32);

impl std::fmt::Display for BaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "base-{}", self.0)
    }
}

/// Unique identifier for a command group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u64);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// Which side a drone belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Friendly,
    Enemy,
}

/// Behavioral state of a drone.
///
/// The mode fully determines which controller (if any) updates the drone's
/// velocity on a given tick. `Destroyed` is a transient mark applied by the
/// collision resolver; marked drones are swept from the world in the same
/// tick's removal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroneMode {
    Idle,
    Moving,
    Patrolling,
    Tailing,
    Intercepting,
    Holding,
    Returning,
    Destroyed,
}

/// Display shape tag for a base (rendering-agnostic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseShape {
    Circle,
    Square,
    Triangle,
}

/// A drone in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drone {
    /// Stable unique identity
    pub id: DroneId,

    /// Friendly or enemy
    pub team: Team,

    /// Position in world units
    pub position: Point2<f64>,

    /// Velocity in world units per second
    pub velocity: Vector2<f64>,

    /// Behavioral state selecting this tick's controller
    pub mode: DroneMode,

    /// Current movement target, if any
    pub target: Option<Point2<f64>>,

    /// Command group membership, if any
    pub group: Option<GroupId>,

    /// Enemy being tailed
    pub tail_target: Option<DroneId>,

    /// Standoff distance to maintain while tailing
    pub tail_distance: f64,

    /// Enemy designated for interception
    pub intercept_target: Option<DroneId>,

    /// Cached planner rendezvous point
    pub intercept_point: Option<Point2<f64>>,

    /// Seconds remaining until the cached rendezvous
    pub intercept_eta: Option<f64>,

    /// Fixed trajectory (enemies; also friendly drones on a patrol task)
    pub pattern: Option<MovePattern>,

    /// Assigned home base
    pub base: Option<BaseId>,

    /// Collision radius in world units
    pub radius: f64,
}

impl Drone {
    /// Creates an idle drone at the given position.
    pub fn new(id: DroneId, team: Team, position: Point2<f64>, radius: f64) -> Self {
        Self {
            id,
            team,
            position,
            velocity: Vector2::zeros(),
            mode: DroneMode::Idle,
            target: None,
            group: None,
            tail_target: None,
            tail_distance: 0.0,
            intercept_target: None,
            intercept_point: None,
            intercept_eta: None,
            pattern: None,
            base: None,
            radius,
        }
    }

    /// Zeroes the velocity.
    pub(crate) fn halt(&mut self) {
        self.velocity = Vector2::zeros();
    }

    /// Drops any tail/intercept linkage and cached planner output.
    ///
    /// Called when the drone switches task or its engagement target is
    /// destroyed.
    pub(crate) fn clear_engagement(&mut self) {
        self.tail_target = None;
        self.tail_distance = 0.0;
        self.intercept_target = None;
        self.intercept_point = None;
        self.intercept_eta = None;
    }
}

/// A home base on the plane. Immutable after creation except by explicit
/// reassignment commands on drones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Base {
    pub id: BaseId,
    pub position: Point2<f64>,
    pub shape: BaseShape,
    pub name: String,
}

/// A set of drones issued one synchronized move command, tracked until all
/// surviving members arrive at the shared destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandGroup {
    /// Monotonically increasing group identity
    pub id: GroupId,

    /// Shared destination
    pub destination: Point2<f64>,

    /// Member drones. Only ever shrinks (members destroyed en route).
    pub members: BTreeSet<DroneId>,

    /// Members that have reached the destination
    pub arrived: BTreeSet<DroneId>,
}

impl CommandGroup {
    /// Creates a new group over the given members.
    pub fn new(id: GroupId, destination: Point2<f64>, members: BTreeSet<DroneId>) -> Self {
        Self {
            id,
            destination,
            members,
            arrived: BTreeSet::new(),
        }
    }

    /// True when every surviving member has arrived.
    pub fn is_resolved(&self) -> bool {
        !self.members.is_empty() && self.members.iter().all(|id| self.arrived.contains(id))
    }

    /// Removes a member (destroyed or reassigned). Also clears its arrival.
    pub fn remove_member(&mut self, id: DroneId) {
        self.members.remove(&id);
        self.arrived.remove(&id);
    }
}

/// The complete mutable simulation state.
///
/// Owned by the engine and mutated only through its single tick path and the
/// command boundary; controllers receive it (or the slices they need)
/// explicitly rather than through any ambient global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    /// Monotonically increasing tick counter
    pub tick: u64,

    /// All live drones, keyed by id. Ordered map: controller and collision
    /// scans iterate this, and a deterministic order makes runs reproducible.
    pub drones: BTreeMap<DroneId, Drone>,

    /// All bases
    pub bases: BTreeMap<BaseId, Base>,

    /// Open command groups
    pub groups: BTreeMap<GroupId, CommandGroup>,

    next_drone_id: u32,
    next_base_id: u32,
    next_group_id: u64,
}

impl WorldState {
    /// Creates an empty world.
    pub fn new() -> Self {
        Self {
            tick: 0,
            drones: BTreeMap::new(),
            bases: BTreeMap::new(),
            groups: BTreeMap::new(),
            next_drone_id: 1,
            next_base_id: 1,
            next_group_id: 1,
        }
    }

    /// Creates the standard initial world: twelve friendly drones in a
    /// four-column grid, 80 units apart, anchored at (200, 200).
    pub fn standard_grid(config: &SimConfig) -> Self {
        let mut world = Self::new();

        let num_drones = 12;
        let cols = 4;
        let spacing = 80.0;
        let start = Point2::new(200.0, 200.0);

        for i in 0..num_drones {
            let row = (i / cols) as f64;
            let col = (i % cols) as f64;
            world.spawn_drone(
                Team::Friendly,
                Point2::new(start.x + col * spacing, start.y + row * spacing),
                config.drone_radius,
            );
        }

        world
    }

    /// Spawns a drone and returns its id.
    pub fn spawn_drone(&mut self, team: Team, position: Point2<f64>, radius: f64) -> DroneId {
        let id = DroneId(self.next_drone_id);
        self.next_drone_id += 1;
        self.drones.insert(id, Drone::new(id, team, position, radius));
        id
    }

    /// Adds a base and returns its id.
    pub fn add_base(&mut self, position: Point2<f64>, shape: BaseShape, name: &str) -> BaseId {
        let id = BaseId(self.next_base_id);
        self.next_base_id += 1;
        self.bases.insert(
            id,
            Base {
                id,
                position,
                shape,
                name: name.to_string(),
            },
        );
        id
    }

    /// Allocates the next group id.
    pub(crate) fn allocate_group_id(&mut self) -> GroupId {
        let id = GroupId(self.next_group_id);
        self.next_group_id += 1;
        id
    }

    /// Returns a drone by id.
    pub fn drone(&self, id: DroneId) -> Option<&Drone> {
        self.drones.get(&id)
    }

    /// Returns the ids of all drones currently in the given mode, in
    /// ascending id order.
    pub(crate) fn ids_in_mode(&self, mode: DroneMode) -> Vec<DroneId> {
        self.drones
            .values()
            .filter(|d| d.mode == mode)
            .map(|d| d.id)
            .collect()
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamps a position into the world rectangle.
pub(crate) fn clamp_to_bounds(p: Point2<f64>, config: &SimConfig) -> Point2<f64> {
    Point2::new(
        p.x.clamp(0.0, config.world_width),
        p.y.clamp(0.0, config.world_height),
    )
}

/// Simulation constants. All behavior knobs live here; controllers never
/// carry their own copies.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Fixed physics step in seconds (wall-clock jitter never changes this)
    pub dt: f64,

    /// Friendly drone speed in world units per second
    pub friendly_speed: f64,

    /// Enemy drone speed in world units per second
    pub enemy_speed: f64,

    /// Distance at which a moving drone snaps to its target
    pub arrival_threshold: f64,

    /// Tail controller dead zone half-width
    pub tail_deadzone: f64,

    /// Standoff distance used when a tail task omits one
    pub default_tail_distance: f64,

    /// Maximum future time the intercept planner searches, in seconds
    pub intercept_horizon: f64,

    /// Planner sampling step in seconds
    pub intercept_step: f64,

    /// Predicted-point drift that forces an intercept replan
    pub replan_drift: f64,

    /// Collision radius of a drone
    pub drone_radius: f64,

    /// Grid spacing used when a group disperses
    pub formation_spacing: f64,

    /// History ring buffer capacity in snapshots
    pub history_capacity: usize,

    /// Ticks jumped by the jump-back control
    pub jump_back_ticks: u64,

    /// World rectangle width
    pub world_width: f64,

    /// World rectangle height
    pub world_height: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        let drone_radius = 6.0;
        Self {
            dt: 0.02,
            friendly_speed: 200.0,
            enemy_speed: 40.0,
            arrival_threshold: 5.0,
            tail_deadzone: 2.0,
            default_tail_distance: 50.0,
            intercept_horizon: 30.0,
            intercept_step: 0.1,
            replan_drift: 10.0,
            drone_radius,
            formation_spacing: 2.0 * drone_radius,
            history_capacity: 500,
            jump_back_ticks: 250,
            world_width: 1000.0,
            world_height: 1000.0,
        }
    }
}

impl SimConfig {
    /// Returns the fixed speed for a team.
    pub fn speed_for(&self, team: Team) -> f64 {
        match team {
            Team::Friendly => self.friendly_speed,
            Team::Enemy => self.enemy_speed,
        }
    }
}
