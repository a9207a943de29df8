//! Command boundary - the structured operations external collaborators feed
//! the engine.
//!
//! Everything that can reach the core arrives as one of these closed enums;
//! the NL/voice front end and any UI must resolve operator intent into a
//! fully-parameterized `Command` before the engine sees it. Free-form task
//! names are validated into `TaskKind` exactly once, at this boundary, via
//! `FromStr`; inside the core the dispatch is a total match.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::patterns::MovePattern;
use crate::world::{Base, BaseId, Drone, DroneId, DroneMode, Team, WorldState};

/// A structured operator command.
///
/// Reference errors (ids not present in the world) are tolerated per id;
/// schema and task errors are rejected before any mutation. Commands mutate
/// between ticks and take effect on the next tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "command")]
pub enum Command {
    /// Move the named drones to a shared destination as one group.
    Move {
        drone_ids: Vec<DroneId>,
        target: Point2<f64>,
    },

    /// Assign a task to the named drones.
    Task(TaskCommand),

    /// Suspend or resume tick advancement.
    SetPaused { paused: bool },

    /// Switch between forward simulation and reverse playback.
    SetDirection { direction: TimeDirection },

    /// Rewind by the configured offset and resume forward from there.
    JumpBack,

    /// Atomically clear and reinitialize world and history.
    Reset,

    /// Reassign the home base of the named drones.
    SetBase {
        drone_ids: Vec<DroneId>,
        base_id: BaseId,
    },
}

/// Direction of simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeDirection {
    Forward,
    Reverse,
}

/// A task assignment over a set of drones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCommand {
    pub kind: TaskKind,
    pub drone_ids: Vec<DroneId>,
    #[serde(default)]
    pub params: TaskParams,
}

/// The closed set of tasks the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Move,
    Patrol,
    Tail,
    Hold,
    ReturnToBase,
    Intercept,
}

impl TaskKind {
    /// Boundary-facing task name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Move => "move",
            TaskKind::Patrol => "patrol",
            TaskKind::Tail => "tail",
            TaskKind::Hold => "hold",
            TaskKind::ReturnToBase => "return_to_base",
            TaskKind::Intercept => "intercept",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = CommandError;

    /// The task registry: this is the only place an external task name is
    /// turned into a `TaskKind`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "move" => Ok(TaskKind::Move),
            "patrol" => Ok(TaskKind::Patrol),
            "tail" => Ok(TaskKind::Tail),
            "hold" => Ok(TaskKind::Hold),
            "return_to_base" => Ok(TaskKind::ReturnToBase),
            "intercept" => Ok(TaskKind::Intercept),
            other => Err(CommandError::UnknownTask(other.to_string())),
        }
    }
}

/// Optional task parameters; which ones are required depends on the kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskParams {
    /// Destination point (move)
    pub target: Option<Point2<f64>>,

    /// Designated enemy (tail, intercept)
    pub target_id: Option<DroneId>,

    /// Standoff distance (tail); defaults from config when omitted
    pub distance: Option<f64>,

    /// Trajectory to fly (patrol)
    pub pattern: Option<MovePattern>,
}

impl TaskCommand {
    /// Validates parameter presence for the task kind, before any mutation.
    pub fn validate(&self) -> Result<(), CommandError> {
        let missing = |param: &'static str| CommandError::MissingParameter {
            task: self.kind,
            param,
        };
        match self.kind {
            TaskKind::Move if self.params.target.is_none() => Err(missing("target")),
            TaskKind::Patrol if self.params.pattern.is_none() => Err(missing("pattern")),
            TaskKind::Tail if self.params.target_id.is_none() => Err(missing("target_id")),
            TaskKind::Intercept if self.params.target_id.is_none() => Err(missing("target_id")),
            _ => Ok(()),
        }
    }
}

/// Errors surfaced at the command boundary.
///
/// All of these are recovered where detected: a failing command is rejected
/// whole, with zero effect on the world, and never aborts a tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// Task name not in the registry
    #[error("unknown task: {0}")]
    UnknownTask(String),

    /// Required parameter absent for the task kind
    #[error("task {task} missing required parameter {param}")]
    MissingParameter { task: TaskKind, param: &'static str },

    /// Tail/intercept target absent from the world or not an enemy
    #[error("invalid engagement target {0}")]
    InvalidTarget(DroneId),

    /// Base id not present in the world
    #[error("unknown base {0}")]
    UnknownBase(BaseId),
}

/// Summary of a command application.
///
/// `applied` counts drones actually mutated; `ignored` lists commanded ids
/// that were skipped as reference errors (absent from the world, wrong team,
/// or missing the state the task needs, e.g. no assigned base for
/// return-to-base).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandReceipt {
    pub applied: usize,
    pub ignored: Vec<DroneId>,
}

impl CommandReceipt {
    pub(crate) fn new(applied: usize, ignored: Vec<DroneId>) -> Self {
        Self { applied, ignored }
    }
}

/// An immutable, owned view of the live world for pollers.
///
/// Copied out of live state at a specific tick; never aliases buffers the
/// tick path may mutate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldView {
    pub tick: u64,
    pub drones: Vec<DroneView>,
    pub bases: Vec<BaseView>,
}

/// One drone in a `WorldView`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroneView {
    pub id: DroneId,
    pub team: Team,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub mode: DroneMode,
    pub target: Option<(f64, f64)>,
}

impl DroneView {
    pub(crate) fn of(drone: &Drone) -> Self {
        Self {
            id: drone.id,
            team: drone.team,
            x: drone.position.x,
            y: drone.position.y,
            vx: drone.velocity.x,
            vy: drone.velocity.y,
            mode: drone.mode,
            target: drone.target.map(|t| (t.x, t.y)),
        }
    }
}

/// One base in a `WorldView`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseView {
    pub id: BaseId,
    pub x: f64,
    pub y: f64,
    pub name: String,
}

impl BaseView {
    pub(crate) fn of(base: &Base) -> Self {
        Self {
            id: base.id,
            x: base.position.x,
            y: base.position.y,
            name: base.name.clone(),
        }
    }
}

impl WorldView {
    /// Builds a view of the given world.
    pub fn of(world: &WorldState) -> Self {
        Self {
            tick: world.tick,
            drones: world.drones.values().map(DroneView::of).collect(),
            bases: world.bases.values().map(BaseView::of).collect(),
        }
    }
}
