//! Swarm Core - Deterministic Drone Swarm Simulation Engine
//!
//! A fixed-timestep simulation of friendly and enemy drones on a bounded 2D
//! plane, driven entirely by structured operator commands:
//!
//! 1. **Behavior controllers**: direct movement, predictive interception of
//!    patterned enemies, and dead-zone standoff tailing, selected per drone
//!    by its mode.
//! 2. **Shared fate**: destructive friendly/enemy proximity collisions and
//!    synchronized group arrival with grid dispersal.
//! 3. **Rewindable time**: a bounded ring of deep world snapshots supporting
//!    pause, reverse playback, and jump-back with forward resume.
//!
//! The engine is single-writer by construction: one `WorldState` aggregate,
//! one `&mut` tick path, no ambient globals, no wall-clock input.

pub mod collision;
pub mod command;
pub mod engine;
pub mod formation;
pub mod history;
pub mod intercept;
pub mod movement;
pub mod patterns;
pub mod tail;
pub mod world;

// Re-export key types for convenience
pub use command::{Command, CommandError, CommandReceipt, TaskCommand, TaskKind, TaskParams, TimeDirection, WorldView};
pub use engine::{ClockState, SimulationEngine};
pub use history::{History, HistorySnapshot};
pub use intercept::{EnemyObservation, InterceptSolution};
pub use patterns::MovePattern;
pub use world::{Base, BaseId, BaseShape, CommandGroup, Drone, DroneId, DroneMode, GroupId, SimConfig, Team, WorldState};
