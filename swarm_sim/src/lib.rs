//! Swarm Sim - Deterministic scenario harness for the swarm engine
//!
//! This crate drives `swarm_core` exactly the way a front end would: every
//! scenario constructs a world, pushes structured commands through the
//! engine's boundary, ticks it at the fixed rate, and asserts the observable
//! contract (arrival timing, dispersal atomicity, rendezvous feasibility,
//! standoff holding, collision fate, history replay).
//!
//! Determinism comes from two places:
//! - the engine itself consumes no randomness and no wall clock, and
//! - every randomized placement here derives from a single 64-bit seed,
//!   so any failing run is reproducible by its seed number.

pub mod exporter;
pub mod runner;
pub mod scenarios;

pub use exporter::{DroneFrame, SimExport, SimFrame};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
