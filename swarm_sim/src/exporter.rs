//! JSON exporter for external visualization.
//!
//! Dumps periodic world views as plain JSON so a viewer (or a notebook) can
//! replay a run frame by frame.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

use swarm_core::{DroneMode, Team, WorldView};

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    /// Tick the frame was captured at
    pub tick: u64,

    /// All live drones
    pub drones: Vec<DroneFrame>,
}

/// One drone in a frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroneFrame {
    pub id: u32,
    pub team: Team,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub mode: DroneMode,
}

impl SimFrame {
    /// Builds a frame from a world view.
    pub fn from_view(view: &WorldView, dt: f64) -> Self {
        Self {
            time_sec: view.tick as f64 * dt,
            tick: view.tick,
            drones: view
                .drones
                .iter()
                .map(|d| DroneFrame {
                    id: d.id.0,
                    team: d.team,
                    x: d.x,
                    y: d.y,
                    vx: d.vx,
                    vy: d.vy,
                    mode: d.mode,
                })
                .collect(),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final result
    pub passed: bool,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool) {
        self.passed = passed;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
