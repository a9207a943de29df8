//! Named test scenarios for the swarm engine.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SWM-001: single-drone rally to a point, arrival timing
    RallyPoint,

    /// SWM-002: synchronized group arrival and grid dispersal
    GroupDispersal,

    /// SWM-003: intercept of a bouncing enemy
    BounceIntercept,

    /// SWM-004: intercept of a circling enemy
    CircleIntercept,

    /// SWM-005: standoff tailing of a moving enemy
    Standoff,

    /// SWM-006: head-on collision destruction and survivor integrity
    CollisionSweep,

    /// SWM-007: pause, reverse playback, forward resume
    Rewind,

    /// SWM-008: bounded history and jump-back replay
    JumpBack,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::RallyPoint,
            ScenarioId::GroupDispersal,
            ScenarioId::BounceIntercept,
            ScenarioId::CircleIntercept,
            ScenarioId::Standoff,
            ScenarioId::CollisionSweep,
            ScenarioId::Rewind,
            ScenarioId::JumpBack,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::RallyPoint => "rally_point",
            ScenarioId::GroupDispersal => "group_dispersal",
            ScenarioId::BounceIntercept => "bounce_intercept",
            ScenarioId::CircleIntercept => "circle_intercept",
            ScenarioId::Standoff => "standoff",
            ScenarioId::CollisionSweep => "collision_sweep",
            ScenarioId::Rewind => "rewind",
            ScenarioId::JumpBack => "jump_back",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::RallyPoint => "Single drone rally: arrival within the tick bound",
            ScenarioId::GroupDispersal => "Group move: nobody disperses before the last arrival",
            ScenarioId::BounceIntercept => "Planner rendezvous against a 1D bounce pattern",
            ScenarioId::CircleIntercept => "Planner rendezvous against a circular pattern",
            ScenarioId::Standoff => "Tail controller holds the standoff ring",
            ScenarioId::CollisionSweep => "Colliding pair destroyed, bystander untouched",
            ScenarioId::Rewind => "Reverse playback restores recorded states",
            ScenarioId::JumpBack => "FIFO eviction arithmetic and jump-back restore",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rally_point" | "rallypoint" | "swm-001" => Ok(ScenarioId::RallyPoint),
            "group_dispersal" | "groupdispersal" | "swm-002" => Ok(ScenarioId::GroupDispersal),
            "bounce_intercept" | "bounceintercept" | "swm-003" => Ok(ScenarioId::BounceIntercept),
            "circle_intercept" | "circleintercept" | "swm-004" => Ok(ScenarioId::CircleIntercept),
            "standoff" | "swm-005" => Ok(ScenarioId::Standoff),
            "collision_sweep" | "collisionsweep" | "swm-006" => Ok(ScenarioId::CollisionSweep),
            "rewind" | "swm-007" => Ok(ScenarioId::Rewind),
            "jump_back" | "jumpback" | "swm-008" => Ok(ScenarioId::JumpBack),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
