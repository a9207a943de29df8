//! Movement controller - constant-speed advance toward an assigned target.
//!
//! Drives drones in `Moving` and `Returning` mode. Motion is constant-speed
//! until the arrival threshold is crossed; the final step snaps to the target,
//! which can overshoot by at most `speed * dt - threshold`. That is an
//! accepted approximation, not a bug.

use crate::world::{clamp_to_bounds, Drone, DroneMode, SimConfig};

/// Advances a moving drone one tick. Returns `true` if the drone arrived
/// at its target on this tick.
///
/// On arrival the drone snaps to the target and halts. Ungrouped drones
/// (and all `Returning` drones, which are never grouped) transition to
/// `Idle`; grouped drones stay `Moving` until their group resolves, and the
/// caller records the arrival with the grouping coordinator.
pub(crate) fn update(drone: &mut Drone, speed: f64, config: &SimConfig) -> bool {
    let target = match drone.target {
        Some(target) => target,
        None => {
            // Nothing to steer at; settle down.
            drone.mode = DroneMode::Idle;
            drone.halt();
            return false;
        }
    };

    let to_target = target - drone.position;
    let distance = to_target.norm();

    if distance <= config.arrival_threshold {
        drone.position = target;
        drone.halt();
        if drone.group.is_none() {
            drone.mode = DroneMode::Idle;
            drone.target = None;
        }
        return true;
    }

    drone.velocity = to_target * (speed / distance);
    drone.position = clamp_to_bounds(drone.position + drone.velocity * config.dt, config);
    false
}
