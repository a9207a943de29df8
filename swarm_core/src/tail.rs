//! Tail controller - dead-zone proportional standoff keeping.
//!
//! A tailing drone holds a fixed separation from its (possibly moving)
//! target. Inside the dead zone it parks; outside it moves along the line to
//! the target at full speed, toward when too far, away when too close. Each
//! tailer is controlled independently; several drones tailing one target
//! converge on the same ring and may overlap, which is accepted.

use nalgebra::Point2;

use crate::world::{clamp_to_bounds, Drone, SimConfig};

/// Advances a tailing drone one tick against the target's current position.
pub(crate) fn update(drone: &mut Drone, target_position: Point2<f64>, speed: f64, config: &SimConfig) {
    let to_target = target_position - drone.position;
    let distance = to_target.norm();
    let error = distance - drone.tail_distance;

    if error.abs() <= config.tail_deadzone {
        drone.halt();
        return;
    }

    // Degenerate overlap with the target: no usable bearing, hold until the
    // target moves off.
    if distance <= f64::EPSILON {
        drone.halt();
        return;
    }

    let along = to_target / distance;
    let sign = if error > 0.0 { 1.0 } else { -1.0 };
    drone.velocity = along * (sign * speed);
    drone.position = clamp_to_bounds(drone.position + drone.velocity * config.dt, config);
}

/// Convenience for tests and callers: current separation error.
#[allow(dead_code)]
pub(crate) fn standoff_error(drone: &Drone, target_position: Point2<f64>) -> f64 {
    (target_position - drone.position).norm() - drone.tail_distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{DroneId, DroneMode, Team};
    use approx::assert_relative_eq;

    fn tailer(position: Point2<f64>, standoff: f64) -> Drone {
        let mut drone = Drone::new(DroneId(1), Team::Friendly, position, 6.0);
        drone.mode = DroneMode::Tailing;
        drone.tail_target = Some(DroneId(9));
        drone.tail_distance = standoff;
        drone
    }

    #[test]
    fn test_closes_when_too_far() {
        let config = SimConfig::default();
        let mut drone = tailer(Point2::new(0.0, 0.0), 50.0);
        let target = Point2::new(200.0, 0.0);

        update(&mut drone, target, 200.0, &config);

        assert!(drone.velocity.x > 0.0);
        assert_relative_eq!(drone.position.x, 4.0);
    }

    #[test]
    fn test_backs_off_when_too_close() {
        let config = SimConfig::default();
        let mut drone = tailer(Point2::new(180.0, 0.0), 50.0);
        let target = Point2::new(200.0, 0.0);

        update(&mut drone, target, 200.0, &config);

        assert!(drone.velocity.x < 0.0);
        assert_relative_eq!(drone.position.x, 176.0);
    }

    #[test]
    fn test_dead_zone_is_idempotent() {
        let config = SimConfig::default();
        // 51.5 units out with a 50-unit standoff: |error| = 1.5 <= 2.0.
        let mut drone = tailer(Point2::new(148.5, 0.0), 50.0);
        let target = Point2::new(200.0, 0.0);

        for _ in 0..100 {
            update(&mut drone, target, 200.0, &config);
            assert_relative_eq!(drone.velocity.norm(), 0.0);
            assert_relative_eq!(drone.position.x, 148.5);
        }
    }

    #[test]
    fn test_converges_into_dead_zone() {
        let config = SimConfig::default();
        let mut drone = tailer(Point2::new(0.0, 0.0), 50.0);
        let target = Point2::new(300.0, 0.0);

        for _ in 0..200 {
            update(&mut drone, target, 200.0, &config);
        }

        let error = standoff_error(&drone, target);
        assert!(
            error.abs() <= config.tail_deadzone,
            "error {error} outside dead zone"
        );
    }
}
