//! Fixed movement patterns for adversarial drones (and friendly patrols).
//!
//! Each pattern supports two views of the same trajectory:
//! - `step` advances the pattern one tick, mutating its internal state
//!   (direction sign after a reflection, accumulated angle), and
//! - `predict` evaluates the closed-form position at an arbitrary future
//!   time without touching any state.
//!
//! The intercept planner depends on the two agreeing: stepping a pattern N
//! times by `dt` lands on `predict(N * dt)` up to float error.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// A fixed trajectory on the plane.
///
/// Closed enum: every pattern the engine can simulate is predictable by the
/// planner, by construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovePattern {
    /// Oscillates along the x axis between `min` and `max`, reflecting
    /// instantaneously at each bound. `dir` is the current sign of travel.
    BounceX { min: f64, max: f64, dir: f64 },

    /// Oscillates along the y axis between `min` and `max`.
    BounceY { min: f64, max: f64, dir: f64 },

    /// Circles `center` at `radius`; angular rate is `speed / radius`,
    /// signed by `dir`. `angle` is the current phase in radians.
    Circle {
        center: Point2<f64>,
        radius: f64,
        angle: f64,
        dir: f64,
    },
}

impl MovePattern {
    /// Advances the pattern by `dt`, returning the new position and velocity.
    ///
    /// `position` is the drone's current position; bounce patterns move its
    /// free axis, circle patterns are fully determined by their own state.
    pub fn step(&mut self, position: Point2<f64>, speed: f64, dt: f64) -> (Point2<f64>, Vector2<f64>) {
        match self {
            MovePattern::BounceX { min, max, dir } => {
                let (x, new_dir) = fold_axis(position.x, *dir, *min, *max, speed * dt);
                *dir = new_dir;
                (
                    Point2::new(x, position.y),
                    Vector2::new(new_dir * speed, 0.0),
                )
            }
            MovePattern::BounceY { min, max, dir } => {
                let (y, new_dir) = fold_axis(position.y, *dir, *min, *max, speed * dt);
                *dir = new_dir;
                (
                    Point2::new(position.x, y),
                    Vector2::new(0.0, new_dir * speed),
                )
            }
            MovePattern::Circle {
                center,
                radius,
                angle,
                dir,
            } => {
                let omega = *dir * speed / *radius;
                *angle += omega * dt;
                let pos = *center + Vector2::new(angle.cos(), angle.sin()) * *radius;
                let vel = Vector2::new(-angle.sin(), angle.cos()) * (omega * *radius);
                (pos, vel)
            }
        }
    }

    /// Evaluates the trajectory `t` seconds ahead of `position`, without
    /// mutating the pattern.
    pub fn predict(&self, position: Point2<f64>, speed: f64, t: f64) -> Point2<f64> {
        match self {
            MovePattern::BounceX { min, max, dir } => {
                let (x, _) = fold_axis(position.x, *dir, *min, *max, speed * t);
                Point2::new(x, position.y)
            }
            MovePattern::BounceY { min, max, dir } => {
                let (y, _) = fold_axis(position.y, *dir, *min, *max, speed * t);
                Point2::new(position.x, y)
            }
            MovePattern::Circle {
                center,
                radius,
                angle,
                dir,
            } => {
                let theta = *angle + *dir * speed / *radius * t;
                *center + Vector2::new(theta.cos(), theta.sin()) * *radius
            }
        }
    }
}

/// Folds 1D travel with reflection into the `[min, max]` interval.
///
/// Returns the position after `travel` units and the direction sign at that
/// moment. A degenerate interval pins the position to `min`.
fn fold_axis(x: f64, dir: f64, min: f64, max: f64, travel: f64) -> (f64, f64) {
    let span = max - min;
    if span <= 0.0 {
        return (min, dir);
    }

    let period = 2.0 * span;
    let from_min = (x - min).clamp(0.0, span);
    let offset = if dir >= 0.0 { from_min } else { period - from_min };
    let s = (offset + travel).rem_euclid(period);

    if s <= span {
        (min + s, 1.0)
    } else {
        (min + (period - s), -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bounce_advances_at_speed() {
        let mut pattern = MovePattern::BounceX {
            min: 100.0,
            max: 300.0,
            dir: 1.0,
        };
        let (pos, vel) = pattern.step(Point2::new(100.0, 50.0), 40.0, 0.5);

        assert_relative_eq!(pos.x, 120.0);
        assert_relative_eq!(pos.y, 50.0);
        assert_relative_eq!(vel.x, 40.0);
    }

    #[test]
    fn test_bounce_reflects_at_bound() {
        let mut pattern = MovePattern::BounceX {
            min: 100.0,
            max: 300.0,
            dir: 1.0,
        };
        // 10 units short of the bound, 30 units of travel: 20 back the other way.
        let (pos, vel) = pattern.step(Point2::new(290.0, 0.0), 40.0, 0.75);

        assert_relative_eq!(pos.x, 280.0);
        assert!(vel.x < 0.0);
        assert!(matches!(pattern, MovePattern::BounceX { dir, .. } if dir < 0.0));
    }

    #[test]
    fn test_bounce_full_period_returns_home() {
        let pattern = MovePattern::BounceX {
            min: 100.0,
            max: 300.0,
            dir: 1.0,
        };
        // Period is 2 * span / speed = 400 / 40 = 10 s.
        let pos = pattern.predict(Point2::new(150.0, 0.0), 40.0, 10.0);
        assert_relative_eq!(pos.x, 150.0, epsilon = 1e-9);
    }

    #[test]
    fn test_circle_holds_radius() {
        let mut pattern = MovePattern::Circle {
            center: Point2::new(500.0, 500.0),
            radius: 100.0,
            angle: 0.0,
            dir: 1.0,
        };

        let mut pos = Point2::new(600.0, 500.0);
        for _ in 0..250 {
            let (p, _) = pattern.step(pos, 40.0, 0.02);
            pos = p;
            assert_relative_eq!((pos - Point2::new(500.0, 500.0)).norm(), 100.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_predict_matches_stepping() {
        let mut stepped = MovePattern::BounceY {
            min: 50.0,
            max: 250.0,
            dir: -1.0,
        };
        let frozen = stepped;

        let speed = 40.0;
        let dt = 0.02;
        let mut pos = Point2::new(400.0, 120.0);
        for _ in 0..500 {
            let (p, _) = stepped.step(pos, speed, dt);
            pos = p;
        }

        let predicted = frozen.predict(Point2::new(400.0, 120.0), speed, 500.0 * dt);
        assert_relative_eq!(pos.y, predicted.y, epsilon = 1e-6);
        assert_relative_eq!(pos.x, predicted.x);
    }

    #[test]
    fn test_degenerate_bounce_is_stationary() {
        let pattern = MovePattern::BounceX {
            min: 200.0,
            max: 200.0,
            dir: 1.0,
        };
        let pos = pattern.predict(Point2::new(200.0, 80.0), 40.0, 7.3);
        assert_relative_eq!(pos.x, 200.0);
    }
}
