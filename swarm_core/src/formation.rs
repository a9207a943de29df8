//! Formation / grouping coordinator - synchronized multi-drone arrivals.
//!
//! Drones issued one move command share a group. The group holds every
//! member in `Moving` until all survivors have independently reached the
//! shared destination; only then does it disperse them onto a square grid of
//! per-drone sub-targets centered on that destination.

use std::collections::BTreeSet;

use nalgebra::{Point2, Vector2};
use tracing::debug;

use crate::world::{CommandGroup, DroneId, DroneMode, GroupId, SimConfig, Team, WorldState};

/// Creates a group over the given drone ids and points every member at the
/// destination.
///
/// Only live friendly drones join; other ids are reference errors, returned
/// for the caller's receipt. Drones already in a group are pulled out of the
/// old one (membership only ever shrinks; an emptied group is discarded).
/// Returns `None` when no id was applicable.
pub(crate) fn create_group(
    world: &mut WorldState,
    drone_ids: &[DroneId],
    destination: Point2<f64>,
) -> (Option<GroupId>, Vec<DroneId>, Vec<DroneId>) {
    let mut joined: Vec<DroneId> = Vec::new();
    let mut ignored: Vec<DroneId> = Vec::new();

    for &id in drone_ids {
        match world.drones.get(&id) {
            Some(drone) if drone.team == Team::Friendly => joined.push(id),
            _ => ignored.push(id),
        }
    }
    joined.sort_unstable();
    joined.dedup();

    if joined.is_empty() {
        return (None, joined, ignored);
    }

    let group_id = world.allocate_group_id();

    for &id in &joined {
        let previous = match world.drones.get_mut(&id) {
            Some(drone) => {
                drone.clear_engagement();
                drone.pattern = None;
                drone.target = Some(destination);
                drone.mode = DroneMode::Moving;
                drone.group.replace(group_id)
            }
            None => None,
        };
        if let Some(old) = previous {
            release_member(world, old, id);
        }
    }

    let members: BTreeSet<DroneId> = joined.iter().copied().collect();
    world
        .groups
        .insert(group_id, CommandGroup::new(group_id, destination, members));

    debug!(group = %group_id, members = joined.len(), "group formed");
    (Some(group_id), joined, ignored)
}

/// Records one member's arrival at the group destination.
pub(crate) fn record_arrival(world: &mut WorldState, group_id: GroupId, drone_id: DroneId) {
    if let Some(group) = world.groups.get_mut(&group_id) {
        if group.members.contains(&drone_id) {
            group.arrived.insert(drone_id);
        }
    }
}

/// Resolves fully-arrived groups into grid formations.
///
/// Runs once per tick after collision resolution. Each resolved group lays
/// its surviving members out on a square grid centered on the destination
/// and hands every member an individual sub-target; the group itself is
/// discarded.
pub(crate) fn resolve_groups(world: &mut WorldState, config: &SimConfig) -> Vec<GroupId> {
    let resolved: Vec<GroupId> = world
        .groups
        .values()
        .filter(|g| g.is_resolved())
        .map(|g| g.id)
        .collect();

    for group_id in &resolved {
        let group = match world.groups.remove(group_id) {
            Some(group) => group,
            None => continue,
        };

        let slots = grid_slots(group.destination, group.members.len(), config.formation_spacing);
        for (id, slot) in group.members.iter().zip(slots) {
            if let Some(drone) = world.drones.get_mut(id) {
                drone.group = None;
                drone.target = Some(slot);
                drone.mode = DroneMode::Moving;
            }
        }
        debug!(group = %group_id, members = group.members.len(), "group dispersed");
    }

    resolved
}

/// Detaches a drone from a group it is leaving (reassignment or
/// destruction); discards the group if that empties it.
pub(crate) fn release_member(world: &mut WorldState, group_id: GroupId, drone_id: DroneId) {
    if let Some(group) = world.groups.get_mut(&group_id) {
        group.remove_member(drone_id);
        if group.members.is_empty() {
            world.groups.remove(&group_id);
        }
    }
}

/// Row-major square grid of `count` slots centered on `origin`.
pub fn grid_slots(origin: Point2<f64>, count: usize, spacing: f64) -> Vec<Point2<f64>> {
    if count == 0 {
        return Vec::new();
    }

    let cols = (count as f64).sqrt().ceil() as usize;
    let rows = count.div_ceil(cols);
    let half_width = (cols - 1) as f64 / 2.0;
    let half_height = (rows - 1) as f64 / 2.0;

    (0..count)
        .map(|i| {
            let col = (i % cols) as f64;
            let row = (i / cols) as f64;
            origin + Vector2::new((col - half_width) * spacing, (row - half_height) * spacing)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn world_with_friendlies(config: &SimConfig, count: usize) -> WorldState {
        let mut world = WorldState::new();
        for i in 0..count {
            world.spawn_drone(
                Team::Friendly,
                Point2::new(100.0 + 50.0 * i as f64, 100.0),
                config.drone_radius,
            );
        }
        world
    }

    #[test]
    fn test_create_group_ignores_unknown_ids() {
        let config = SimConfig::default();
        let mut world = world_with_friendlies(&config, 2);

        let (group_id, joined, ignored) = create_group(
            &mut world,
            &[DroneId(1), DroneId(2), DroneId(99)],
            Point2::new(600.0, 400.0),
        );

        assert!(group_id.is_some());
        assert_eq!(joined, vec![DroneId(1), DroneId(2)]);
        assert_eq!(ignored, vec![DroneId(99)]);
        assert!(world
            .drones
            .values()
            .all(|d| d.mode == DroneMode::Moving && d.target == Some(Point2::new(600.0, 400.0))));
    }

    #[test]
    fn test_recommand_moves_drone_between_groups() {
        let config = SimConfig::default();
        let mut world = world_with_friendlies(&config, 2);

        let (first, ..) = create_group(&mut world, &[DroneId(1), DroneId(2)], Point2::new(600.0, 400.0));
        let first = first.unwrap();
        let (second, ..) = create_group(&mut world, &[DroneId(2)], Point2::new(200.0, 800.0));
        let second = second.unwrap();

        // Drone 2 left the first group; drone 1 still gates it alone.
        let old = world.groups.get(&first).expect("first group survives");
        assert_eq!(old.members.len(), 1);
        assert!(old.members.contains(&DroneId(1)));
        assert_eq!(world.drone(DroneId(2)).unwrap().group, Some(second));
    }

    #[test]
    fn test_no_dispersal_until_all_arrive() {
        let config = SimConfig::default();
        let mut world = world_with_friendlies(&config, 3);
        let (group_id, ..) = create_group(
            &mut world,
            &[DroneId(1), DroneId(2), DroneId(3)],
            Point2::new(500.0, 500.0),
        );
        let group_id = group_id.unwrap();

        record_arrival(&mut world, group_id, DroneId(1));
        record_arrival(&mut world, group_id, DroneId(2));
        let resolved = resolve_groups(&mut world, &config);

        assert!(resolved.is_empty());
        assert!(world.groups.contains_key(&group_id));
        assert!(world.drones.values().all(|d| d.mode == DroneMode::Moving));

        record_arrival(&mut world, group_id, DroneId(3));
        let resolved = resolve_groups(&mut world, &config);

        assert_eq!(resolved, vec![group_id]);
        assert!(world.groups.is_empty());
        // Every member now owns a distinct grid sub-target.
        let targets: Vec<_> = world.drones.values().filter_map(|d| d.target).collect();
        assert_eq!(targets.len(), 3);
        for (i, a) in targets.iter().enumerate() {
            for b in targets.iter().skip(i + 1) {
                assert!((a - b).norm() > 0.0);
            }
        }
    }

    #[test]
    fn test_survivors_disperse_after_member_destroyed() {
        let config = SimConfig::default();
        let mut world = world_with_friendlies(&config, 3);
        let (group_id, ..) = create_group(
            &mut world,
            &[DroneId(1), DroneId(2), DroneId(3)],
            Point2::new(500.0, 500.0),
        );
        let group_id = group_id.unwrap();

        // Drone 3 dies en route.
        world.drones.remove(&DroneId(3));
        release_member(&mut world, group_id, DroneId(3));

        record_arrival(&mut world, group_id, DroneId(1));
        record_arrival(&mut world, group_id, DroneId(2));
        let resolved = resolve_groups(&mut world, &config);

        assert_eq!(resolved, vec![group_id]);
    }

    #[test]
    fn test_grid_slots_centered_square() {
        let slots = grid_slots(Point2::new(100.0, 100.0), 4, 12.0);

        assert_eq!(slots.len(), 4);
        // 2x2 grid straddling the destination.
        assert_relative_eq!(slots[0].x, 94.0);
        assert_relative_eq!(slots[0].y, 94.0);
        assert_relative_eq!(slots[3].x, 106.0);
        assert_relative_eq!(slots[3].y, 106.0);

        // Centroid lands on the destination.
        let centroid = slots
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + p.coords)
            / slots.len() as f64;
        assert_relative_eq!(centroid.x, 100.0);
        assert_relative_eq!(centroid.y, 100.0);
    }

    #[test]
    fn test_grid_slots_single_drone_sits_on_destination() {
        let slots = grid_slots(Point2::new(250.0, 250.0), 1, 12.0);
        assert_eq!(slots, vec![Point2::new(250.0, 250.0)]);
    }
}
