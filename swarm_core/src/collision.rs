//! Collision resolver - destructive proximity contacts between teams.
//!
//! Runs once per tick after every behavior controller. Qualifying pairs are
//! collected over the full scan before anything is removed, so detection
//! order never sees a half-updated world; removal itself is a mark-then-sweep
//! pass over the drone map.

use std::collections::BTreeSet;

use tracing::debug;

use crate::world::{DroneId, DroneMode, Team, WorldState};

/// One destructive contact applied this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Destruction {
    pub friendly: DroneId,
    pub enemy: DroneId,
    pub distance: f64,
}

/// Detects and applies all destructive collisions for this tick.
///
/// A (friendly, enemy) pair qualifies when their separation is below the sum
/// of their radii. A drone qualifying against several partners is destroyed
/// exactly once: candidate pairs are ranked nearest-first, with ascending id
/// pairs as the final deterministic tie-break, and each drone is claimed by
/// the first pair that reaches it.
pub(crate) fn resolve(world: &mut WorldState) -> Vec<Destruction> {
    let mut candidates: Vec<Destruction> = Vec::new();

    for friendly in world.drones.values().filter(|d| d.team == Team::Friendly) {
        for enemy in world.drones.values().filter(|d| d.team == Team::Enemy) {
            let distance = (enemy.position - friendly.position).norm();
            if distance < friendly.radius + enemy.radius {
                candidates.push(Destruction {
                    friendly: friendly.id,
                    enemy: enemy.id,
                    distance,
                });
            }
        }
    }

    if candidates.is_empty() {
        return Vec::new();
    }

    candidates.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.friendly.cmp(&b.friendly))
            .then(a.enemy.cmp(&b.enemy))
    });

    let mut claimed: BTreeSet<DroneId> = BTreeSet::new();
    let mut applied: Vec<Destruction> = Vec::new();
    for candidate in candidates {
        if claimed.contains(&candidate.friendly) || claimed.contains(&candidate.enemy) {
            continue;
        }
        claimed.insert(candidate.friendly);
        claimed.insert(candidate.enemy);
        applied.push(candidate);
    }

    // Mark, then sweep.
    for destruction in &applied {
        debug!(
            friendly = %destruction.friendly,
            enemy = %destruction.enemy,
            distance = destruction.distance,
            "collision"
        );
        for id in [destruction.friendly, destruction.enemy] {
            if let Some(drone) = world.drones.get_mut(&id) {
                drone.mode = DroneMode::Destroyed;
            }
        }
    }
    world.drones.retain(|_, d| d.mode != DroneMode::Destroyed);

    cascade_removals(world, &claimed);

    applied
}

/// Propagates destruction side effects: group membership shrinks (empty
/// groups are discarded) and survivors lose any tail/intercept linkage that
/// pointed at a destroyed drone.
fn cascade_removals(world: &mut WorldState, destroyed: &BTreeSet<DroneId>) {
    for group in world.groups.values_mut() {
        for id in destroyed {
            group.remove_member(*id);
        }
    }
    world.groups.retain(|_, g| !g.members.is_empty());

    for drone in world.drones.values_mut() {
        let tail_gone = drone.tail_target.is_some_and(|id| destroyed.contains(&id));
        let intercept_gone = drone.intercept_target.is_some_and(|id| destroyed.contains(&id));
        if tail_gone || intercept_gone {
            drone.clear_engagement();
            drone.mode = DroneMode::Idle;
            drone.halt();
        }
    }
}
