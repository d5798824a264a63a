use log::debug;
use std::collections::{HashMap, VecDeque};

use super::expand::{self, Side};
use super::SearchContext;
use crate::position::PositionId;
use crate::transport::{Teleport, TeleportCatalog};

/// Teleports landing fewer than this many walking steps from the start are skipped.
pub const TELEPORT_MIN_WALK: u32 = 20;

/// Walking steps from `from` to `to` over the grid alone, if fewer than `limit`.
pub fn short_walk(ctx: &SearchContext<'_>, from: PositionId, to: PositionId, limit: u32) -> Option<u32> {
    if from == to {
        return Some(0);
    }
    match from.chebyshev(to) {
        Some(d) if d < limit => {}
        _ => return None,
    }

    let mut depth: HashMap<PositionId, u32> = HashMap::new();
    let mut queue = VecDeque::new();
    depth.insert(from, 0);
    queue.push_back(from);
    while let Some(pos) = queue.pop_front() {
        let next_depth = depth.get(&pos).copied().unwrap_or(0) + 1;
        if next_depth >= limit {
            continue;
        }
        let mut found = false;
        expand::for_each_grid_neighbour(ctx, pos, Side::Forward, |n| {
            if depth.contains_key(&n) {
                return;
            }
            depth.insert(n, next_depth);
            if n == to {
                found = true;
            }
            queue.push_back(n);
        });
        if found {
            return Some(next_depth);
        }
    }
    None
}

/// Enabled teleports worth seeding from `ctx.start`: those whose destination is not
/// already within a short walk.
pub fn admit_teleports(ctx: &SearchContext<'_>, catalog: &TeleportCatalog) -> Vec<Teleport> {
    catalog.usable_from(|t| match short_walk(ctx, ctx.start, t.destination, TELEPORT_MIN_WALK) {
        Some(steps) => {
            debug!("skipping teleport '{}': destination is {} steps away on foot", t.name, steps);
            false
        }
        None => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{DirectionFlags, WorldCollisionMap};
    use crate::transport::{Blacklist, TransportGraph};

    fn p(x: u16, y: u16) -> PositionId { PositionId::new(x, y, 0) }

    fn teleport(id: u64, destination: PositionId) -> Teleport {
        Teleport { id, name: format!("tp{}", id), destination }
    }

    #[test]
    fn short_walk_counts_steps_up_to_the_limit() {
        let mut world = WorldCollisionMap::new();
        world.open_area(0, 0, 40, 1, 0);
        let transports = TransportGraph::new();
        let blacklist = Blacklist::new();
        let ctx = SearchContext::new(p(0, 0), &transports, &blacklist).with_world(&world);
        assert_eq!(short_walk(&ctx, p(0, 0), p(0, 0), 20), Some(0));
        assert_eq!(short_walk(&ctx, p(0, 0), p(5, 0), 20), Some(5));
        assert_eq!(short_walk(&ctx, p(0, 0), p(19, 0), 20), Some(19));
        assert_eq!(short_walk(&ctx, p(0, 0), p(20, 0), 20), None);
        assert_eq!(short_walk(&ctx, p(0, 0), PositionId::new(5, 0, 1), 20), None);
    }

    #[test]
    fn nearby_destinations_are_not_admitted() {
        let mut world = WorldCollisionMap::new();
        world.open_area(0, 0, 40, 3, 0);
        // full-height wall at x = 10
        for y in 0..3 {
            world.set(p(10, y), DirectionFlags::NONE);
        }
        let world = world.reconciled();
        let transports = TransportGraph::new();
        let blacklist = Blacklist::new();
        let ctx = SearchContext::new(p(2, 1), &transports, &blacklist).with_world(&world);

        let catalog = TeleportCatalog::new(vec![
            teleport(1, p(4, 1)),
            teleport(2, p(11, 1)),
            teleport(3, p(300, 300)),
        ]);
        let ids: Vec<u64> = admit_teleports(&ctx, &catalog).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
