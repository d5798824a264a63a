use std::collections::HashSet;

use super::{SearchContext, SearchFailure, Target};
use crate::collision::{CollisionMap, Direction};
use crate::position::{is_local_addressing, PositionId};
use crate::transport::Transport;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Side {
    Forward,
    Backward,
}

/// Collision provider responsible for `pos`, if it may be expanded at all.
pub(crate) fn collision_at<'a>(ctx: &SearchContext<'a>, pos: PositionId) -> Option<&'a dyn CollisionMap> {
    if is_local_addressing(pos) {
        if ctx.in_instance { ctx.local } else { None }
    } else {
        ctx.world
    }
}

/// Grid neighbours of `pos` for one side. Forward: moves out of `pos`.
/// Backward: tiles that can move into `pos`.
///
/// Both sides only walk the directions open out of `pos`; the backward side then keeps
/// the neighbours whose opposite move is also open. A one-way move into `pos` from a
/// tile that `pos` cannot step back to is therefore not listed. Maps loaded with
/// reconciliation have no such moves; unreconciled maps may lose them.
pub(crate) fn for_each_grid_neighbour<F>(ctx: &SearchContext<'_>, pos: PositionId, side: Side, mut f: F)
where
    F: FnMut(PositionId),
{
    let Some(map) = collision_at(ctx, pos) else { return };
    let flags = map.all_directions(pos.x() as i32, pos.y() as i32, pos.plane());
    if flags.is_none() {
        return;
    }
    for dir in flags.iter() {
        let (dx, dy) = dir.delta();
        let Some(next) = pos.offset(dx, dy) else { continue };
        if side == Side::Backward && !can_step(ctx, next, dir.opposite()) {
            continue;
        }
        f(next);
    }
}

fn can_step(ctx: &SearchContext<'_>, from: PositionId, dir: Direction) -> bool {
    collision_at(ctx, from)
        .map(|m| m.passable(from.x() as i32, from.y() as i32, from.plane(), dir))
        .unwrap_or(false)
}

/// Transport neighbours as (neighbour, edge). Backward follows edges arriving at `pos`.
pub(crate) fn transport_neighbours<'a>(
    ctx: &SearchContext<'a>,
    pos: PositionId,
    side: Side,
) -> impl Iterator<Item = (PositionId, Transport)> + 'a {
    let edges = match side {
        Side::Forward => ctx.transports.edges_from(pos),
        Side::Backward => ctx.transports.edges_into(pos),
    };
    let blacklist = ctx.blacklist;
    edges.iter().filter_map(move |t| {
        let next = match side {
            Side::Forward => t.destination,
            Side::Backward => t.source,
        };
        if blacklist.contains(next) { None } else { Some((next, *t)) }
    })
}

/// `|dx| + |dy| + 100·|dplane|`. Overestimates diagonal distance, so the first
/// meeting is not guaranteed to be on a shortest path.
pub(crate) fn heuristic(a: PositionId, b: PositionId) -> u32 {
    let dx = (a.x() as i32 - b.x() as i32).unsigned_abs();
    let dy = (a.y() as i32 - b.y() as i32).unsigned_abs();
    let dz = (a.plane() as i32 - b.plane() as i32).unsigned_abs();
    dx + dy + 100 * dz
}

pub(crate) fn heuristic_to_any(pos: PositionId, goals: &[PositionId]) -> u32 {
    goals.iter().map(|g| heuristic(pos, *g)).min().unwrap_or(0)
}

/// `max(|dx|, |dy|) + 100·|dplane|`; exact for diagonal moves on an open grid.
pub(crate) fn chebyshev_heuristic(a: PositionId, b: PositionId) -> u32 {
    let dx = (a.x() as i32 - b.x() as i32).unsigned_abs();
    let dy = (a.y() as i32 - b.y() as i32).unsigned_abs();
    let dz = (a.plane() as i32 - b.plane() as i32).unsigned_abs();
    dx.max(dy) + 100 * dz
}

/// Goal seeds a one-sided search may stop at: not blacklisted and walkable.
pub(crate) fn reachable_goals(ctx: &SearchContext<'_>, target: &Target) -> HashSet<PositionId> {
    target
        .seeds()
        .iter()
        .copied()
        .filter(|&p| !ctx.blacklist.contains(p))
        .filter(|&p| collision_at(ctx, p).map(|m| m.walkable(p)).unwrap_or(false))
        .collect()
}

/// Checks shared by both strategies before any expansion.
pub(crate) fn validate(ctx: &SearchContext<'_>, target: &Target) -> Result<(), SearchFailure> {
    if ctx.world.is_none() {
        return Err(SearchFailure::NoCollisionData);
    }
    match target {
        Target::Area(seeds) if seeds.is_empty() => Err(SearchFailure::EmptyTarget),
        Target::Point(goal) => {
            let walkable = collision_at(ctx, *goal).map(|m| m.walkable(*goal)).unwrap_or(false);
            if walkable { Ok(()) } else { Err(SearchFailure::TargetBlocked) }
        }
        Target::Area(_) => Ok(()),
    }
}

/// Start plus every teleport destination, deduplicated, blacklisted seeds dropped.
pub(crate) fn forward_seeds(ctx: &SearchContext<'_>) -> Vec<PositionId> {
    let mut seeds = Vec::with_capacity(1 + ctx.teleports.len());
    for pos in std::iter::once(ctx.start).chain(ctx.teleports.iter().map(|t| t.destination)) {
        if !ctx.blacklist.contains(pos) && !seeds.contains(&pos) {
            seeds.push(pos);
        }
    }
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{DirectionFlags, WorldCollisionMap};
    use crate::transport::{Blacklist, TransportGraph};

    #[test]
    fn heuristic_weights_planes() {
        let a = PositionId::new(10, 10, 0);
        assert_eq!(heuristic(a, PositionId::new(13, 6, 0)), 7);
        assert_eq!(heuristic(a, PositionId::new(10, 10, 2)), 200);
        assert_eq!(heuristic_to_any(a, &[PositionId::new(20, 20, 0), PositionId::new(11, 10, 0)]), 1);
        assert_eq!(chebyshev_heuristic(a, PositionId::new(13, 6, 0)), 4);
        assert_eq!(chebyshev_heuristic(a, PositionId::new(11, 11, 1)), 101);
    }

    #[test]
    fn backward_neighbours_need_a_move_into_pos() {
        let mut world = WorldCollisionMap::new();
        let pos = PositionId::new(10, 10, 0);
        let east = PositionId::new(11, 10, 0);
        world.set(pos, [Direction::East].into_iter().collect());
        world.set(east, DirectionFlags::NONE);
        let transports = TransportGraph::new();
        let blacklist = Blacklist::new();
        let ctx = SearchContext::new(pos, &transports, &blacklist).with_world(&world);

        let mut fwd = Vec::new();
        for_each_grid_neighbour(&ctx, pos, Side::Forward, |n| fwd.push(n));
        assert_eq!(fwd, vec![east]);
        let mut bwd = Vec::new();
        for_each_grid_neighbour(&ctx, pos, Side::Backward, |n| bwd.push(n));
        assert!(bwd.is_empty());
    }

    #[test]
    fn one_way_entry_is_missed_on_unreconciled_maps() {
        // west can step east into pos, but pos has no westward move back
        let mut world = WorldCollisionMap::new();
        let pos = PositionId::new(10, 10, 0);
        let west = PositionId::new(9, 10, 0);
        world.set(west, [Direction::East].into_iter().collect());
        world.set(pos, [Direction::North].into_iter().collect());
        world.set(PositionId::new(10, 11, 0), [Direction::South].into_iter().collect());
        let transports = TransportGraph::new();
        let blacklist = Blacklist::new();

        let ctx = SearchContext::new(west, &transports, &blacklist).with_world(&world);
        let mut bwd = Vec::new();
        for_each_grid_neighbour(&ctx, pos, Side::Backward, |n| bwd.push(n));
        assert_eq!(bwd, vec![PositionId::new(10, 11, 0)]);

        let mut fwd = Vec::new();
        for_each_grid_neighbour(&ctx, west, Side::Forward, |n| fwd.push(n));
        assert_eq!(fwd, vec![pos]);

        // reconciliation drops the one-way move, so both sides agree again
        let reconciled = world.reconciled();
        let ctx = SearchContext::new(west, &transports, &blacklist).with_world(&reconciled);
        let mut fwd = Vec::new();
        for_each_grid_neighbour(&ctx, west, Side::Forward, |n| fwd.push(n));
        assert!(fwd.is_empty());
    }

    #[test]
    fn local_positions_need_an_instance() {
        let world = WorldCollisionMap::new();
        let transports = TransportGraph::new();
        let blacklist = Blacklist::new();
        let ctx = SearchContext::new(PositionId::new(6500, 10, 0), &transports, &blacklist).with_world(&world);
        assert!(collision_at(&ctx, PositionId::new(6500, 10, 0)).is_none());
        assert!(collision_at(&ctx, PositionId::new(3200, 10, 0)).is_some());
    }
}
