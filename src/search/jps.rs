use log::debug;
use std::collections::HashSet;

use super::assemble::trace;
use super::cache::SearchCache;
use super::expand::{self, Side};
use super::frontier::PriorityFrontier;
use super::{PathFinder, Route, SearchContext, SearchFailure, SearchStats, Target};
use crate::position::PositionId;

/// One-sided A* under the Chebyshev heuristic, registered as `jps`.
///
/// Successors are the immediate grid neighbours and transports; no jump pruning is
/// applied, so every walking step of the result is a single tile. Unlike the
/// bidirectional strategies the goal test happens when a position is closed, so on
/// a grid without transports the path is a shortest one.
#[derive(Copy, Clone, Debug, Default)]
pub struct Jps;

fn estimate(pos: PositionId, goals: &[PositionId]) -> u32 {
    goals.iter().map(|g| expand::chebyshev_heuristic(pos, *g)).min().unwrap_or(0)
}

impl PathFinder for Jps {
    fn name(&self) -> &'static str { "jps" }

    fn search(&self, ctx: &SearchContext<'_>, target: &Target, stats: &mut SearchStats) -> Result<Route, SearchFailure> {
        expand::validate(ctx, target)?;
        let goal_set = expand::reachable_goals(ctx, target);
        let goals: Vec<PositionId> = goal_set.iter().copied().collect();
        let capacity = ctx.limits.initial_capacity;
        let mut cache = SearchCache::with_capacity(capacity);
        let mut frontier = PriorityFrontier::with_capacity(capacity);
        let mut closed: HashSet<PositionId> = HashSet::with_capacity(capacity);

        for pos in ctx.blacklist.iter() {
            cache.block(pos);
            closed.insert(pos);
        }
        for pos in expand::forward_seeds(ctx) {
            if cache.try_update(pos, 0, None, None) {
                frontier.push(estimate(pos, &goals), pos);
            }
        }

        let cap = ctx.limits.node_cap;
        let mut expanded = 0usize;
        let mut transports_used = 0usize;
        let mut reached = None;
        let mut failure = None;
        while let Some(pos) = frontier.pop() {
            if !closed.insert(pos) {
                continue;
            }
            if goal_set.contains(&pos) {
                reached = Some(pos);
                break;
            }
            expanded += 1;
            let cost = cache.cost_of(pos);

            let mut grid = Vec::with_capacity(8);
            expand::for_each_grid_neighbour(ctx, pos, Side::Forward, |n| grid.push(n));
            for next in grid {
                if closed.contains(&next) {
                    continue;
                }
                let g = cost.saturating_add(1);
                if cache.try_update(next, g, Some(pos), None) {
                    frontier.push(g.saturating_add(estimate(next, &goals)), next);
                }
            }
            for (next, edge) in expand::transport_neighbours(ctx, pos, Side::Forward) {
                transports_used += 1;
                if closed.contains(&next) {
                    continue;
                }
                let g = cost.saturating_add(edge.cost());
                if cache.try_update(next, g, Some(pos), Some(edge)) {
                    frontier.push(g.saturating_add(estimate(next, &goals)), next);
                }
            }

            let nodes = cache.len();
            if nodes > cap {
                failure = Some(SearchFailure::CapacityExceeded { nodes, cap });
                break;
            }
        }

        stats.forward_expanded = expanded;
        stats.forward_transports = transports_used;
        stats.nodes = cache.len();
        stats.meeting = reached;

        if let Some(f) = failure {
            debug!("[jps] stopped: {}", f);
            return Err(f);
        }
        let Some(goal) = reached else {
            debug!("[jps] frontier exhausted after {} expansions", expanded);
            return Err(SearchFailure::Exhausted);
        };
        Ok(trace(&cache, goal, ctx.start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{DirectionFlags, WorldCollisionMap};
    use crate::search::Step;
    use crate::transport::{Blacklist, Transport, TransportGraph};

    fn p(x: u16, y: u16) -> PositionId { PositionId::new(x, y, 0) }

    #[test]
    fn diagonal_is_followed_straight_to_the_goal() {
        let mut world = WorldCollisionMap::new();
        world.open_area(0, 0, 10, 10, 0);
        let transports = TransportGraph::new();
        let blacklist = Blacklist::new();
        let ctx = SearchContext::new(p(0, 0), &transports, &blacklist).with_world(&world);
        let mut stats = SearchStats::default();
        let route = Jps.search(&ctx, &Target::Point(p(6, 6)), &mut stats).unwrap();
        let positions: Vec<_> = route.steps.iter().map(|s| s.position).collect();
        assert_eq!(positions, (1..=6).map(|i| p(i, i)).collect::<Vec<_>>());
        assert_eq!(stats.forward_expanded, 6);
    }

    #[test]
    fn detour_around_a_wall_is_shortest() {
        let mut world = WorldCollisionMap::new();
        world.open_area(0, 0, 9, 9, 0);
        // wall at x = 4 with a gap at the top row
        for y in 0..8 {
            world.set(p(4, y), DirectionFlags::NONE);
        }
        let world = world.reconciled();
        let transports = TransportGraph::new();
        let blacklist = Blacklist::new();
        let ctx = SearchContext::new(p(0, 0), &transports, &blacklist).with_world(&world);
        let mut stats = SearchStats::default();
        let route = Jps.search(&ctx, &Target::Point(p(8, 0)), &mut stats).unwrap();
        assert!(route.steps.iter().any(|s| s.position == p(4, 8)));
        assert_eq!(route.steps.len(), 18);
    }

    #[test]
    fn transport_costs_its_duration_plus_one() {
        let mut world = WorldCollisionMap::new();
        world.open_area(0, 0, 12, 1, 0);
        let slow = Transport::new(5, p(0, 0), p(11, 0), 20);
        let quick = Transport::new(6, p(1, 0), p(11, 0), 2);
        let transports: TransportGraph = [slow, quick].into_iter().collect();
        let blacklist = Blacklist::new();
        let ctx = SearchContext::new(p(0, 0), &transports, &blacklist).with_world(&world);
        let mut stats = SearchStats::default();
        let route = Jps.search(&ctx, &Target::Point(p(11, 0)), &mut stats).unwrap();
        assert_eq!(route.steps, vec![Step::walk(p(1, 0)), Step { position: p(11, 0), transport: Some(quick) }]);
    }
}
