use log::debug;

use super::assemble::assemble;
use super::cache::SearchCache;
use super::expand::{self, Side};
use super::hybrid_queue::{transport_delay, HybridQueue};
use super::{PathFinder, Route, SearchContext, SearchFailure, SearchStats, Target};
use crate::position::PositionId;

/// Unweighted bidirectional breadth-first search. Grid moves cost one hop; a transport
/// joins the queue only after a delay that grows with its duration and with how many
/// transports this side has already taken. The first visit to a position fixes its parent.
#[derive(Copy, Clone, Debug, Default)]
pub struct BidirectionalBfs;

struct Half {
    side: Side,
    visited: SearchCache,
    queue: HybridQueue,
    expanded: usize,
    transports_used: u32,
}

impl Half {
    fn new(side: Side, capacity: usize) -> Self {
        Self {
            side,
            visited: SearchCache::with_capacity(capacity),
            queue: HybridQueue::with_capacity(capacity),
            expanded: 0,
            transports_used: 0,
        }
    }

    fn seed(&mut self, pos: PositionId) {
        if self.visited.insert_if_absent(pos, 0, None, None) {
            self.queue.enqueue(pos);
        }
    }

    fn step(&mut self, ctx: &SearchContext<'_>, other: &SearchCache) -> Option<PositionId> {
        let pos = self.queue.dequeue()?;
        if other.contains(pos) {
            return Some(pos);
        }
        self.expanded += 1;
        let hops = self.visited.cost_of(pos).saturating_add(1);

        let mut grid = Vec::with_capacity(8);
        expand::for_each_grid_neighbour(ctx, pos, self.side, |n| grid.push(n));
        for next in grid {
            if self.visited.insert_if_absent(next, hops, Some(pos), None) {
                self.queue.enqueue(next);
            }
        }
        for (next, edge) in expand::transport_neighbours(ctx, pos, self.side) {
            self.transports_used = self.transports_used.saturating_add(1);
            let delay = transport_delay(edge.duration, self.queue.len(), self.transports_used);
            if self.visited.insert_if_absent(next, hops, Some(pos), Some(edge)) {
                self.queue.enqueue_delayed(next, delay);
            }
        }
        None
    }
}

impl PathFinder for BidirectionalBfs {
    fn name(&self) -> &'static str { "bfs" }

    fn search(&self, ctx: &SearchContext<'_>, target: &Target, stats: &mut SearchStats) -> Result<Route, SearchFailure> {
        expand::validate(ctx, target)?;
        let capacity = ctx.limits.initial_capacity;
        let mut fwd = Half::new(Side::Forward, capacity);
        let mut bwd = Half::new(Side::Backward, capacity);

        for pos in ctx.blacklist.iter() {
            fwd.visited.block(pos);
            bwd.visited.block(pos);
        }
        for pos in expand::forward_seeds(ctx) {
            fwd.seed(pos);
        }
        match target {
            Target::Point(goal) => bwd.seed(*goal),
            Target::Area(seeds) => {
                for &pos in seeds {
                    let walkable = expand::collision_at(ctx, pos).map(|m| m.walkable(pos)).unwrap_or(false);
                    if walkable {
                        bwd.seed(pos);
                    }
                }
            }
        }

        let cap = ctx.limits.node_cap;
        let mut meeting = None;
        let mut failure = None;
        while !fwd.queue.is_empty() && !bwd.queue.is_empty() {
            let nodes = fwd.visited.len() + bwd.visited.len();
            if nodes > cap {
                failure = Some(SearchFailure::CapacityExceeded { nodes, cap });
                break;
            }
            if let Some(m) = fwd.step(ctx, &bwd.visited) {
                meeting = Some(m);
                break;
            }
            if let Some(m) = bwd.step(ctx, &fwd.visited) {
                meeting = Some(m);
                break;
            }
        }

        stats.forward_expanded = fwd.expanded;
        stats.backward_expanded = bwd.expanded;
        stats.forward_transports = fwd.transports_used as usize;
        stats.backward_transports = bwd.transports_used as usize;
        stats.nodes = fwd.visited.len() + bwd.visited.len();
        stats.meeting = meeting;

        if let Some(f) = failure {
            debug!("[bfs] stopped: {}", f);
            return Err(f);
        }
        let Some(meeting) = meeting else {
            return Err(SearchFailure::Exhausted);
        };
        debug!("[bfs] frontiers met at {}", meeting);
        Ok(assemble(&fwd.visited, &bwd.visited, meeting, ctx.start, ctx.transports))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::WorldCollisionMap;
    use crate::transport::{Blacklist, Transport, TransportGraph};

    fn p(x: u16, y: u16) -> PositionId { PositionId::new(x, y, 0) }

    #[test]
    fn corridor_walk_is_step_by_step() {
        let mut world = WorldCollisionMap::new();
        world.open_area(0, 0, 6, 1, 0);
        let transports = TransportGraph::new();
        let blacklist = Blacklist::new();
        let ctx = SearchContext::new(p(0, 0), &transports, &blacklist).with_world(&world);
        let mut stats = SearchStats::default();
        let route = BidirectionalBfs.search(&ctx, &Target::Point(p(5, 0)), &mut stats).unwrap();
        let xs: Vec<u16> = route.steps.iter().map(|s| s.position.x()).collect();
        assert_eq!(xs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn instant_transport_is_taken() {
        let mut world = WorldCollisionMap::new();
        world.open_area(0, 0, 30, 1, 0);
        let ladder = Transport::new(4, p(1, 0), p(29, 0), 0);
        let transports: TransportGraph = [ladder].into_iter().collect();
        let blacklist = Blacklist::new();
        let ctx = SearchContext::new(p(0, 0), &transports, &blacklist).with_world(&world);
        let mut stats = SearchStats::default();
        let route = BidirectionalBfs.search(&ctx, &Target::Point(p(29, 0)), &mut stats).unwrap();
        assert_eq!(route.steps.len(), 2);
        assert_eq!(route.steps[1].transport, Some(ladder));
    }

    #[test]
    fn unwalkable_area_seeds_are_skipped() {
        let mut world = WorldCollisionMap::new();
        world.open_area(0, 0, 4, 1, 0);
        let transports = TransportGraph::new();
        let blacklist = Blacklist::new();
        let ctx = SearchContext::new(p(0, 0), &transports, &blacklist).with_world(&world);
        let mut stats = SearchStats::default();
        let target = Target::Area(vec![p(50, 50), p(3, 0)]);
        let route = BidirectionalBfs.search(&ctx, &target, &mut stats).unwrap();
        assert_eq!(route.steps.last().map(|s| s.position), Some(p(3, 0)));

        let nowhere = Target::Area(vec![p(50, 50)]);
        assert_eq!(BidirectionalBfs.search(&ctx, &nowhere, &mut stats), Err(SearchFailure::Exhausted));
    }
}
