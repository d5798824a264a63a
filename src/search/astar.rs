use log::debug;
use std::collections::HashSet;

use super::assemble::assemble;
use super::cache::SearchCache;
use super::expand::{self, Side};
use super::frontier::PriorityFrontier;
use super::{PathFinder, Route, SearchContext, SearchFailure, SearchStats, Target};
use crate::position::PositionId;
use crate::transport::Transport;

/// Bidirectional A* with lazy deletion. Terminates at the first meeting point, which
/// with the plane-weighted Manhattan heuristic is usually but not always optimal.
#[derive(Copy, Clone, Debug, Default)]
pub struct BidirectionalAStar;

struct Half {
    side: Side,
    cache: SearchCache,
    frontier: PriorityFrontier,
    closed: HashSet<PositionId>,
    /// Heuristic anchors: the goal seeds going forward, the start going backward.
    toward: Vec<PositionId>,
    expanded: usize,
    transports: usize,
}

impl Half {
    fn new(side: Side, capacity: usize, toward: Vec<PositionId>) -> Self {
        Self {
            side,
            cache: SearchCache::with_capacity(capacity),
            frontier: PriorityFrontier::with_capacity(capacity),
            closed: HashSet::with_capacity(capacity),
            toward,
            expanded: 0,
            transports: 0,
        }
    }

    fn seed(&mut self, pos: PositionId) {
        if self.cache.try_update(pos, 0, None, None) {
            let h = expand::heuristic_to_any(pos, &self.toward);
            self.frontier.push(h, pos);
        }
    }

    fn block(&mut self, pos: PositionId) {
        self.cache.block(pos);
        self.closed.insert(pos);
    }

    fn offer(&mut self, pos: PositionId, cost: u32, parent: PositionId, edge: Option<Transport>) {
        if self.cache.try_update(pos, cost, Some(parent), edge) {
            let priority = cost.saturating_add(expand::heuristic_to_any(pos, &self.toward));
            self.frontier.push(priority, pos);
        }
    }

    /// Pops one position. Returns it if the other side has already reached it.
    fn step(&mut self, ctx: &SearchContext<'_>, other: &SearchCache) -> Option<PositionId> {
        let pos = self.frontier.pop()?;
        if self.closed.contains(&pos) {
            return None;
        }
        if other.contains(pos) {
            return Some(pos);
        }
        self.closed.insert(pos);
        self.expanded += 1;

        let cost = self.cache.cost_of(pos);
        let mut grid = Vec::with_capacity(8);
        expand::for_each_grid_neighbour(ctx, pos, self.side, |n| grid.push(n));
        for next in grid {
            if self.closed.contains(&next) {
                continue;
            }
            self.offer(next, cost.saturating_add(1), pos, None);
        }
        // transports may re-parent a closed position when they reach it more cheaply
        for (next, edge) in expand::transport_neighbours(ctx, pos, self.side) {
            self.transports += 1;
            self.offer(next, cost.saturating_add(edge.cost()), pos, Some(edge));
        }
        None
    }
}

impl PathFinder for BidirectionalAStar {
    fn name(&self) -> &'static str { "astar" }

    fn search(&self, ctx: &SearchContext<'_>, target: &Target, stats: &mut SearchStats) -> Result<Route, SearchFailure> {
        expand::validate(ctx, target)?;
        let goals: Vec<PositionId> = target.seeds().iter().copied().filter(|p| !ctx.blacklist.contains(*p)).collect();
        let capacity = ctx.limits.initial_capacity;

        let mut fwd = Half::new(Side::Forward, capacity, goals.clone());
        let mut bwd = Half::new(Side::Backward, capacity, vec![ctx.start]);
        for pos in ctx.blacklist.iter() {
            fwd.block(pos);
            bwd.block(pos);
        }
        for pos in expand::forward_seeds(ctx) {
            fwd.seed(pos);
        }
        for pos in goals {
            bwd.seed(pos);
        }

        let cap = ctx.limits.node_cap;
        let mut meeting = None;
        let mut failure = None;
        while !fwd.frontier.is_empty() && !bwd.frontier.is_empty() {
            if let Some(m) = fwd.step(ctx, &bwd.cache) {
                meeting = Some(m);
                break;
            }
            if let Some(m) = bwd.step(ctx, &fwd.cache) {
                meeting = Some(m);
                break;
            }
            let nodes = fwd.cache.len() + bwd.cache.len();
            if nodes > cap {
                failure = Some(SearchFailure::CapacityExceeded { nodes, cap });
                break;
            }
        }

        stats.forward_expanded = fwd.expanded;
        stats.backward_expanded = bwd.expanded;
        stats.forward_transports = fwd.transports;
        stats.backward_transports = bwd.transports;
        stats.nodes = fwd.cache.len() + bwd.cache.len();
        stats.meeting = meeting;

        if let Some(f) = failure {
            debug!("[astar] stopped: {}", f);
            return Err(f);
        }
        let Some(meeting) = meeting else {
            debug!("[astar] frontier exhausted after {} expansions", stats.expanded());
            return Err(SearchFailure::Exhausted);
        };
        debug!("[astar] frontiers met at {}", meeting);
        Ok(assemble(&fwd.cache, &bwd.cache, meeting, ctx.start, ctx.transports))
    }
}
