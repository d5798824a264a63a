use log::debug;

use super::assemble::trace;
use super::cache::SearchCache;
use super::expand::{self, Side};
use super::hybrid_queue::{transport_delay, HybridQueue};
use super::{PathFinder, Route, SearchContext, SearchFailure, SearchStats, Target};

/// One-sided breadth-first search from the start and every teleport destination,
/// sharing the delayed transport queue of [`super::BidirectionalBfs`]. Stops when a
/// goal seed is dequeued. The first visit to a position fixes its parent, so a
/// transport claims its landing tile even though the tile is released later.
#[derive(Copy, Clone, Debug, Default)]
pub struct HybridBfs;

impl PathFinder for HybridBfs {
    fn name(&self) -> &'static str { "hybridbfs" }

    fn search(&self, ctx: &SearchContext<'_>, target: &Target, stats: &mut SearchStats) -> Result<Route, SearchFailure> {
        expand::validate(ctx, target)?;
        let goals = expand::reachable_goals(ctx, target);
        let capacity = ctx.limits.initial_capacity;
        let mut visited = SearchCache::with_capacity(capacity);
        let mut queue = HybridQueue::with_capacity(capacity);

        for pos in ctx.blacklist.iter() {
            visited.block(pos);
        }
        for pos in expand::forward_seeds(ctx) {
            if visited.insert_if_absent(pos, 0, None, None) {
                queue.enqueue(pos);
            }
        }

        let cap = ctx.limits.node_cap;
        let mut expanded = 0usize;
        let mut transports_used = 0u32;
        let mut reached = None;
        let mut failure = None;
        while !queue.is_empty() {
            let nodes = visited.len();
            if nodes > cap {
                failure = Some(SearchFailure::CapacityExceeded { nodes, cap });
                break;
            }
            let Some(pos) = queue.dequeue() else { break };
            if goals.contains(&pos) {
                reached = Some(pos);
                break;
            }
            expanded += 1;
            let hops = visited.cost_of(pos).saturating_add(1);

            let mut grid = Vec::with_capacity(8);
            expand::for_each_grid_neighbour(ctx, pos, Side::Forward, |n| grid.push(n));
            for next in grid {
                if visited.insert_if_absent(next, hops, Some(pos), None) {
                    queue.enqueue(next);
                }
            }
            for (next, edge) in expand::transport_neighbours(ctx, pos, Side::Forward) {
                transports_used = transports_used.saturating_add(1);
                let delay = transport_delay(edge.duration, queue.len(), transports_used);
                if visited.insert_if_absent(next, hops, Some(pos), Some(edge)) {
                    queue.enqueue_delayed(next, delay);
                }
            }
        }

        stats.forward_expanded = expanded;
        stats.forward_transports = transports_used as usize;
        stats.nodes = visited.len();
        stats.meeting = reached;

        if let Some(f) = failure {
            debug!("[hybridbfs] stopped: {}", f);
            return Err(f);
        }
        let Some(goal) = reached else {
            return Err(SearchFailure::Exhausted);
        };
        Ok(trace(&visited, goal, ctx.start))
    }
}
