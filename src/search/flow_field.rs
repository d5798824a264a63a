use log::debug;
use std::collections::VecDeque;

use super::cache::{SearchCache, BLACKLISTED_COST};
use super::expand::{self, Side};
use super::{PathFinder, Route, SearchContext, SearchFailure, SearchStats, Step, Target};
use crate::position::PositionId;

/// Expansions after which the flood stops and the field is used as it stands.
pub const FLOW_FIELD_MAX_EXPANSIONS: usize = 500_000;

/// Steps a teleport must save over walking before the field starts from it.
pub const FLOW_FIELD_MIN_SAVING: u32 = 20;

/// Floods a cost field outward from the goal seeds, following moves and transports
/// backwards, then walks it downhill from the start. A teleport destination is only
/// used when its field cost beats the start's by [`FLOW_FIELD_MIN_SAVING`].
#[derive(Copy, Clone, Debug, Default)]
pub struct FlowField;

/// Downhill walk from `origin` along parents. Each parent was reached over the edge
/// stored on its child, which is the edge the walker takes.
fn follow(field: &SearchCache, origin: PositionId, start: PositionId) -> Result<Route, SearchFailure> {
    let mut steps = Vec::new();
    if origin != start {
        steps.push(Step::walk(origin));
    }
    let mut cur = origin;
    let mut guard = field.len();
    while field.cost_of(cur) > 0 {
        let node = field.get(cur).ok_or(SearchFailure::Exhausted)?;
        let next = node.parent.ok_or(SearchFailure::Exhausted)?;
        if guard == 0 {
            return Err(SearchFailure::UnexpectedFailure(format!("flow field loops at {}", cur)));
        }
        guard -= 1;
        steps.push(Step { position: next, transport: node.edge });
        cur = next;
    }
    Ok(Route { steps, origin })
}

impl PathFinder for FlowField {
    fn name(&self) -> &'static str { "flowfield" }

    fn search(&self, ctx: &SearchContext<'_>, target: &Target, stats: &mut SearchStats) -> Result<Route, SearchFailure> {
        expand::validate(ctx, target)?;
        let goals = expand::reachable_goals(ctx, target);
        if goals.contains(&ctx.start) {
            stats.meeting = Some(ctx.start);
            return Ok(Route { steps: Vec::new(), origin: ctx.start });
        }

        let capacity = ctx.limits.initial_capacity;
        let mut field = SearchCache::with_capacity(capacity);
        let mut queue = VecDeque::with_capacity(capacity);
        for pos in ctx.blacklist.iter() {
            field.block(pos);
        }
        let mut seeds: Vec<PositionId> = goals.into_iter().collect();
        seeds.sort_unstable();
        for pos in seeds {
            if field.try_update(pos, 0, None, None) {
                queue.push_back(pos);
            }
        }

        let cap = ctx.limits.node_cap;
        let mut expanded = 0usize;
        let mut transports_used = 0usize;
        let mut failure = None;
        while let Some(pos) = queue.pop_front() {
            if expanded >= FLOW_FIELD_MAX_EXPANSIONS {
                debug!("[flowfield] flood stopped after {} expansions", expanded);
                break;
            }
            expanded += 1;
            let cost = field.cost_of(pos);

            let mut grid = Vec::with_capacity(8);
            expand::for_each_grid_neighbour(ctx, pos, Side::Backward, |n| grid.push(n));
            for next in grid {
                if ctx.blacklist.contains(next) {
                    continue;
                }
                if field.try_update(next, cost.saturating_add(1), Some(pos), None) {
                    queue.push_back(next);
                }
            }
            for (source, edge) in expand::transport_neighbours(ctx, pos, Side::Backward) {
                transports_used += 1;
                if field.try_update(source, cost.saturating_add(edge.cost()), Some(pos), Some(edge)) {
                    queue.push_back(source);
                }
            }

            let nodes = field.len();
            if nodes > cap {
                failure = Some(SearchFailure::CapacityExceeded { nodes, cap });
                break;
            }
        }

        stats.backward_expanded = expanded;
        stats.backward_transports = transports_used;
        stats.nodes = field.len();
        if let Some(f) = failure {
            debug!("[flowfield] stopped: {}", f);
            return Err(f);
        }

        let mut origin = ctx.start;
        let mut best = field.cost_of(ctx.start);
        for tp in ctx.teleports {
            let cost = field.cost_of(tp.destination);
            if cost < best && best.saturating_sub(cost) >= FLOW_FIELD_MIN_SAVING {
                origin = tp.destination;
                best = cost;
            }
        }
        if best >= BLACKLISTED_COST {
            return Err(SearchFailure::Exhausted);
        }
        if origin != ctx.start {
            debug!("[flowfield] starting from teleport destination {} ({} steps)", origin, best);
        }
        let route = follow(&field, origin, ctx.start)?;
        stats.meeting = route.steps.last().map(|s| s.position);
        Ok(route)
    }
}
