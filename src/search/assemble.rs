use super::cache::SearchCache;
use super::{Route, Step};
use crate::position::PositionId;
use crate::transport::TransportGraph;

/// Stitches the two halves of a bidirectional search at `meeting`.
///
/// The forward half is read straight from the forward cache. The backward half is
/// reversed into travel order; a step reached over a transport in the backward cache
/// gets its edge re-derived from `transports` so it points the way the walker travels.
/// The meeting point appears once and the caller's own position is never part of the path.
pub fn assemble(
    forward: &SearchCache,
    backward: &SearchCache,
    meeting: PositionId,
    start: PositionId,
    transports: &TransportGraph,
) -> Route {
    let Route { mut steps, origin } = trace(forward, meeting, start);

    // goal-first, ending at the meeting point
    let backward_half = backward.reconstruct_from(meeting);
    let mut prev = meeting;
    for step in backward_half.iter().rev().skip(1) {
        let cur = step.position;
        // the edge that joined cur to prev in the backward cache is stored on prev
        let backward_edge = backward.get(prev).and_then(|n| n.edge);
        let transport = backward_edge.map(|e| transports.find(prev, cur).unwrap_or(e));
        steps.push(Step { position: cur, transport });
        prev = cur;
    }

    Route { steps, origin }
}

/// Route held entirely in one forward cache, from its seed up to `end`.
pub fn trace(forward: &SearchCache, end: PositionId, start: PositionId) -> Route {
    let chain = forward.reconstruct_from(end);
    let origin = chain.first().map(|s| s.position).unwrap_or(end);
    let steps = chain
        .into_iter()
        .enumerate()
        .filter(|(i, s)| !(*i == 0 && s.position == start))
        .map(|(_, s)| s)
        .collect();
    Route { steps, origin }
}
