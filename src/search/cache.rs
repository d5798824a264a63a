use std::collections::HashMap;

use super::Step;
use crate::position::PositionId;
use crate::transport::Transport;

/// Cost given to blacklisted positions so no real route can ever be cheaper to displace them
/// through a grid move.
pub const BLACKLISTED_COST: u32 = u32::MAX - 1;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SearchNode {
    pub cost: u32,
    pub parent: Option<PositionId>,
    /// Edge taken from `parent` to reach this node, if it was a transport.
    pub edge: Option<Transport>,
}

/// Per-direction record of the best known way to reach each position.
#[derive(Clone, Debug, Default)]
pub struct SearchCache {
    nodes: HashMap<PositionId, SearchNode>,
}

impl SearchCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { nodes: HashMap::with_capacity(capacity) }
    }

    /// Records the node if `cost` beats the current one (absent counts as infinite).
    pub fn try_update(&mut self, pos: PositionId, cost: u32, parent: Option<PositionId>, edge: Option<Transport>) -> bool {
        match self.nodes.get_mut(&pos) {
            Some(node) if node.cost <= cost => false,
            Some(node) => {
                *node = SearchNode { cost, parent, edge };
                true
            }
            None => {
                self.nodes.insert(pos, SearchNode { cost, parent, edge });
                true
            }
        }
    }

    /// First visit wins; later offers are ignored whatever their cost.
    pub fn insert_if_absent(&mut self, pos: PositionId, cost: u32, parent: Option<PositionId>, edge: Option<Transport>) -> bool {
        if self.nodes.contains_key(&pos) {
            return false;
        }
        self.nodes.insert(pos, SearchNode { cost, parent, edge });
        true
    }

    pub fn block(&mut self, pos: PositionId) {
        self.nodes.insert(pos, SearchNode { cost: BLACKLISTED_COST, parent: None, edge: None });
    }

    pub fn get(&self, pos: PositionId) -> Option<&SearchNode> {
        self.nodes.get(&pos)
    }

    pub fn cost_of(&self, pos: PositionId) -> u32 {
        self.nodes.get(&pos).map(|n| n.cost).unwrap_or(u32::MAX)
    }

    pub fn contains(&self, pos: PositionId) -> bool {
        self.nodes.contains_key(&pos)
    }

    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    /// Steps from the parentless origin up to and including `pos`, in origin-first order.
    pub fn reconstruct_from(&self, pos: PositionId) -> Vec<Step> {
        let mut out = Vec::new();
        let mut cur = Some(pos);
        while let Some(p) = cur {
            let Some(node) = self.nodes.get(&p) else { break };
            out.push(Step { position: p, transport: node.edge });
            // parents always have strictly lower cost, so this only trips on a corrupted cache
            if out.len() > self.nodes.len() {
                break;
            }
            cur = node.parent;
        }
        out.reverse();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: u16, y: u16) -> PositionId { PositionId::new(x, y, 0) }

    #[test]
    fn only_strictly_cheaper_updates_win() {
        let mut c = SearchCache::with_capacity(16);
        assert!(c.try_update(p(0, 0), 5, None, None));
        assert!(!c.try_update(p(0, 0), 5, Some(p(1, 1)), None));
        assert!(!c.try_update(p(0, 0), 7, Some(p(1, 1)), None));
        assert!(c.try_update(p(0, 0), 3, Some(p(2, 2)), None));
        assert_eq!(c.cost_of(p(0, 0)), 3);
        assert_eq!(c.get(p(0, 0)).and_then(|n| n.parent), Some(p(2, 2)));
        assert_eq!(c.cost_of(p(9, 9)), u32::MAX);
    }

    #[test]
    fn first_visit_wins() {
        let mut c = SearchCache::default();
        assert!(c.insert_if_absent(p(1, 0), 4, None, None));
        assert!(!c.insert_if_absent(p(1, 0), 1, None, None));
        assert_eq!(c.cost_of(p(1, 0)), 4);
        c.block(p(2, 0));
        assert!(!c.insert_if_absent(p(2, 0), 1, None, None));
        assert_eq!(c.cost_of(p(2, 0)), BLACKLISTED_COST);
    }

    #[test]
    fn reconstruct_walks_parents_origin_first() {
        let mut c = SearchCache::default();
        let t = Transport::new(9, p(1, 0), p(8, 8), 2);
        c.try_update(p(0, 0), 0, None, None);
        c.try_update(p(1, 0), 1, Some(p(0, 0)), None);
        c.try_update(p(8, 8), 4, Some(p(1, 0)), Some(t));
        let steps = c.reconstruct_from(p(8, 8));
        let positions: Vec<_> = steps.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![p(0, 0), p(1, 0), p(8, 8)]);
        assert_eq!(steps[2].transport, Some(t));
        assert!(steps[0].transport.is_none());
        assert!(c.reconstruct_from(p(5, 5)).is_empty());
    }
}
