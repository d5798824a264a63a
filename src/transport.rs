use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::position::PositionId;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Door,
    Object,
    Shortcut,
    Boat,
    #[default]
    Other,
}

impl FromStr for TransportKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "door" | "gate" => TransportKind::Door,
            "object" => TransportKind::Object,
            "shortcut" | "agility" => TransportKind::Shortcut,
            "boat" | "ship" => TransportKind::Boat,
            _ => TransportKind::Other,
        })
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportKind::Door => "door",
            TransportKind::Object => "object",
            TransportKind::Shortcut => "shortcut",
            TransportKind::Boat => "boat",
            TransportKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// A timed one-way edge. `duration` is charged on top of the unit step cost.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Transport {
    pub id: u64,
    #[serde(default)]
    pub kind: TransportKind,
    pub source: PositionId,
    pub destination: PositionId,
    #[serde(default)]
    pub duration: u32,
}

impl Transport {
    pub fn new(id: u64, source: PositionId, destination: PositionId, duration: u32) -> Self {
        Self { id, kind: TransportKind::Other, source, destination, duration }
    }

    pub fn with_kind(mut self, kind: TransportKind) -> Self {
        self.kind = kind;
        self
    }

    /// Cost of taking this edge, the step included.
    pub fn cost(&self) -> u32 {
        self.duration.saturating_add(1)
    }

    fn reversed(&self) -> Transport {
        Transport { source: self.destination, destination: self.source, ..*self }
    }
}

/// Transports indexed by source, plus an incoming index for the backward search.
#[derive(Clone, Debug, Default)]
pub struct TransportGraph {
    outgoing: HashMap<PositionId, Vec<Transport>>,
    incoming: HashMap<PositionId, Vec<Transport>>,
    count: usize,
}

impl TransportGraph {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, t: Transport) {
        self.outgoing.entry(t.source).or_default().push(t);
        self.incoming.entry(t.destination).or_default().push(t);
        self.count += 1;
    }

    /// Doors and similar links: one edge each way, same id and duration.
    pub fn insert_bidirectional(&mut self, t: Transport) {
        self.insert(t);
        if t.source != t.destination {
            self.insert(t.reversed());
        }
    }

    pub fn edges_from(&self, pos: PositionId) -> &[Transport] {
        self.outgoing.get(&pos).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edges_into(&self, pos: PositionId) -> &[Transport] {
        self.incoming.get(&pos).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cheapest edge joining `source` to `destination`.
    pub fn find(&self, source: PositionId, destination: PositionId) -> Option<Transport> {
        self.edges_from(source)
            .iter()
            .filter(|t| t.destination == destination)
            .min_by_key(|t| t.duration)
            .copied()
    }

    pub fn len(&self) -> usize { self.count }

    pub fn is_empty(&self) -> bool { self.count == 0 }

    pub fn iter(&self) -> impl Iterator<Item = &Transport> {
        self.outgoing.values().flatten()
    }
}

impl FromIterator<Transport> for TransportGraph {
    fn from_iter<I: IntoIterator<Item = Transport>>(iter: I) -> Self {
        let mut g = TransportGraph::new();
        for t in iter { g.insert(t); }
        g
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Teleport {
    pub id: u64,
    pub name: String,
    pub destination: PositionId,
}

/// Alternate starting points. Which ones apply is decided by the caller.
#[derive(Clone, Debug, Default)]
pub struct TeleportCatalog {
    teleports: Vec<Teleport>,
}

impl TeleportCatalog {
    pub fn new(teleports: Vec<Teleport>) -> Self { Self { teleports } }

    pub fn push(&mut self, t: Teleport) { self.teleports.push(t); }

    pub fn all(&self) -> &[Teleport] { &self.teleports }

    pub fn usable_from<F>(&self, mut predicate: F) -> Vec<Teleport>
    where
        F: FnMut(&Teleport) -> bool,
    {
        self.teleports.iter().filter(|t| predicate(t)).cloned().collect()
    }

    pub fn find_by_destination(&self, pos: PositionId) -> Option<&Teleport> {
        find_teleport(&self.teleports, pos)
    }

    pub fn len(&self) -> usize { self.teleports.len() }

    pub fn is_empty(&self) -> bool { self.teleports.is_empty() }
}

pub(crate) fn find_teleport(teleports: &[Teleport], pos: PositionId) -> Option<&Teleport> {
    teleports.iter().find(|t| t.destination == pos)
}

/// Positions no path may pass through.
#[derive(Clone, Debug, Default)]
pub struct Blacklist(HashSet<PositionId>);

impl Blacklist {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, pos: PositionId) -> bool { self.0.insert(pos) }

    pub fn contains(&self, pos: PositionId) -> bool { self.0.contains(&pos) }

    pub fn iter(&self) -> impl Iterator<Item = PositionId> + '_ { self.0.iter().copied() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl FromIterator<PositionId> for Blacklist {
    fn from_iter<I: IntoIterator<Item = PositionId>>(iter: I) -> Self {
        Blacklist(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: u16, y: u16) -> PositionId { PositionId::new(x, y, 0) }

    #[test]
    fn graph_indexes_both_ends() {
        let mut g = TransportGraph::new();
        g.insert(Transport::new(1, p(0, 0), p(4, 4), 3));
        g.insert(Transport::new(2, p(0, 0), p(4, 4), 1));
        g.insert(Transport::new(3, p(1, 0), p(4, 4), 0));
        assert_eq!(g.len(), 3);
        assert_eq!(g.edges_from(p(0, 0)).len(), 2);
        assert_eq!(g.edges_into(p(4, 4)).len(), 3);
        assert!(g.edges_from(p(4, 4)).is_empty());
        assert_eq!(g.find(p(0, 0), p(4, 4)).map(|t| t.id), Some(2));
        assert_eq!(g.find(p(4, 4), p(0, 0)), None);
    }

    #[test]
    fn doors_go_both_ways() {
        let mut g = TransportGraph::new();
        g.insert_bidirectional(Transport::new(7, p(5, 5), p(5, 6), 1).with_kind(TransportKind::Door));
        assert_eq!(g.len(), 2);
        let back = g.find(p(5, 6), p(5, 5)).unwrap();
        assert_eq!(back.id, 7);
        assert_eq!(back.kind, TransportKind::Door);
        assert_eq!(back.cost(), 2);
    }

    #[test]
    fn teleport_filter_is_caller_policy() {
        let catalog = TeleportCatalog::new(vec![
            Teleport { id: 1, name: "Lumbridge".into(), destination: p(3233, 3221) },
            Teleport { id: 2, name: "Varrock".into(), destination: p(3214, 3376) },
        ]);
        let usable = catalog.usable_from(|t| t.name.starts_with('V'));
        assert_eq!(usable.len(), 1);
        assert_eq!(catalog.find_by_destination(p(3233, 3221)).map(|t| t.id), Some(1));
        assert_eq!("Gate".parse::<TransportKind>().unwrap(), TransportKind::Door);
    }

    #[test]
    fn blacklist_membership() {
        let b: Blacklist = [p(1, 1), p(2, 2)].into_iter().collect();
        assert!(b.contains(p(1, 1)));
        assert!(!b.contains(p(1, 2)));
        assert_eq!(b.len(), 2);
    }
}
