//! Path search over the tile grid and its transport edges.
//!
//! The default strategies are bidirectional: a forward direction seeded at the caller's
//! position (and every usable teleport destination) and a backward direction seeded at
//! the goal, alternating one expansion each until a position reached by one side is
//! popped by the other. [`HybridBfs`] and [`Jps`] search forward only; [`FlowField`]
//! floods backward from the goal and then walks the field. Every strategy returns a
//! path that is start-exclusive and goal-inclusive.

pub mod admission;
pub mod assemble;
pub mod astar;
pub mod bfs;
pub mod cache;
pub mod flow_field;
pub mod frontier;
pub mod hybrid_bfs;
pub mod hybrid_queue;
pub mod jps;

mod expand;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;

use crate::collision::CollisionMap;
use crate::position::PositionId;
use crate::transport::{find_teleport, Blacklist, Teleport, Transport, TransportGraph};

pub use astar::BidirectionalAStar;
pub use bfs::BidirectionalBfs;
pub use flow_field::FlowField;
pub use hybrid_bfs::HybridBfs;
pub use jps::Jps;

pub const DEFAULT_NODE_CAP: usize = 10_000_000;
pub const DEFAULT_INITIAL_CAPACITY: usize = 10_000;

/// One move of a path. `transport` is the edge taken from the previous step
/// (or from the start, for the first step) to arrive here.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub position: PositionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
}

impl Step {
    pub fn walk(position: PositionId) -> Self {
        Self { position, transport: None }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AreaRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub plane: u8,
}

impl AreaRect {
    pub fn seeds(&self) -> impl Iterator<Item = PositionId> + '_ {
        (0..self.width).flat_map(move |dx| {
            (0..self.height).filter_map(move |dy| {
                PositionId::try_new(self.x as i32 + dx as i32, self.y as i32 + dy as i32, self.plane as i32)
            })
        })
    }
}

impl FromStr for AreaRect {
    type Err = String;

    /// `x,y,width,height,plane`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 5 {
            return Err(format!("expected x,y,width,height,plane, got '{}'", s));
        }
        let num = |i: usize| parts[i].parse::<u16>().map_err(|e| format!("bad field {} in '{}': {}", i, s, e));
        let plane = parts[4].parse::<u8>().map_err(|e| format!("bad plane in '{}': {}", s, e))?;
        Ok(AreaRect { x: num(0)?, y: num(1)?, width: num(2)?, height: num(3)?, plane })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Point(PositionId),
    /// Candidate goal positions; the nearest reachable one wins.
    Area(Vec<PositionId>),
}

impl Target {
    pub fn from_rects(rects: &[AreaRect]) -> Target {
        let mut seeds: Vec<PositionId> = rects.iter().flat_map(|r| r.seeds()).collect();
        seeds.sort_unstable();
        seeds.dedup();
        Target::Area(seeds)
    }

    pub fn seeds(&self) -> &[PositionId] {
        match self {
            Target::Point(p) => std::slice::from_ref(p),
            Target::Area(v) => v,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SearchLimits {
    /// Upper bound on the positions cached by a search, both directions combined.
    pub node_cap: usize,
    pub initial_capacity: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self { node_cap: DEFAULT_NODE_CAP, initial_capacity: DEFAULT_INITIAL_CAPACITY }
    }
}

/// Read-only snapshot of everything one search consults.
#[derive(Clone, Copy)]
pub struct SearchContext<'a> {
    pub start: PositionId,
    pub world: Option<&'a dyn CollisionMap>,
    pub local: Option<&'a dyn CollisionMap>,
    pub in_instance: bool,
    pub transports: &'a TransportGraph,
    /// Already filtered by the caller.
    pub teleports: &'a [Teleport],
    pub blacklist: &'a Blacklist,
    pub limits: SearchLimits,
}

impl<'a> SearchContext<'a> {
    pub fn new(start: PositionId, transports: &'a TransportGraph, blacklist: &'a Blacklist) -> Self {
        Self {
            start,
            world: None,
            local: None,
            in_instance: false,
            transports,
            teleports: &[],
            blacklist,
            limits: SearchLimits::default(),
        }
    }

    pub fn with_world(mut self, world: &'a dyn CollisionMap) -> Self {
        self.world = Some(world);
        self
    }

    /// Instance scene map; also marks the search as running inside an instance.
    pub fn with_local(mut self, local: &'a dyn CollisionMap) -> Self {
        self.local = Some(local);
        self.in_instance = true;
        self
    }

    pub fn with_teleports(mut self, teleports: &'a [Teleport]) -> Self {
        self.teleports = teleports;
        self
    }

    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub forward_expanded: usize,
    pub backward_expanded: usize,
    pub forward_transports: usize,
    pub backward_transports: usize,
    /// Combined cache size when the search stopped.
    pub nodes: usize,
    pub meeting: Option<PositionId>,
    pub elapsed_micros: u64,
}

impl SearchStats {
    pub fn expanded(&self) -> usize {
        self.forward_expanded + self.backward_expanded
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchOutcome {
    pub path: Vec<Step>,
    /// Set when the path begins at a teleport destination rather than the start.
    pub teleport: Option<Teleport>,
    pub stats: SearchStats,
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SearchFailure {
    #[error("no collision data available")]
    NoCollisionData,
    #[error("target is not walkable")]
    TargetBlocked,
    #[error("node cap exceeded ({nodes} > {cap})")]
    CapacityExceeded { nodes: usize, cap: usize },
    #[error("search space exhausted without reaching the target")]
    Exhausted,
    #[error("area target has no seed positions")]
    EmptyTarget,
    #[error("unexpected failure: {0}")]
    UnexpectedFailure(String),
}

/// Path found by a strategy, plus where the forward half began.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Route {
    pub steps: Vec<Step>,
    pub origin: PositionId,
}

pub trait PathFinder: Sync {
    fn name(&self) -> &'static str;

    fn search(&self, ctx: &SearchContext<'_>, target: &Target, stats: &mut SearchStats) -> Result<Route, SearchFailure>;
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    AStar,
    Bfs,
    HybridBfs,
    Jps,
    FlowField,
}

static ASTAR: BidirectionalAStar = BidirectionalAStar;
static BFS: BidirectionalBfs = BidirectionalBfs;
static HYBRID_BFS: HybridBfs = HybridBfs;
static JPS: Jps = Jps;
static FLOW_FIELD: FlowField = FlowField;

impl Algorithm {
    pub const ALL: [Algorithm; 5] =
        [Algorithm::AStar, Algorithm::Bfs, Algorithm::HybridBfs, Algorithm::Jps, Algorithm::FlowField];

    pub fn finder(self) -> &'static dyn PathFinder {
        match self {
            Algorithm::AStar => &ASTAR,
            Algorithm::Bfs => &BFS,
            Algorithm::HybridBfs => &HYBRID_BFS,
            Algorithm::Jps => &JPS,
            Algorithm::FlowField => &FLOW_FIELD,
        }
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "astar" | "a*" | "bidir-astar" => Ok(Algorithm::AStar),
            "bfs" | "bidir-bfs" => Ok(Algorithm::Bfs),
            "hybridbfs" | "hybrid-bfs" => Ok(Algorithm::HybridBfs),
            "jps" => Ok(Algorithm::Jps),
            "flowfield" | "flow-field" => Ok(Algorithm::FlowField),
            other => Err(format!(
                "unknown algorithm '{}' (expected astar, bfs, hybridbfs, jps or flowfield)",
                other
            )),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::AStar => "astar",
            Algorithm::Bfs => "bfs",
            Algorithm::HybridBfs => "hybridbfs",
            Algorithm::Jps => "jps",
            Algorithm::FlowField => "flowfield",
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during search".to_string()
    }
}

/// Runs one search and returns its statistics whether or not it succeeded.
pub fn find_with_stats(
    algorithm: Algorithm,
    ctx: &SearchContext<'_>,
    target: &Target,
) -> (Result<SearchOutcome, SearchFailure>, SearchStats) {
    let finder = algorithm.finder();
    let started = Instant::now();
    let mut stats = SearchStats::default();

    let result = panic::catch_unwind(AssertUnwindSafe(|| finder.search(ctx, target, &mut stats)))
        .unwrap_or_else(|payload| Err(SearchFailure::UnexpectedFailure(panic_message(payload.as_ref()))));
    stats.elapsed_micros = started.elapsed().as_micros().min(u64::MAX as u128) as u64;

    let result = result.map(|route| {
        let teleport = if route.origin != ctx.start {
            find_teleport(ctx.teleports, route.origin).cloned()
        } else {
            None
        };
        SearchOutcome { path: route.steps, teleport, stats: stats.clone() }
    });

    match &result {
        Ok(outcome) => {
            info!(
                "[{}] path of {} steps from {} ({} expanded, {} nodes, {} us)",
                finder.name(),
                outcome.path.len(),
                ctx.start,
                stats.expanded(),
                stats.nodes,
                stats.elapsed_micros
            );
            if let Some(tp) = &outcome.teleport {
                info!("[{}] path starts with teleport '{}'", finder.name(), tp.name);
            }
            debug!("[{}] meeting point {:?}", finder.name(), stats.meeting);
        }
        Err(SearchFailure::UnexpectedFailure(msg)) => {
            warn!("[{}] search aborted: {}", finder.name(), msg);
        }
        Err(e) => {
            info!("[{}] no path from {}: {} ({} expanded)", finder.name(), ctx.start, e, stats.expanded());
        }
    }
    (result, stats)
}

pub fn find(algorithm: Algorithm, ctx: &SearchContext<'_>, target: &Target) -> Result<SearchOutcome, SearchFailure> {
    find_with_stats(algorithm, ctx, target).0
}

/// Every failure collapses to an empty path.
pub fn find_or_empty(algorithm: Algorithm, ctx: &SearchContext<'_>, target: &Target) -> Vec<Step> {
    find(algorithm, ctx, target).map(|o| o.path).unwrap_or_default()
}
