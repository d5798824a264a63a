use anyhow::{anyhow, bail, Result};
use clap::Args;
use log::info;
use serde::{Deserialize, Serialize};

use super::{open_world, resolve_config, CommonOpts};
use crate::collision::CollisionMap;
use crate::config::Config;
use crate::db::World;
use crate::position::{is_local_addressing, parse_position, PositionId};
use crate::search::{self, admission, AreaRect, Algorithm, SearchStats, Step, Target};
use crate::transport::Teleport;

#[derive(Args, Debug, Clone)]
pub struct FindPathArgs {
    #[command(flatten)]
    pub common: CommonOpts,
    /// Start tile as x,y,plane
    #[arg(long)]
    pub from: String,
    /// Goal tile as x,y,plane
    #[arg(long, conflicts_with = "area")]
    pub to: Option<String>,
    /// Goal area as x,y,width,height,plane (repeatable)
    #[arg(long, num_args = 1..)]
    pub area: Vec<AreaRect>,
    /// Ignore every teleport
    #[arg(long = "no-teleports")]
    pub no_teleports: bool,
    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: u16,
    pub y: u16,
    #[serde(default)]
    pub plane: u8,
}

impl TryFrom<Coord> for PositionId {
    type Error = anyhow::Error;

    fn try_from(c: Coord) -> Result<Self> {
        PositionId::try_new(c.x as i32, c.y as i32, c.plane as i32)
            .ok_or_else(|| anyhow!("coordinate ({}, {}, {}) is out of range", c.x, c.y, c.plane))
    }
}

impl From<PositionId> for Coord {
    fn from(p: PositionId) -> Self {
        Coord { x: p.x(), y: p.y(), plane: p.plane() }
    }
}

/// One search request, as read from a batch file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub id: Option<String>,
    pub from: Coord,
    #[serde(default)]
    pub to: Option<Coord>,
    #[serde(default)]
    pub area: Vec<AreaRect>,
    #[serde(default)]
    pub algorithm: Option<Algorithm>,
    #[serde(default)]
    pub no_teleports: bool,
}

impl Query {
    pub fn target(&self) -> Result<Target> {
        match (&self.to, self.area.is_empty()) {
            (Some(to), true) => Ok(Target::Point(PositionId::try_from(*to)?)),
            (None, false) => Ok(Target::from_rects(&self.area)),
            (Some(_), false) => bail!("query has both a point and an area target"),
            (None, true) => bail!("query has no target"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepOut {
    pub x: u16,
    pub y: u16,
    pub plane: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl From<&Step> for StepOut {
    fn from(s: &Step) -> Self {
        StepOut {
            x: s.position.x(),
            y: s.position.y(),
            plane: s.position.plane(),
            transport_id: s.transport.map(|t| t.id),
            transport_kind: s.transport.map(|t| t.kind.to_string()),
            duration: s.transport.map(|t| t.duration),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub path: Vec<StepOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teleport: Option<String>,
    pub stats: SearchStats,
}

fn collision_for<'a>(world: &'a World, pos: PositionId) -> &'a dyn CollisionMap {
    match &world.local {
        Some(local) if is_local_addressing(pos) => local,
        _ => world.collision.as_ref(),
    }
}

/// Moves a blocked point target onto the nearest walkable tile within `radius`.
pub fn snap_target(world: &World, target: Target, radius: Option<i32>) -> Target {
    match (target, radius) {
        (Target::Point(goal), Some(r)) if r > 0 => {
            let map = collision_for(world, goal);
            match map.nearest_walkable(goal, r) {
                Some(snapped) if snapped != goal => {
                    info!("snapped target {} to {}", goal, snapped);
                    Target::Point(snapped)
                }
                _ => Target::Point(goal),
            }
        }
        (t, _) => t,
    }
}

/// Runs one query against a loaded world. Failures are reported in the result.
pub fn run_query(world: &World, query: &Query, cfg: &Config) -> QueryResult {
    let mut result = QueryResult { id: query.id.clone(), ..QueryResult::default() };
    let resolved = PositionId::try_from(query.from).and_then(|from| Ok((from, query.target()?)));
    let (from, target) = match resolved {
        Ok((from, t)) => (from, snap_target(world, t, cfg.snap)),
        Err(e) => {
            result.error = Some(e.to_string());
            return result;
        }
    };
    let teleports: Vec<Teleport> = if query.no_teleports {
        Vec::new()
    } else {
        admission::admit_teleports(&world.context(from, &[]), &world.teleports)
    };
    let ctx = world.context(from, &teleports).with_limits(cfg.limits());
    let algorithm = query.algorithm.unwrap_or_else(|| cfg.algorithm());

    let (outcome, stats) = search::find_with_stats(algorithm, &ctx, &target);
    result.stats = stats;
    match outcome {
        Ok(o) => {
            result.ok = true;
            result.path = o.path.iter().map(StepOut::from).collect();
            result.teleport = o.teleport.map(|t| t.name);
        }
        Err(e) => result.error = Some(e.to_string()),
    }
    result
}

pub fn cmd_find_path(args: FindPathArgs) -> Result<()> {
    let cfg = resolve_config(&args.common)?;
    let from = parse_position(&args.from).ok_or_else(|| anyhow!("invalid --from '{}', expected x,y,plane", args.from))?;
    let to = match &args.to {
        Some(s) => Some(parse_position(s).ok_or_else(|| anyhow!("invalid --to '{}', expected x,y,plane", s))?),
        None => None,
    };
    let query = Query {
        id: None,
        from: from.into(),
        to: to.map(Coord::from),
        area: args.area.clone(),
        algorithm: None,
        no_teleports: args.no_teleports,
    };
    query.target()?;

    let world = open_world(&cfg)?;
    let result = run_query(&world, &query, &cfg);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.ok {
        if let Some(name) = &result.teleport {
            println!("Teleport: {}", name);
        }
        println!("Path ({} steps, {} nodes expanded):", result.path.len(), result.stats.expanded());
        for (i, s) in result.path.iter().enumerate() {
            match (&s.transport_kind, s.transport_id) {
                (Some(kind), Some(id)) => println!("{:>4}  ({}, {}, {})  via {} #{}", i + 1, s.x, s.y, s.plane, kind, id),
                _ => println!("{:>4}  ({}, {}, {})", i + 1, s.x, s.y, s.plane),
            }
        }
    } else {
        println!("No path: {}", result.error.as_deref().unwrap_or("unknown"));
    }
    Ok(())
}
