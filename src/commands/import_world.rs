use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::find_path::Coord;
use crate::collision::{Direction, DirectionFlags, WorldCollisionMap};
use crate::db;
use crate::logging;
use crate::position::PositionId;
use crate::search::AreaRect;
use crate::transport::{Teleport, Transport, TransportKind};

#[derive(Args, Debug, Clone)]
pub struct ImportWorldArgs {
    /// World SQLite DB to create or update
    #[arg(long)]
    pub db: PathBuf,
    /// JSON world description
    #[arg(long)]
    pub json: PathBuf,
    /// Delete existing rows before importing
    #[arg(long)]
    pub replace: bool,
    /// Log level (trace|debug|info|warn|error)
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct WorldFile {
    #[serde(default)]
    pub tiles: Vec<TileRow>,
    #[serde(default)]
    pub open_areas: Vec<AreaRect>,
    #[serde(default)]
    pub transports: Vec<TransportRow>,
    #[serde(default)]
    pub teleports: Vec<TeleportRow>,
    #[serde(default)]
    pub blacklist: Vec<Coord>,
    #[serde(default)]
    pub instance_tiles: Vec<InstanceTileRow>,
    #[serde(default)]
    pub in_instance: bool,
}

#[derive(Deserialize, Debug)]
pub struct TileRow {
    pub x: u16,
    pub y: u16,
    #[serde(default)]
    pub plane: u8,
    #[serde(rename = "walkMask", alias = "walk_mask", default)]
    pub walk_mask: Option<u8>,
    /// Per-direction booleans keyed "top", "bottomleft", ...
    #[serde(default)]
    pub walk: Option<JsonValue>,
    #[serde(default)]
    pub blocked: bool,
}

#[derive(Deserialize, Debug)]
pub struct TransportRow {
    pub id: u64,
    #[serde(default)]
    pub kind: Option<String>,
    pub from: Coord,
    pub to: Coord,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub bidirectional: bool,
}

#[derive(Deserialize, Debug)]
pub struct TeleportRow {
    pub id: u64,
    pub name: String,
    pub to: Coord,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool { true }

#[derive(Deserialize, Debug)]
pub struct InstanceTileRow {
    pub x: u16,
    pub y: u16,
    #[serde(default)]
    pub plane: u8,
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub doored: bool,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImportStats {
    pub tiles: usize,
    pub transports: usize,
    pub teleports: usize,
    pub blacklisted: usize,
    pub instance_tiles: usize,
}

/// Reads a `walk` object; values may be booleans, numbers or yes/no strings.
fn walk_flags(v: &JsonValue) -> DirectionFlags {
    let mut out = DirectionFlags::NONE;
    let Some(obj) = v.as_object() else { return out };
    for (k, vv) in obj.iter() {
        let allowed = match vv {
            JsonValue::Bool(b) => *b,
            JsonValue::Number(n) => n.as_i64().unwrap_or(0) != 0,
            JsonValue::String(t) => {
                let t = t.trim().to_ascii_lowercase();
                matches!(t.as_str(), "true" | "yes" | "y" | "on" | "1")
            }
            _ => false,
        };
        if let (true, Some(dir)) = (allowed, Direction::from_walk_key(&k.to_ascii_lowercase())) {
            out.insert(dir);
        }
    }
    out
}

pub fn read_world_file(path: &Path) -> Result<WorldFile> {
    let text = fs::read_to_string(path).with_context(|| format!("read world file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse world file {}", path.display()))
}

fn position(x: u16, y: u16, plane: u8) -> Result<PositionId> {
    PositionId::try_from(Coord { x, y, plane })
}

/// Tile masks to write: open areas first, explicit tiles override them.
fn tile_masks(file: &WorldFile) -> Result<Vec<(PositionId, DirectionFlags, bool)>> {
    let mut areas = WorldCollisionMap::new();
    let mut order: Vec<PositionId> = Vec::new();
    let mut rows: HashMap<PositionId, (DirectionFlags, bool)> = HashMap::new();
    for rect in &file.open_areas {
        areas.open_area(rect.x, rect.y, rect.width, rect.height, rect.plane);
        for pos in rect.seeds() {
            if rows.insert(pos, (areas.get(pos), false)).is_none() {
                order.push(pos);
            }
        }
    }
    for t in &file.tiles {
        let pos = position(t.x, t.y, t.plane).context("tiles")?;
        let mask = match (&t.walk, t.walk_mask) {
            (Some(w), _) => walk_flags(w),
            (None, Some(m)) => DirectionFlags(m),
            (None, None) => DirectionFlags::NONE,
        };
        if rows.insert(pos, (mask, t.blocked)).is_none() {
            order.push(pos);
        }
    }
    Ok(order.into_iter().filter_map(|p| rows.get(&p).map(|&(m, b)| (p, m, b))).collect())
}

pub fn import_world(conn: &mut rusqlite::Connection, file: &WorldFile, replace: bool) -> Result<ImportStats> {
    db::create_tables(conn)?;
    let tiles = tile_masks(file)?;
    db::with_tx(conn, |tx| {
        if replace {
            tx.execute_batch(
                "DELETE FROM tiles; DELETE FROM transports; DELETE FROM teleports; \
                 DELETE FROM blacklist; DELETE FROM instance_tiles;",
            )?;
        }
        let mut stats = ImportStats::default();
        for (pos, mask, blocked) in &tiles {
            db::insert_tile(tx, *pos, *mask, *blocked)?;
            stats.tiles += 1;
        }
        for t in &file.transports {
            let kind: TransportKind = t.kind.as_deref().unwrap_or("other").parse().unwrap_or_default();
            let source = PositionId::try_from(t.from).with_context(|| format!("transport {} source", t.id))?;
            let destination = PositionId::try_from(t.to).with_context(|| format!("transport {} destination", t.id))?;
            let transport = Transport::new(t.id, source, destination, t.duration).with_kind(kind);
            db::insert_transport(tx, &transport, t.bidirectional)?;
            stats.transports += 1;
        }
        for t in &file.teleports {
            let destination = PositionId::try_from(t.to).with_context(|| format!("teleport {}", t.id))?;
            let teleport = Teleport { id: t.id, name: t.name.clone(), destination };
            db::insert_teleport(tx, &teleport, t.enabled)?;
            stats.teleports += 1;
        }
        for c in &file.blacklist {
            db::insert_blacklisted(tx, PositionId::try_from(*c).context("blacklist")?)?;
            stats.blacklisted += 1;
        }
        for t in &file.instance_tiles {
            let pos = position(t.x, t.y, t.plane).context("instance_tiles")?;
            db::insert_instance_tile(tx, pos, t.flags, t.doored)?;
            stats.instance_tiles += 1;
        }
        db::set_meta(tx, db::META_IN_INSTANCE, if file.in_instance { "1" } else { "0" })?;
        Ok(stats)
    })
}

pub fn cmd_import_world(args: ImportWorldArgs) -> Result<()> {
    logging::init(args.log_level.as_deref());
    println!("Using world file: {}", args.json.display());
    println!("Using DB file   : {}", args.db.display());

    let file = read_world_file(&args.json)?;
    let mut conn = db::open_rw(&args.db)?;
    let stats = import_world(&mut conn, &file, args.replace)?;
    println!(
        "Imported {} tiles, {} transports, {} teleports, {} blacklisted, {} instance tiles into {}",
        stats.tiles,
        stats.transports,
        stats.teleports,
        stats.blacklisted,
        stats.instance_tiles,
        args.db.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::CollisionMap;
    use serde_json::json;
    use tempfile::NamedTempFile;

    #[test]
    fn walk_objects_accept_loose_values() {
        let flags = walk_flags(&json!({"top": true, "Left": 1, "bottomright": "yes", "right": false, "up": true}));
        let dirs: Vec<_> = flags.iter().collect();
        assert_eq!(dirs, vec![Direction::West, Direction::North, Direction::SouthEast]);
    }

    #[test]
    fn explicit_tiles_override_open_areas() {
        let file: WorldFile = serde_json::from_value(json!({
            "open_areas": [{"x": 0, "y": 0, "width": 2, "height": 1, "plane": 0}],
            "tiles": [{"x": 1, "y": 0, "walkMask": 0, "blocked": true}]
        }))
        .unwrap();
        let masks = tile_masks(&file).unwrap();
        assert_eq!(masks.len(), 2);
        let (_, first, _) = masks[0];
        assert!(first.contains(Direction::East));
        assert_eq!(masks[1], (PositionId::new(1, 0, 0), DirectionFlags::NONE, true));
    }

    #[test]
    fn import_then_load() -> Result<()> {
        let file: WorldFile = serde_json::from_value(json!({
            "open_areas": [{"x": 3200, "y": 3200, "width": 4, "height": 4, "plane": 0}],
            "transports": [{"id": 1, "kind": "door", "from": {"x": 3203, "y": 3203}, "to": {"x": 3203, "y": 3204}, "bidirectional": true}],
            "teleports": [{"id": 9, "name": "Home", "to": {"x": 3200, "y": 3200}}],
            "blacklist": [{"x": 3201, "y": 3201}]
        }))?;
        let tmp = NamedTempFile::new()?;
        let mut conn = db::open_rw(tmp.path())?;
        let stats = import_world(&mut conn, &file, true)?;
        assert_eq!(stats, ImportStats { tiles: 16, transports: 1, teleports: 1, blacklisted: 1, instance_tiles: 0 });

        let world = db::load_world(&conn, true)?;
        assert!(world.collision.walkable(PositionId::new(3202, 3202, 0)));
        assert_eq!(world.transports.len(), 2);
        assert_eq!(world.teleports.all()[0].name, "Home");
        assert!(world.blacklist.contains(PositionId::new(3201, 3201, 0)));

        // importing again with replace leaves the same row counts
        import_world(&mut conn, &file, true)?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM tiles", [], |r| r.get(0))?;
        assert_eq!(n, 16);
        Ok(())
    }

    #[test]
    fn out_of_range_tiles_are_rejected() -> Result<()> {
        let file: WorldFile = serde_json::from_value(json!({
            "tiles": [{"x": 20000, "y": 3200, "walkMask": 255}]
        }))?;
        let tmp = NamedTempFile::new()?;
        let mut conn = db::open_rw(tmp.path())?;
        let err = import_world(&mut conn, &file, true).unwrap_err();
        assert!(format!("{:#}", err).contains("(20000, 3200, 0) is out of range"), "{:#}", err);
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM tiles", [], |r| r.get(0))?;
        assert_eq!(n, 0);
        Ok(())
    }

    #[test]
    fn bad_instance_tile_rolls_back_the_import() -> Result<()> {
        let file: WorldFile = serde_json::from_value(json!({
            "open_areas": [{"x": 10, "y": 10, "width": 2, "height": 2, "plane": 0}],
            "instance_tiles": [{"x": 6400, "y": 40000, "flags": 0}]
        }))?;
        let tmp = NamedTempFile::new()?;
        let mut conn = db::open_rw(tmp.path())?;
        let err = import_world(&mut conn, &file, false).unwrap_err();
        assert!(format!("{:#}", err).contains("instance_tiles"), "{:#}", err);
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM tiles", [], |r| r.get(0))?;
        assert_eq!(n, 0);
        Ok(())
    }
}
