use anyhow::{Context, Result};
use log::{info, warn};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::collision::{DirectionFlags, LocalCollisionMap, WorldCollisionMap};
use crate::position::PositionId;
use crate::search::SearchContext;
use crate::transport::{Blacklist, Teleport, TeleportCatalog, Transport, TransportGraph, TransportKind};

pub const META_IN_INSTANCE: &str = "in_instance";

pub fn open_ro<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("open {} read-only", path.display()))?;
    // Wait a bit for locks to clear when a writer holds the DB
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(conn)
}

pub fn open_rw<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
    Ok(conn)
}

pub fn with_tx<T, F: FnOnce(&Transaction) -> Result<T>>(conn: &mut Connection, f: F) -> Result<T> {
    // IMMEDIATE takes the write lock up-front
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    let tiles_columns: BTreeSet<&'static str> =
        ["x", "y", "plane", "walk_mask", "blocked", "region_id"].into_iter().collect();
    let transports_columns: BTreeSet<&'static str> = [
        "id", "kind", "src_x", "src_y", "src_plane", "dst_x", "dst_y", "dst_plane", "duration", "bidirectional",
    ]
    .into_iter()
    .collect();

    // Older layouts are rebuilt from scratch; their rows cannot be mapped.
    if table_exists(conn, "tiles")? && !table_has_columns(conn, "tiles", &tiles_columns)? {
        warn!("tiles table has an outdated layout; recreating it");
        conn.execute("DROP TABLE tiles", [])?;
    }
    if table_exists(conn, "transports")? && !table_has_columns(conn, "transports", &transports_columns)? {
        warn!("transports table has an outdated layout; recreating it");
        conn.execute("DROP TABLE transports", [])?;
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tiles (
            x INTEGER NOT NULL,
            y INTEGER NOT NULL,
            plane INTEGER NOT NULL,
            walk_mask INTEGER NOT NULL DEFAULT 0,
            blocked INTEGER NOT NULL DEFAULT 0,
            region_id INTEGER NOT NULL,
            PRIMARY KEY (x, y, plane)
        );
        CREATE INDEX IF NOT EXISTS idx_tiles_region ON tiles(region_id, plane);

        CREATE TABLE IF NOT EXISTS transports (
            id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL DEFAULT 'other',
            src_x INTEGER NOT NULL,
            src_y INTEGER NOT NULL,
            src_plane INTEGER NOT NULL,
            dst_x INTEGER NOT NULL,
            dst_y INTEGER NOT NULL,
            dst_plane INTEGER NOT NULL,
            duration INTEGER NOT NULL DEFAULT 0,
            bidirectional INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS teleports (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            dest_x INTEGER NOT NULL,
            dest_y INTEGER NOT NULL,
            dest_plane INTEGER NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS blacklist (
            x INTEGER NOT NULL,
            y INTEGER NOT NULL,
            plane INTEGER NOT NULL,
            PRIMARY KEY (x, y, plane)
        );

        CREATE TABLE IF NOT EXISTS instance_tiles (
            x INTEGER NOT NULL,
            y INTEGER NOT NULL,
            plane INTEGER NOT NULL,
            flags INTEGER NOT NULL DEFAULT 0,
            doored INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (x, y, plane)
        );

        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT
        );
    "#,
    )?;
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(exists.is_some())
}

fn table_has_columns(conn: &Connection, table: &str, required: &BTreeSet<&str>) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    let mut present = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        present.insert(name);
    }
    Ok(required.iter().all(|c| present.contains(*c)))
}

pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v = conn
        .query_row("SELECT value FROM meta WHERE key=?1", [key], |r| r.get::<_, Option<String>>(0))
        .optional()?;
    Ok(v.flatten())
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO meta(key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn position(x: i64, y: i64, plane: i64) -> Option<PositionId> {
    let narrow = |v: i64| i32::try_from(v).ok();
    PositionId::try_new(narrow(x)?, narrow(y)?, narrow(plane)?)
}

pub fn insert_tile(conn: &Connection, pos: PositionId, walk_mask: DirectionFlags, blocked: bool) -> Result<()> {
    conn.execute(
        "INSERT INTO tiles (x, y, plane, walk_mask, blocked, region_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
         ON CONFLICT(x, y, plane) DO UPDATE SET walk_mask=excluded.walk_mask, blocked=excluded.blocked",
        params![pos.x(), pos.y(), pos.plane(), walk_mask.bits(), blocked as i64, pos.region_id()],
    )?;
    Ok(())
}

pub fn insert_transport(conn: &Connection, t: &Transport, bidirectional: bool) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO transports \
         (id, kind, src_x, src_y, src_plane, dst_x, dst_y, dst_plane, duration, bidirectional) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            t.id as i64,
            t.kind.to_string(),
            t.source.x(),
            t.source.y(),
            t.source.plane(),
            t.destination.x(),
            t.destination.y(),
            t.destination.plane(),
            t.duration,
            bidirectional as i64
        ],
    )?;
    Ok(())
}

pub fn insert_teleport(conn: &Connection, t: &Teleport, enabled: bool) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO teleports (id, name, dest_x, dest_y, dest_plane, enabled) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![t.id as i64, t.name, t.destination.x(), t.destination.y(), t.destination.plane(), enabled as i64],
    )?;
    Ok(())
}

pub fn insert_blacklisted(conn: &Connection, pos: PositionId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO blacklist (x, y, plane) VALUES (?1, ?2, ?3)",
        params![pos.x(), pos.y(), pos.plane()],
    )?;
    Ok(())
}

pub fn insert_instance_tile(conn: &Connection, pos: PositionId, flags: u32, doored: bool) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO instance_tiles (x, y, plane, flags, doored) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![pos.x(), pos.y(), pos.plane(), flags, doored as i64],
    )?;
    Ok(())
}

/// Walk masks from `tiles`. With `reconcile`, one-sided moves and corner cuts are removed.
pub fn load_world_collision(conn: &Connection, reconcile: bool) -> Result<WorldCollisionMap> {
    let mut map = WorldCollisionMap::new();
    let mut stmt = conn.prepare("SELECT x, y, plane, walk_mask, blocked FROM tiles")?;
    let mut rows = stmt.query([])?;
    let mut loaded = 0usize;
    while let Some(r) = rows.next()? {
        let blocked: Option<i64> = r.get(4)?;
        if blocked.unwrap_or(0) != 0 {
            continue;
        }
        let Some(pos) = position(r.get(0)?, r.get(1)?, r.get(2)?) else {
            warn!("skipping tile with out-of-range coordinates");
            continue;
        };
        let mask: Option<i64> = r.get(3)?;
        let mask = (mask.unwrap_or(0) & 0xFF) as u8;
        if mask != 0 {
            map.set(pos, DirectionFlags(mask));
            loaded += 1;
        }
    }
    info!("loaded {} walkable tiles in {} regions", loaded, map.region_count());
    Ok(if reconcile { map.reconciled() } else { map })
}

pub fn load_local_collision(conn: &Connection, world: Option<Arc<WorldCollisionMap>>) -> Result<LocalCollisionMap> {
    let mut local = match world {
        Some(w) => LocalCollisionMap::with_world(w),
        None => LocalCollisionMap::new(),
    };
    let mut stmt = conn.prepare("SELECT x, y, plane, flags, doored FROM instance_tiles")?;
    let mut rows = stmt.query([])?;
    while let Some(r) = rows.next()? {
        let Some(pos) = position(r.get(0)?, r.get(1)?, r.get(2)?) else { continue };
        let flags: i64 = r.get(3)?;
        let doored: i64 = r.get(4)?;
        local.set_flags(pos, flags as u32);
        if doored != 0 {
            local.mark_doored(pos);
        }
    }
    Ok(local)
}

pub fn load_transports(conn: &Connection) -> Result<TransportGraph> {
    let mut graph = TransportGraph::new();
    let mut stmt = conn.prepare(
        "SELECT id, kind, src_x, src_y, src_plane, dst_x, dst_y, dst_plane, duration, bidirectional FROM transports ORDER BY id",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(r) = rows.next()? {
        let id: i64 = r.get(0)?;
        let kind: Option<String> = r.get(1)?;
        let (Some(source), Some(destination)) =
            (position(r.get(2)?, r.get(3)?, r.get(4)?), position(r.get(5)?, r.get(6)?, r.get(7)?))
        else {
            warn!("skipping transport {} with out-of-range endpoints", id);
            continue;
        };
        let duration: i64 = r.get(8)?;
        let bidirectional: i64 = r.get(9)?;
        let kind: TransportKind = kind.as_deref().unwrap_or("other").parse().unwrap_or_default();
        let t = Transport::new(id as u64, source, destination, duration.clamp(0, u32::MAX as i64) as u32).with_kind(kind);
        if bidirectional != 0 {
            graph.insert_bidirectional(t);
        } else {
            graph.insert(t);
        }
    }
    Ok(graph)
}

/// Enabled teleports only.
pub fn load_teleports(conn: &Connection) -> Result<TeleportCatalog> {
    let mut catalog = TeleportCatalog::default();
    let mut stmt = conn.prepare("SELECT id, name, dest_x, dest_y, dest_plane FROM teleports WHERE enabled != 0 ORDER BY id")?;
    let mut rows = stmt.query([])?;
    while let Some(r) = rows.next()? {
        let id: i64 = r.get(0)?;
        let name: String = r.get(1)?;
        let Some(destination) = position(r.get(2)?, r.get(3)?, r.get(4)?) else { continue };
        catalog.push(Teleport { id: id as u64, name, destination });
    }
    Ok(catalog)
}

pub fn load_blacklist(conn: &Connection) -> Result<Blacklist> {
    let mut stmt = conn.prepare("SELECT x, y, plane FROM blacklist")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?, r.get::<_, i64>(2)?)))?;
    let mut out = Blacklist::new();
    for row in rows {
        let (x, y, p) = row?;
        if let Some(pos) = position(x, y, p) {
            out.insert(pos);
        }
    }
    Ok(out)
}

/// Everything a search needs, loaded from one database.
#[derive(Clone, Debug, Default)]
pub struct World {
    pub collision: Arc<WorldCollisionMap>,
    pub local: Option<LocalCollisionMap>,
    pub transports: TransportGraph,
    pub teleports: TeleportCatalog,
    pub blacklist: Blacklist,
}

impl World {
    /// Search context over this snapshot; `teleports` is the caller's filtered selection.
    pub fn context<'a>(&'a self, start: PositionId, teleports: &'a [Teleport]) -> SearchContext<'a> {
        let ctx = SearchContext::new(start, &self.transports, &self.blacklist)
            .with_world(self.collision.as_ref())
            .with_teleports(teleports);
        match &self.local {
            Some(local) => ctx.with_local(local),
            None => ctx,
        }
    }
}

pub fn load_world(conn: &Connection, reconcile: bool) -> Result<World> {
    let collision = Arc::new(load_world_collision(conn, reconcile).context("load tiles")?);
    let in_instance = get_meta(conn, META_IN_INSTANCE)?
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let local = if in_instance {
        Some(load_local_collision(conn, Some(collision.clone())).context("load instance tiles")?)
    } else {
        None
    };
    let transports = load_transports(conn).context("load transports")?;
    let teleports = load_teleports(conn).context("load teleports")?;
    let blacklist = load_blacklist(conn).context("load blacklist")?;
    info!(
        "world loaded: {} transports, {} teleports, {} blacklisted, instance={}",
        transports.len(),
        teleports.len(),
        blacklist.len(),
        in_instance
    );
    Ok(World { collision, local, transports, teleports, blacklist })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionMap, Direction};
    use tempfile::NamedTempFile;

    #[test]
    fn create_tables_creates_required_tables() -> Result<()> {
        let tmp = NamedTempFile::new()?;
        let conn = open_rw(tmp.path())?;
        create_tables(&conn)?;
        for t in ["tiles", "transports", "teleports", "blacklist", "instance_tiles", "meta"] {
            assert!(table_exists(&conn, t)?, "expected table {} to exist", t);
        }
        // idempotent
        create_tables(&conn)?;
        Ok(())
    }

    #[test]
    fn outdated_tiles_layout_is_replaced() -> Result<()> {
        let tmp = NamedTempFile::new()?;
        let conn = open_rw(tmp.path())?;
        conn.execute_batch("CREATE TABLE tiles (x INTEGER, y INTEGER, plane INTEGER, walk_data TEXT);")?;
        create_tables(&conn)?;
        let cols: BTreeSet<&str> = ["walk_mask", "region_id"].into_iter().collect();
        assert!(table_has_columns(&conn, "tiles", &cols)?);
        Ok(())
    }

    #[test]
    fn loaders_round_trip_rows() -> Result<()> {
        let tmp = NamedTempFile::new()?;
        let mut conn = open_rw(tmp.path())?;
        create_tables(&conn)?;
        let a = PositionId::new(3200, 3200, 0);
        let b = PositionId::new(3201, 3200, 0);
        with_tx(&mut conn, |tx| {
            insert_tile(tx, a, [Direction::East].into_iter().collect(), false)?;
            insert_tile(tx, b, [Direction::West].into_iter().collect(), false)?;
            insert_tile(tx, PositionId::new(3202, 3200, 0), DirectionFlags::ALL, true)?;
            let door = Transport::new(5, a, PositionId::new(3200, 3201, 0), 1).with_kind(TransportKind::Door);
            insert_transport(tx, &door, true)?;
            insert_teleport(tx, &Teleport { id: 1, name: "Home".into(), destination: b }, true)?;
            insert_teleport(tx, &Teleport { id: 2, name: "Off".into(), destination: a }, false)?;
            insert_blacklisted(tx, PositionId::new(10, 10, 0))?;
            Ok(())
        })?;

        let world = load_world(&conn, true)?;
        assert!(world.collision.passable(3200, 3200, 0, Direction::East));
        assert!(!world.collision.walkable(PositionId::new(3202, 3200, 0)));
        assert_eq!(world.transports.len(), 2);
        assert_eq!(world.transports.find(PositionId::new(3200, 3201, 0), a).map(|t| t.kind), Some(TransportKind::Door));
        assert_eq!(world.teleports.len(), 1);
        assert!(world.blacklist.contains(PositionId::new(10, 10, 0)));
        assert!(world.local.is_none());
        Ok(())
    }

    #[test]
    fn instance_flag_loads_local_map() -> Result<()> {
        let tmp = NamedTempFile::new()?;
        let conn = open_rw(tmp.path())?;
        create_tables(&conn)?;
        set_meta(&conn, META_IN_INSTANCE, "1")?;
        insert_instance_tile(&conn, PositionId::new(6400, 100, 0), 0, false)?;
        insert_instance_tile(&conn, PositionId::new(6401, 100, 0), 0, true)?;
        assert_eq!(get_meta(&conn, META_IN_INSTANCE)?.as_deref(), Some("1"));

        let world = load_world(&conn, false)?;
        let local = world.local.as_ref().expect("instance map");
        assert_eq!(local.len(), 2);
        assert!(local.passable(6400, 100, 0, Direction::East));
        let ctx = world.context(PositionId::new(6400, 100, 0), &[]);
        assert!(ctx.in_instance);
        Ok(())
    }
}
