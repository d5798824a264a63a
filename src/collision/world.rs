use std::collections::HashMap;

use super::{CollisionMap, Direction, DirectionFlags};
use crate::position::PositionId;

const REGION_TILES: usize = 64 * 64;

type RegionKey = (u32, u8);

/// Walk masks in absolute addressing, stored as dense 64x64 regions.
#[derive(Clone, Debug, Default)]
pub struct WorldCollisionMap {
    regions: HashMap<RegionKey, Box<[u8; REGION_TILES]>>,
}

#[inline]
fn region_index(pos: PositionId) -> usize {
    (((pos.x() & 63) as usize) << 6) | (pos.y() & 63) as usize
}

impl WorldCollisionMap {
    pub fn new() -> Self { Self::default() }

    pub fn set(&mut self, pos: PositionId, flags: DirectionFlags) {
        let region = self
            .regions
            .entry((pos.region_id(), pos.plane()))
            .or_insert_with(|| Box::new([0u8; REGION_TILES]));
        region[region_index(pos)] = flags.bits();
    }

    pub fn get(&self, pos: PositionId) -> DirectionFlags {
        self.regions
            .get(&(pos.region_id(), pos.plane()))
            .map(|r| DirectionFlags(r[region_index(pos)]))
            .unwrap_or(DirectionFlags::NONE)
    }

    pub fn region_count(&self) -> usize { self.regions.len() }

    /// Marks a rectangle walkable, keeping every move inside the rectangle.
    pub fn open_area(&mut self, x: u16, y: u16, width: u16, height: u16, plane: u8) {
        let inside = |tx: i32, ty: i32| {
            tx >= x as i32 && ty >= y as i32 && tx < x as i32 + width as i32 && ty < y as i32 + height as i32
        };
        for tx in x..x.saturating_add(width) {
            for ty in y..y.saturating_add(height) {
                let flags: DirectionFlags = Direction::ALL
                    .into_iter()
                    .filter(|d| {
                        let (dx, dy) = d.delta();
                        inside(tx as i32 + dx, ty as i32 + dy)
                    })
                    .collect();
                self.set(PositionId::new(tx, ty, plane), flags);
            }
        }
    }

    fn neighbour_allows(&self, pos: PositionId, dir: Direction) -> bool {
        let (dx, dy) = dir.delta();
        match pos.offset(dx, dy) {
            Some(n) => self.get(n).contains(dir.opposite()),
            None => false,
        }
    }

    /// Mask of one tile after reconciliation against its neighbours.
    pub fn reconciled_flags(&self, pos: PositionId) -> DirectionFlags {
        let mut flags = self.get(pos);
        if flags.is_none() { return flags; }
        for dir in Direction::CARDINALS {
            if flags.contains(dir) && !self.neighbour_allows(pos, dir) {
                flags.remove(dir);
            }
        }
        for dir in Direction::ALL.into_iter().filter(|d| d.is_diagonal()) {
            if !flags.contains(dir) { continue; }
            let Some((a, b)) = dir.components() else { continue };
            if !(flags.contains(a) && flags.contains(b)) || !self.neighbour_allows(pos, dir) {
                flags.remove(dir);
            }
        }
        flags
    }

    /// Copy where a move survives only if the neighbour allows the way back,
    /// and a diagonal only if both of its cardinal components survive.
    pub fn reconciled(&self) -> WorldCollisionMap {
        let mut out = WorldCollisionMap::new();
        for (&(region, plane), tiles) in &self.regions {
            let base_x = ((region >> 8) << 6) as u16;
            let base_y = ((region & 0xFF) << 6) as u16;
            for (idx, &mask) in tiles.iter().enumerate() {
                if mask == 0 { continue; }
                let pos = PositionId::new(base_x + (idx >> 6) as u16, base_y + (idx & 63) as u16, plane);
                let flags = self.reconciled_flags(pos);
                if !flags.is_none() {
                    out.set(pos, flags);
                }
            }
        }
        out
    }
}

impl CollisionMap for WorldCollisionMap {
    fn passable(&self, x: i32, y: i32, plane: u8, dir: Direction) -> bool {
        self.all_directions(x, y, plane).contains(dir)
    }

    fn all_directions(&self, x: i32, y: i32, plane: u8) -> DirectionFlags {
        match PositionId::try_new(x, y, plane as i32) {
            Some(pos) => self.get(pos),
            None => DirectionFlags::NONE,
        }
    }
}
