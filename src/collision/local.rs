use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{CollisionMap, Direction, DirectionFlags, WorldCollisionMap};
use crate::position::{is_local_addressing, PositionId};

/// Scene movement flag bits.
pub mod flags {
    pub const NORTH_WEST: u32 = 0x1;
    pub const NORTH: u32 = 0x2;
    pub const NORTH_EAST: u32 = 0x4;
    pub const EAST: u32 = 0x8;
    pub const SOUTH_EAST: u32 = 0x10;
    pub const SOUTH: u32 = 0x20;
    pub const SOUTH_WEST: u32 = 0x40;
    pub const WEST: u32 = 0x80;
    pub const OBJECT: u32 = 0x100;
    pub const FULL: u32 = 0x20000;
    pub const FLOOR_DECORATION: u32 = 0x40000;
    pub const FLOOR: u32 = 0x200000;

    pub const FULL_BLOCKING: u32 = OBJECT | FLOOR | FLOOR_DECORATION | FULL;
}

/// Wall or fullness bits that stop leaving a tile through `side`.
const fn side_mask(side: Direction) -> u32 {
    use flags::*;
    FULL_BLOCKING
        | match side {
            Direction::North => NORTH | NORTH_EAST | NORTH_WEST,
            Direction::East => EAST | NORTH_EAST | SOUTH_EAST,
            Direction::South => SOUTH | SOUTH_EAST | SOUTH_WEST,
            Direction::West => WEST | NORTH_WEST | SOUTH_WEST,
            _ => 0,
        }
}

/// Collision for an instanced scene, addressed in the local range (x above the threshold).
/// Tiles outside the scene are fully blocked; door and gate tiles never block.
#[derive(Clone, Debug, Default)]
pub struct LocalCollisionMap {
    tiles: HashMap<PositionId, u32>,
    doored: HashSet<PositionId>,
    world: Option<Arc<WorldCollisionMap>>,
}

impl LocalCollisionMap {
    pub fn new() -> Self { Self::default() }

    /// Positions in absolute addressing are answered by `world`.
    pub fn with_world(world: Arc<WorldCollisionMap>) -> Self {
        Self { world: Some(world), ..Self::default() }
    }

    pub fn set_flags(&mut self, pos: PositionId, scene_flags: u32) {
        self.tiles.insert(pos, scene_flags);
    }

    pub fn mark_doored(&mut self, pos: PositionId) {
        self.doored.insert(pos);
    }

    pub fn len(&self) -> usize { self.tiles.len() }

    pub fn is_empty(&self) -> bool { self.tiles.is_empty() }

    fn scene_flags(&self, x: i32, y: i32, plane: u8) -> u32 {
        PositionId::try_new(x, y, plane as i32)
            .and_then(|p| self.tiles.get(&p).copied())
            .unwrap_or(flags::FULL)
    }

    fn is_doored(&self, x: i32, y: i32, plane: u8) -> bool {
        PositionId::try_new(x, y, plane as i32).map(|p| self.doored.contains(&p)).unwrap_or(false)
    }

    fn side_blocked(&self, x: i32, y: i32, plane: u8, side: Direction) -> bool {
        self.scene_flags(x, y, plane) & side_mask(side) != 0
    }

    /// Whether the cardinal move `dir` out of (x, y) is blocked.
    fn cardinal_blocked(&self, x: i32, y: i32, plane: u8, dir: Direction) -> bool {
        let (dx, dy) = dir.delta();
        let (nx, ny) = (x + dx, y + dy);
        if self.is_doored(x, y, plane) || self.is_doored(nx, ny, plane) {
            return false;
        }
        self.side_blocked(x, y, plane, dir) || self.side_blocked(nx, ny, plane, dir.opposite())
    }

    /// A diagonal is blocked by either cardinal component, or by either side-step
    /// into the corner tile from the two intermediate tiles.
    fn diagonal_blocked(&self, x: i32, y: i32, plane: u8, dir: Direction) -> bool {
        let Some((vertical, horizontal)) = dir.components() else {
            return self.cardinal_blocked(x, y, plane, dir);
        };
        let (hx, _) = horizontal.delta();
        let (_, vy) = vertical.delta();
        self.cardinal_blocked(x, y, plane, vertical)
            || self.cardinal_blocked(x, y, plane, horizontal)
            || self.cardinal_blocked(x, y + vy, plane, vertical.opposite())
            || self.cardinal_blocked(x + hx, y, plane, horizontal.opposite())
            || self.cardinal_blocked(x + hx, y + vy, plane, vertical.opposite())
            || self.cardinal_blocked(x + hx, y + vy, plane, horizontal.opposite())
    }
}

impl CollisionMap for LocalCollisionMap {
    fn passable(&self, x: i32, y: i32, plane: u8, dir: Direction) -> bool {
        self.all_directions(x, y, plane).contains(dir)
    }

    fn all_directions(&self, x: i32, y: i32, plane: u8) -> DirectionFlags {
        let in_scene = PositionId::try_new(x, y, plane as i32).map(is_local_addressing).unwrap_or(false);
        if !in_scene {
            return match &self.world {
                Some(world) => world.all_directions(x, y, plane),
                None => DirectionFlags::NONE,
            };
        }
        let mut out: DirectionFlags = Direction::CARDINALS
            .into_iter()
            .filter(|d| !self.cardinal_blocked(x, y, plane, *d))
            .collect();
        if out.is_none() {
            return out;
        }
        for dir in Direction::ALL.into_iter().filter(|d| d.is_diagonal()) {
            if !self.diagonal_blocked(x, y, plane, dir) {
                out.insert(dir);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_X: u16 = 6400;
    const BASE_Y: u16 = 100;

    fn open_scene(w: u16, h: u16) -> LocalCollisionMap {
        let mut map = LocalCollisionMap::new();
        for x in BASE_X..BASE_X + w {
            for y in BASE_Y..BASE_Y + h {
                map.set_flags(PositionId::new(x, y, 0), 0);
            }
        }
        map
    }

    #[test]
    fn open_scene_interior_is_fully_passable() {
        let map = open_scene(3, 3);
        assert_eq!(map.all_directions(BASE_X as i32 + 1, BASE_Y as i32 + 1, 0), DirectionFlags::ALL);
        // edge of the scene borders missing, fully blocked tiles
        let corner = map.all_directions(BASE_X as i32, BASE_Y as i32, 0);
        assert!(corner.contains(Direction::North));
        assert!(corner.contains(Direction::NorthEast));
        assert!(!corner.contains(Direction::West));
        assert!(!corner.contains(Direction::SouthWest));
    }

    #[test]
    fn wall_blocks_both_sides_and_diagonals() {
        let mut map = open_scene(3, 3);
        let centre = PositionId::new(BASE_X + 1, BASE_Y + 1, 0);
        map.set_flags(centre, flags::NORTH);
        let (cx, cy) = (centre.x() as i32, centre.y() as i32);
        assert!(!map.passable(cx, cy, 0, Direction::North));
        assert!(!map.passable(cx, cy + 1, 0, Direction::South));
        assert!(!map.passable(cx, cy, 0, Direction::NorthEast));
        assert!(map.passable(cx, cy, 0, Direction::East));
    }

    #[test]
    fn doored_tiles_ignore_walls() {
        let mut map = open_scene(3, 3);
        let centre = PositionId::new(BASE_X + 1, BASE_Y + 1, 0);
        map.set_flags(centre, flags::OBJECT);
        assert!(!map.walkable(centre));
        map.mark_doored(centre);
        assert!(map.passable(centre.x() as i32, centre.y() as i32, 0, Direction::North));
    }

    #[test]
    fn absolute_positions_fall_back_to_world() {
        let mut world = WorldCollisionMap::new();
        world.open_area(3200, 3200, 2, 2, 0);
        let map = LocalCollisionMap::with_world(Arc::new(world));
        assert!(map.walkable(PositionId::new(3200, 3200, 0)));
        assert!(!map.walkable(PositionId::new(BASE_X, BASE_Y, 0)));
        assert!(!LocalCollisionMap::new().walkable(PositionId::new(3200, 3200, 0)));
    }
}
