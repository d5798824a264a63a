//! Collision providers: which of the 8 compass moves are open from a tile.

pub mod local;
pub mod world;

pub use local::LocalCollisionMap;
pub use world::WorldCollisionMap;

use crate::position::PositionId;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    NorthWest,
    North,
    NorthEast,
    West,
    East,
    SouthWest,
    South,
    SouthEast,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::West,
        Direction::East,
        Direction::South,
        Direction::North,
        Direction::SouthWest,
        Direction::SouthEast,
        Direction::NorthWest,
        Direction::NorthEast,
    ];

    pub const CARDINALS: [Direction; 4] = [Direction::West, Direction::East, Direction::South, Direction::North];

    pub const fn bit(self) -> u8 {
        match self {
            Direction::NorthWest => 0x01,
            Direction::North => 0x02,
            Direction::NorthEast => 0x04,
            Direction::West => 0x08,
            Direction::East => 0x10,
            Direction::SouthWest => 0x20,
            Direction::South => 0x40,
            Direction::SouthEast => 0x80,
        }
    }

    /// (dx, dy) with north = y+1.
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::NorthWest => (-1, 1),
            Direction::North => (0, 1),
            Direction::NorthEast => (1, 1),
            Direction::West => (-1, 0),
            Direction::East => (1, 0),
            Direction::SouthWest => (-1, -1),
            Direction::South => (0, -1),
            Direction::SouthEast => (1, -1),
        }
    }

    pub const fn opposite(self) -> Direction {
        match self {
            Direction::NorthWest => Direction::SouthEast,
            Direction::North => Direction::South,
            Direction::NorthEast => Direction::SouthWest,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
            Direction::SouthWest => Direction::NorthEast,
            Direction::South => Direction::North,
            Direction::SouthEast => Direction::NorthWest,
        }
    }

    /// The two cardinal moves a diagonal is composed of.
    pub const fn components(self) -> Option<(Direction, Direction)> {
        match self {
            Direction::NorthWest => Some((Direction::North, Direction::West)),
            Direction::NorthEast => Some((Direction::North, Direction::East)),
            Direction::SouthWest => Some((Direction::South, Direction::West)),
            Direction::SouthEast => Some((Direction::South, Direction::East)),
            _ => None,
        }
    }

    pub const fn is_diagonal(self) -> bool {
        self.components().is_some()
    }

    /// Key names used by exported `walk_data` objects.
    pub fn from_walk_key(key: &str) -> Option<Direction> {
        match key {
            "top" => Some(Direction::North),
            "bottom" => Some(Direction::South),
            "right" => Some(Direction::East),
            "left" => Some(Direction::West),
            "topright" => Some(Direction::NorthEast),
            "topleft" => Some(Direction::NorthWest),
            "bottomright" => Some(Direction::SouthEast),
            "bottomleft" => Some(Direction::SouthWest),
            _ => None,
        }
    }

    pub fn from_delta(dx: i32, dy: i32) -> Option<Direction> {
        Direction::ALL.into_iter().find(|d| d.delta() == (dx, dy))
    }
}

/// Bitset over the 8 directions, laid out like a stored `walk_mask`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct DirectionFlags(pub u8);

impl DirectionFlags {
    pub const NONE: DirectionFlags = DirectionFlags(0);
    pub const ALL: DirectionFlags = DirectionFlags(0xFF);

    pub const fn bits(self) -> u8 { self.0 }

    pub const fn contains(self, dir: Direction) -> bool {
        self.0 & dir.bit() != 0
    }

    pub fn insert(&mut self, dir: Direction) {
        self.0 |= dir.bit();
    }

    pub fn remove(&mut self, dir: Direction) {
        self.0 &= !dir.bit();
    }

    pub const fn is_none(self) -> bool { self.0 == 0 }

    pub const fn is_all(self) -> bool { self.0 == 0xFF }

    /// Open directions in expansion order (W, E, S, N, SW, SE, NW, NE).
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

impl FromIterator<Direction> for DirectionFlags {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut flags = DirectionFlags::NONE;
        for d in iter { flags.insert(d); }
        flags
    }
}

/// Largest search radius `nearest_walkable` will scan.
pub const MAX_SNAP_RADIUS: i32 = 64;

/// Read-only terrain query. Implementations must be safe to share between searches.
pub trait CollisionMap: Sync {
    fn passable(&self, x: i32, y: i32, plane: u8, dir: Direction) -> bool;

    /// Every open direction at once; providers with packed masks override this.
    fn all_directions(&self, x: i32, y: i32, plane: u8) -> DirectionFlags {
        Direction::ALL
            .into_iter()
            .filter(|d| self.passable(x, y, plane, *d))
            .collect()
    }

    fn walkable(&self, pos: PositionId) -> bool {
        !self.all_directions(pos.x() as i32, pos.y() as i32, pos.plane()).is_none()
    }

    /// Closest walkable tile to `pos` within `radius` (Euclidean), `pos` itself first.
    /// The radius is clamped to `0..=MAX_SNAP_RADIUS`.
    fn nearest_walkable(&self, pos: PositionId, radius: i32) -> Option<PositionId> {
        if self.walkable(pos) { return Some(pos); }
        let radius = radius.clamp(0, MAX_SNAP_RADIUS);
        let mut best: Option<(i32, PositionId)> = None;
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                let d2 = dx * dx + dy * dy;
                if d2 == 0 || d2 > radius * radius { continue; }
                if best.map(|(b, _)| d2 >= b).unwrap_or(false) { continue; }
                let Some(candidate) = pos.offset(dx, dy) else { continue };
                if self.walkable(candidate) {
                    best = Some((d2, candidate));
                }
            }
        }
        best.map(|(_, p)| p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OpenEast;

    impl CollisionMap for OpenEast {
        fn passable(&self, x: i32, _y: i32, _plane: u8, dir: Direction) -> bool {
            x >= 10 && dir == Direction::East
        }
    }

    #[test]
    fn direction_bits_are_distinct_and_cover_the_mask() {
        let all: DirectionFlags = Direction::ALL.into_iter().collect();
        assert_eq!(all, DirectionFlags::ALL);
        for d in Direction::ALL {
            assert_eq!(d.opposite().opposite(), d);
            let (dx, dy) = d.delta();
            assert_eq!(Direction::from_delta(dx, dy), Some(d));
        }
    }

    #[test]
    fn default_all_directions_uses_passable() {
        let map = OpenEast;
        assert_eq!(map.all_directions(10, 0, 0).iter().collect::<Vec<_>>(), vec![Direction::East]);
        assert!(map.all_directions(3, 0, 0).is_none());
        assert!(map.walkable(PositionId::new(11, 4, 0)));
    }

    #[test]
    fn nearest_walkable_prefers_closest_tile() {
        let map = OpenEast;
        let snapped = map.nearest_walkable(PositionId::new(8, 5, 0), 3);
        assert_eq!(snapped, Some(PositionId::new(10, 5, 0)));
        assert_eq!(map.nearest_walkable(PositionId::new(2, 5, 0), 3), None);
    }

    #[test]
    fn nearest_walkable_clamps_huge_radius() {
        let map = OpenEast;
        assert_eq!(map.nearest_walkable(PositionId::new(8, 5, 0), i32::MAX), Some(PositionId::new(10, 5, 0)));
        assert_eq!(map.nearest_walkable(PositionId::new(8, 5, 0), -4), None);
    }

    #[test]
    fn walk_keys_map_to_directions() {
        assert_eq!(Direction::from_walk_key("topleft"), Some(Direction::NorthWest));
        assert_eq!(Direction::from_walk_key("bottom"), Some(Direction::South));
        assert_eq!(Direction::from_walk_key("up"), None);
        assert_eq!(Direction::NorthEast.components(), Some((Direction::North, Direction::East)));
    }
}
