use serde::{Deserialize, Serialize};
use std::fmt;

/// Positions with an x above this value live in the instance-local addressing range.
pub const LOCAL_ADDRESSING_THRESHOLD: u16 = 6000;

pub const MAX_X: u16 = 0x3FFF;
pub const MAX_Y: u16 = 0x7FFF;
pub const MAX_PLANE: u8 = 0x7;

const Y_SHIFT: u32 = 14;
const PLANE_SHIFT: u32 = 29;

/// Packed tile coordinate: `x | y << 14 | plane << 29`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(pub u32);

impl PositionId {
    /// Encodes a coordinate. Out-of-range components are masked to their field width.
    pub const fn new(x: u16, y: u16, plane: u8) -> Self {
        let x = (x & MAX_X) as u32;
        let y = (y & MAX_Y) as u32;
        let p = (plane & MAX_PLANE) as u32;
        PositionId(x | y << Y_SHIFT | p << PLANE_SHIFT)
    }

    pub fn try_new(x: i32, y: i32, plane: i32) -> Option<Self> {
        if x < 0 || y < 0 || plane < 0 { return None; }
        if x > MAX_X as i32 || y > MAX_Y as i32 || plane > MAX_PLANE as i32 { return None; }
        Some(Self::new(x as u16, y as u16, plane as u8))
    }

    pub const fn x(self) -> u16 { (self.0 & MAX_X as u32) as u16 }

    pub const fn y(self) -> u16 { ((self.0 >> Y_SHIFT) & MAX_Y as u32) as u16 }

    pub const fn plane(self) -> u8 { ((self.0 >> PLANE_SHIFT) & MAX_PLANE as u32) as u8 }

    /// Same plane, shifted by (dx, dy). `None` once the result leaves the encodable range.
    pub fn offset(self, dx: i32, dy: i32) -> Option<Self> {
        Self::try_new(self.x() as i32 + dx, self.y() as i32 + dy, self.plane() as i32)
    }

    pub fn is_local_addressing(self) -> bool {
        is_local_addressing(self)
    }

    /// 64x64 region containing this tile: `(x >> 6) << 8 | (y >> 6)`.
    pub fn region_id(self) -> u32 {
        ((self.x() as u32 >> 6) << 8) | (self.y() as u32 >> 6)
    }

    /// Chebyshev distance on the same plane, `None` across planes.
    pub fn chebyshev(self, other: PositionId) -> Option<u32> {
        if self.plane() != other.plane() { return None; }
        let dx = (self.x() as i32 - other.x() as i32).unsigned_abs();
        let dy = (self.y() as i32 - other.y() as i32).unsigned_abs();
        Some(dx.max(dy))
    }
}

/// The one place the instance threshold is compared against.
pub fn is_local_addressing(pos: PositionId) -> bool {
    pos.x() > LOCAL_ADDRESSING_THRESHOLD
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x(), self.y(), self.plane())
    }
}

impl From<(u16, u16, u8)> for PositionId {
    fn from((x, y, plane): (u16, u16, u8)) -> Self {
        PositionId::new(x, y, plane)
    }
}

/// Parses `x,y,plane`.
pub fn parse_position(input: &str) -> Option<PositionId> {
    let parts: Vec<&str> = input.split(',').collect();
    if parts.len() != 3 { return None; }
    let x = parts[0].trim().parse::<i32>().ok()?;
    let y = parts[1].trim().parse::<i32>().ok()?;
    let plane = parts[2].trim().parse::<i32>().ok()?;
    PositionId::try_new(x, y, plane)
}
