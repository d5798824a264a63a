pub mod collision;
pub mod commands;
pub mod config;
pub mod db;
pub mod logging;
pub mod position;
pub mod search;
pub mod transport;
pub mod util;

pub use collision::{CollisionMap, Direction, DirectionFlags, LocalCollisionMap, WorldCollisionMap};
pub use position::PositionId;
pub use search::{
    find, find_or_empty, find_with_stats, Algorithm, AreaRect, SearchContext, SearchFailure, SearchLimits,
    SearchOutcome, SearchStats, Step, Target,
};
pub use transport::{Blacklist, Teleport, TeleportCatalog, Transport, TransportGraph, TransportKind};
