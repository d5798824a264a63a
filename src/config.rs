use std::{env, path::PathBuf};

use crate::collision::MAX_SNAP_RADIUS;
use crate::search::{Algorithm, SearchLimits, DEFAULT_INITIAL_CAPACITY, DEFAULT_NODE_CAP};

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub db: Option<PathBuf>,
    pub node_cap: Option<usize>,
    pub algorithm: Option<Algorithm>,
    pub threads: Option<usize>,
    pub log_level: Option<String>,
    /// Radius for snapping a blocked point target to the nearest walkable tile.
    pub snap: Option<i32>,
}

impl Config {
    pub fn from_env_defaults() -> Self {
        let db = env::var("TILEPATH_DB").ok().map(PathBuf::from);
        let node_cap = env::var("TILEPATH_NODE_CAP").ok().and_then(|s| s.trim().parse::<usize>().ok());
        let algorithm = env::var("TILEPATH_ALGORITHM").ok().and_then(|s| s.parse::<Algorithm>().ok());
        let threads = env::var("TILEPATH_THREADS").ok().and_then(|s| s.trim().parse::<usize>().ok());
        let log_level = env::var("TILEPATH_LOG_LEVEL").ok();
        let snap = env::var("TILEPATH_SNAP")
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok())
            .map(|r| r.clamp(0, MAX_SNAP_RADIUS));
        Self { db, node_cap, algorithm, threads, log_level, snap }
    }

    /// Values set in `other` win.
    pub fn overlay(mut self, other: Config) -> Self {
        if other.db.is_some() { self.db = other.db; }
        if other.node_cap.is_some() { self.node_cap = other.node_cap; }
        if other.algorithm.is_some() { self.algorithm = other.algorithm; }
        if other.threads.is_some() { self.threads = other.threads; }
        if other.log_level.is_some() { self.log_level = other.log_level; }
        if other.snap.is_some() { self.snap = other.snap; }
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.db.clone().unwrap_or_else(crate::util::default_db_path)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm.unwrap_or_default()
    }

    pub fn limits(&self) -> SearchLimits {
        let node_cap = self.node_cap.unwrap_or(DEFAULT_NODE_CAP);
        SearchLimits { node_cap, initial_capacity: DEFAULT_INITIAL_CAPACITY.min(node_cap.max(1)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_prefers_set_values() {
        let cli = Config { db: Some("cli.db".into()), threads: Some(2), ..Config::default() };
        let env = Config { db: Some("env.db".into()), snap: Some(3), ..Config::default() };
        let cfg = cli.overlay(env);
        assert_eq!(cfg.db_path(), PathBuf::from("env.db"));
        assert_eq!(cfg.threads, Some(2));
        assert_eq!(cfg.snap, Some(3));
        assert_eq!(cfg.algorithm(), Algorithm::AStar);
        assert_eq!(cfg.limits().node_cap, DEFAULT_NODE_CAP);
    }

    #[test]
    fn test_small_node_cap_shrinks_initial_capacity() {
        let cfg = Config { node_cap: Some(10), ..Config::default() };
        assert_eq!(cfg.limits(), SearchLimits { node_cap: 10, initial_capacity: 10 });
    }

    #[test]
    fn test_from_env_defaults_reads_values() {
        std::env::set_var("TILEPATH_DB", "/tmp/world.db");
        std::env::set_var("TILEPATH_NODE_CAP", "5000");
        std::env::set_var("TILEPATH_ALGORITHM", "bfs");
        std::env::set_var("TILEPATH_THREADS", "8");
        std::env::set_var("TILEPATH_LOG_LEVEL", "debug");
        std::env::set_var("TILEPATH_SNAP", "4");

        let cfg = Config::from_env_defaults();
        assert_eq!(cfg.db.as_ref().unwrap().to_string_lossy(), "/tmp/world.db");
        assert_eq!(cfg.node_cap, Some(5000));
        assert_eq!(cfg.algorithm, Some(Algorithm::Bfs));
        assert_eq!(cfg.threads, Some(8));
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.snap, Some(4));

        std::env::set_var("TILEPATH_SNAP", "100000");
        assert_eq!(Config::from_env_defaults().snap, Some(MAX_SNAP_RADIUS));

        // cleanup
        for key in ["TILEPATH_DB", "TILEPATH_NODE_CAP", "TILEPATH_ALGORITHM", "TILEPATH_THREADS", "TILEPATH_LOG_LEVEL", "TILEPATH_SNAP"] {
            std::env::remove_var(key);
        }
    }
}
