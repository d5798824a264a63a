use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::config::Config;
use crate::logging;
use crate::search::Algorithm;

pub mod batch;
pub mod find_path;
pub mod import_world;

#[derive(Args, Debug, Clone, Default)]
pub struct CommonOpts {
    /// World SQLite DB (default: ./world.db or TILEPATH_DB)
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// Search strategy: astar | bfs | hybridbfs | jps | flowfield
    #[arg(long)]
    pub algorithm: Option<Algorithm>,
    /// Maximum number of cached nodes across both search directions
    #[arg(long = "node-cap")]
    pub node_cap: Option<usize>,
    /// Number of worker threads (rayon)
    #[arg(long)]
    pub threads: Option<usize>,
    /// Log level (trace|debug|info|warn|error)
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
    /// Snap a blocked point target to the nearest walkable tile within this radius (0-64)
    #[arg(long, value_parser = clap::value_parser!(i32).range(0..=crate::collision::MAX_SNAP_RADIUS as i64))]
    pub snap: Option<i32>,
}

impl CommonOpts {
    fn to_config(&self) -> Config {
        Config {
            db: self.db.clone(),
            node_cap: self.node_cap,
            algorithm: self.algorithm,
            threads: self.threads,
            log_level: self.log_level.clone(),
            snap: self.snap,
        }
    }
}

/// CLI options overlaid with the environment (env wins when set), then logging and
/// the global thread pool are initialised from the result.
pub fn resolve_config(common: &CommonOpts) -> Result<Config> {
    let cfg = common.to_config().overlay(Config::from_env_defaults());
    logging::init(cfg.log_level.as_deref());
    if let Some(n) = cfg.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(n).build_global() {
            log::warn!("thread pool already initialised: {}", e);
        }
    }
    if let Some(cap) = cfg.node_cap {
        anyhow::ensure!(cap > 0, "node cap must be positive");
    }
    let db = cfg.db_path();
    anyhow::ensure!(db.exists(), "world DB not found: {}", db.display());
    log::debug!("using world DB {}", db.display());
    Ok(cfg)
}

pub(crate) fn open_world(cfg: &Config) -> Result<crate::db::World> {
    let path = cfg.db_path();
    let conn = crate::db::open_ro(&path)?;
    crate::db::load_world(&conn, true).with_context(|| format!("load world from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        common: CommonOpts,
    }

    #[test]
    fn snap_radius_is_bounded_on_the_command_line() {
        let ok = Harness::try_parse_from(["tilepath", "--snap", "12"]).unwrap();
        assert_eq!(ok.common.to_config().snap, Some(12));
        assert!(Harness::try_parse_from(["tilepath", "--snap", "100000"]).is_err());
        assert!(Harness::try_parse_from(["tilepath", "--snap", "-1"]).is_err());
    }
}
