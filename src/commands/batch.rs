use anyhow::{Context, Result};
use clap::Args;
use log::info;
use rayon::prelude::*;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::find_path::{run_query, Query, QueryResult};
use super::{open_world, resolve_config, CommonOpts};
use crate::config::Config;
use crate::db::World;

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    #[command(flatten)]
    pub common: CommonOpts,
    /// JSON file holding an array of queries (or {"queries": [...]})
    #[arg(long)]
    pub queries: PathBuf,
    /// Write results here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryFile {
    List(Vec<Query>),
    Wrapped { queries: Vec<Query> },
}

pub fn read_queries(path: &Path) -> Result<Vec<Query>> {
    let text = fs::read_to_string(path).with_context(|| format!("read queries file {}", path.display()))?;
    let parsed: QueryFile = serde_json::from_str(&text).with_context(|| format!("parse queries in {}", path.display()))?;
    Ok(match parsed {
        QueryFile::List(v) => v,
        QueryFile::Wrapped { queries } => queries,
    })
}

/// Runs every query in parallel over one shared snapshot; results keep input order.
pub fn run_batch(world: &World, queries: &[Query], cfg: &Config) -> Vec<QueryResult> {
    queries.par_iter().map(|q| run_query(world, q, cfg)).collect()
}

pub fn cmd_batch(args: BatchArgs) -> Result<()> {
    let cfg = resolve_config(&args.common)?;
    let queries = read_queries(&args.queries)?;
    let world = open_world(&cfg)?;

    let started = Instant::now();
    let results = run_batch(&world, &queries, &cfg);
    let found = results.iter().filter(|r| r.ok).count();
    info!(
        "batch: {}/{} queries found a path in {:.2?} ({} threads)",
        found,
        results.len(),
        started.elapsed(),
        rayon::current_num_threads()
    );

    let json = serde_json::to_string_pretty(&results)?;
    match &args.out {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("write results to {}", path.display()))?;
            println!("Wrote {} results to {}", results.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
