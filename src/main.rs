use anyhow::Result;
use clap::{Parser, Subcommand};

use tilepath::commands::{self, batch::BatchArgs, find_path::FindPathArgs, import_world::ImportWorldArgs};

#[derive(Parser, Debug)]
#[command(name = "tilepath", version, about = "Shortest paths over a tile world with transports and teleports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find one path from --from to --to (or to the nearest --area)
    FindPath(FindPathArgs),

    /// Run many queries from a JSON file in parallel
    Batch(BatchArgs),

    /// Create or update a world DB from a JSON description
    ImportWorld(ImportWorldArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::FindPath(args) => commands::find_path::cmd_find_path(args),
        Commands::Batch(args) => commands::batch::cmd_batch(args),
        Commands::ImportWorld(args) => commands::import_world::cmd_import_world(args),
    }
}
