use std::path::PathBuf;

use clap::{Parser, Subcommand};
use interest_common::{EntityId, OwnerId};
use interest_grid::ChunkCoord;
use interest_kernel::World;
use tracing_subscriber::EnvFilter;

mod config;
mod sim;

use config::CliConfig;
use sim::Simulation;

#[derive(Parser)]
#[command(name = "interest-cli", about = "Inspect and exercise the interest engine")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions and the default configuration
    Info,
    /// Run a visibility query over a small fixed scene
    Query {
        /// Maximum number of results
        #[arg(short, long, default_value = "16")]
        limit: usize,
        /// Observer radius, in chunks
        #[arg(short, long, default_value = "2")]
        radius: u8,
        /// Print the result as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Simulate moving entities synced to per-owner client worlds
    Simulate {
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "10")]
        ticks: u64,
        /// Number of tracked entities
        #[arg(short, long, default_value = "32")]
        entities: usize,
        /// Number of owners, each with one observer
        #[arg(short, long, default_value = "2")]
        owners: u64,
        /// Observer radius, in chunks
        #[arg(short, long, default_value = "2")]
        radius: u8,
        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Emit one JSON object per owner per tick
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("interest-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", interest_common::crate_info());
            println!("grid: {}", interest_grid::crate_info());
            println!("query: {}", interest_query::crate_info());
            println!("wire: {}", interest_wire::crate_info());
            println!("default config:");
            print!("{}", serde_yaml::to_string(&CliConfig::default())?);
        }
        Commands::Query { limit, radius, json } => {
            let world = scene(radius)?;
            let visible = interest_query::query(&world, OwnerId(1), limit)?;
            let ids: Vec<u64> = visible.iter().map(|id| id.0).collect();
            if json {
                println!("{}", serde_json::to_string(&ids)?);
            } else {
                println!("owner 1 sees {} of {} entities", ids.len(), world.entity_count()?);
                for id in &ids {
                    let chunk = world.chunk(EntityId(*id))?;
                    println!("  entity {id} chunk {:?}", chunk.map(|c| c.0));
                }
            }
        }
        Commands::Simulate {
            ticks,
            entities,
            owners,
            radius,
            config,
            json,
        } => {
            let config = CliConfig::load(config.as_deref())?;
            let mut sim = Simulation::new(&config, entities, owners, radius)?;
            let mut total = 0usize;
            for _ in 0..ticks {
                for stats in sim.step()? {
                    total += stats.bytes;
                    if json {
                        println!("{}", serde_json::to_string(&stats)?);
                    } else {
                        println!(
                            "tick {:>3} owner {}: {:>5} bytes, +{} ~{} -{} err {}, client holds {}",
                            stats.tick,
                            stats.owner,
                            stats.bytes,
                            stats.created,
                            stats.updated,
                            stats.removed,
                            stats.errors,
                            stats.client_entities
                        );
                    }
                }
            }
            tracing::info!(ticks, total_bytes = total, "simulation finished");
        }
    }

    Ok(())
}

/// 5x5x5 centered grid. Entity 1 is owner 1's observer at the origin; the
/// rest sit at fixed offsets, some outside the grid.
fn scene(radius: u8) -> anyhow::Result<World> {
    const PLACEMENTS: [(u64, (i32, i32, i32)); 10] = [
        (1, (0, 0, 0)),
        (2, (1, 0, 0)),
        (3, (0, 1, 0)),
        (4, (0, 0, 1)),
        (5, (-1, -1, -1)),
        (6, (0, 2, 0)),
        (7, (0, 2, 0)),
        (8, (-5, -1, -1)),
        (9, (0, 0, 3)),
        (10, (2323, 0, 3)),
    ];

    let mut world = World::new();
    world.set_chunk_count(5, 5, 5)?;
    for (id, (x, y, z)) in PLACEMENTS {
        let id = EntityId(id);
        world.track(id)?;
        if let Ok(chunk) = world.grid()?.chunk_from_coord(ChunkCoord::new(x, y, z)) {
            world.set_chunk(id, chunk)?;
        }
    }
    world.set_owner(EntityId(1), Some(OwnerId(1)))?;
    world.set_radius(EntityId(1), radius)?;
    Ok(world)
}
