//! Distance command - distances from one embedding to a range of embeddings.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use tracing::{debug, info};

use embedrt_core::{engine_for, DistanceKind};

use super::config::load_config;

/// Arguments for the distance command.
#[derive(Args)]
pub struct DistanceArgs {
    /// JSON file holding an array of 512-element embeddings
    #[arg(short, long)]
    matrix: PathBuf,

    /// Index of the query embedding
    #[arg(short, long)]
    query: usize,

    /// First embedding to compare against (default: 0)
    #[arg(long)]
    start: Option<usize>,

    /// One past the last embedding to compare against (default: all)
    #[arg(long)]
    end: Option<usize>,

    /// Distance engine (default: from config)
    #[arg(short, long)]
    engine: Option<DistanceKind>,

    /// Print a JSON array instead of one distance per line
    #[arg(long)]
    json: bool,
}

pub async fn run(args: DistanceArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let kind = args.engine.unwrap_or(config.distance.engine);

    if !args.matrix.exists() {
        anyhow::bail!("Matrix file not found: {}", args.matrix.display());
    }

    let content = fs::read_to_string(&args.matrix)?;
    let matrix: Vec<Vec<f32>> = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid matrix file {}: {}", args.matrix.display(), e))?;

    let start = args.start.unwrap_or(0);
    let end = args.end.unwrap_or(matrix.len());
    let query = args.query;
    debug!(
        "Computing {} distances for query {} with {} engine",
        end.saturating_sub(start),
        query,
        kind
    );

    let started = Instant::now();
    let distances = tokio::task::spawn_blocking(move || {
        engine_for(kind).compute_range(&matrix, query, start, end)
    })
    .await??;
    info!(
        "Computed {} distances in {}ms",
        distances.len(),
        started.elapsed().as_millis()
    );

    if args.json {
        println!("{}", serde_json::to_string(&distances)?);
    } else {
        for (k, d) in distances.iter().enumerate() {
            println!("{}\t{}", start + k, d);
        }
    }

    Ok(())
}
