use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use shardlife_common::{Point, Region};
use shardlife_kernel::{GameConfig, LocalCluster, Soup};
use shardlife_stream::WorldRange;
use shardlife_tools::{GameInspector, RangeRenderer, render_cells};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shardlife-cli", about = "Distributed Game of Life toolbox")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON configuration file; defaults apply to missing fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the version and the effective configuration
    Info,
    /// Render how the world is split between members
    Partition {
        /// Number of members
        #[arg(short, long, default_value = "4")]
        nodes: usize,
        /// Render a single member instead of all of them
        #[arg(short, long)]
        index: Option<usize>,
        /// Keep ownership history across members, marking earlier owners
        #[arg(long)]
        history: bool,
    },
    /// Run an in-process cluster until every node reaches a generation
    Simulate {
        /// Number of nodes
        #[arg(short, long, default_value = "4")]
        nodes: usize,
        /// Generation every node must complete
        #[arg(short, long, default_value = "10")]
        generations: u64,
        /// Seed of the initial soup
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Fraction of cells alive in the initial soup
        #[arg(short, long, default_value = "0.3")]
        density: f64,
        /// Give up after this many cluster steps
        #[arg(long, default_value = "100000")]
        max_steps: usize,
        /// Nodes whose inbound pushes fail
        #[arg(long)]
        unreachable: Vec<usize>,
        /// Print the cells of the first node's newest complete generation
        #[arg(long)]
        show: bool,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<GameConfig> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => GameConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => {
            let range = WorldRange::new(config.world(), config.chunk())?;
            println!("shardlife-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "world: {0}x{0} cells, chunks {1}x{1}, {2} chunks",
                config.world_size,
                config.chunk_size,
                range.all_keys().len()
            );
            println!(
                "curve: {} cells, {} per chunk, key depth {}",
                range.curve_length(),
                range.chunk_curve_length(),
                range.chunk_depth()
            );
            println!(
                "pipeline: ring={} rule={} seed={}",
                config.ring_size, config.rule, config.seed
            );
            println!(
                "dispatch: max_concurrent={} timeout={}ms replicas={}",
                config.max_concurrent_requests, config.request_timeout_ms, config.replicas
            );
        }
        Commands::Partition {
            nodes,
            index,
            history,
        } => {
            let mut range = WorldRange::new(config.world(), config.chunk())?;
            let mut renderer = RangeRenderer::new();
            let indices: Vec<usize> = match index {
                Some(index) => vec![index],
                None => (0..nodes).collect(),
            };
            for index in indices {
                range.update_membership(index, nodes, config.replicas)?;
                if !history {
                    renderer = RangeRenderer::new();
                }
                println!(
                    "member {index}/{nodes}: curve [{}, {}) owns {} neighbours {}",
                    range.begin(),
                    range.end(),
                    range.contents().len(),
                    range.neighbors().len()
                );
                print!("{}", renderer.render(&range));
            }
        }
        Commands::Simulate {
            nodes,
            generations,
            seed,
            density,
            max_steps,
            unreachable,
            show,
        } => {
            let genesis = Soup::new(seed, density);
            let mut cluster = LocalCluster::new(&config, nodes, &genesis)?;
            for node in unreachable {
                cluster.set_unreachable(node, true);
            }
            let reached = cluster.run_until(generations, max_steps);
            tracing::info!(steps = cluster.steps(), reached, "simulation finished");

            for (i, node) in cluster.nodes().iter().enumerate() {
                let address = cluster.members().address(i).unwrap_or("?");
                println!("{address}: {}", GameInspector::summary(node));
                if cli.verbose {
                    for line in GameInspector::ring(node) {
                        println!("    {line}");
                    }
                }
            }
            match cluster.agreed_hash(generations) {
                Some(hash) => {
                    println!("generation {generations}: all nodes agree, hash={hash:#018x}")
                }
                None => println!("generation {generations}: no agreement across nodes"),
            }
            if show {
                let node = cluster.node(0);
                if let Some(latest) = node.pipeline().latest_complete() {
                    let region = Region::at_origin(Point::splat(config.world_size));
                    println!("generation {}:", latest.number().unwrap_or(0));
                    print!("{}", render_cells(latest.world(), region));
                }
            }
            if !reached {
                anyhow::bail!("generation {generations} not reached in {max_steps} steps");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_without_a_file() {
        assert_eq!(load_config(None).unwrap(), GameConfig::default());
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"world_size": 64, "chunk_size": 16, "ring_size": 3}}"#).unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.world_size, 64);
        assert_eq!(config.ring_size, 3);
        assert_eq!(config.max_concurrent_requests, 10);
    }

    #[test]
    fn invalid_geometry_fails_to_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"world_size": 48}}"#).unwrap();
        let error = load_config(Some(file.path())).unwrap_err();
        assert!(error.to_string().contains("power of two"), "{error}");
    }

    #[test]
    fn missing_file_names_the_path() {
        let error = load_config(Some(Path::new("/nonexistent/shardlife.json"))).unwrap_err();
        assert!(error.to_string().contains("/nonexistent/shardlife.json"));
    }

    #[test]
    fn cli_parses_simulate_flags() {
        let cli = Cli::try_parse_from([
            "shardlife-cli",
            "simulate",
            "--nodes",
            "3",
            "--unreachable",
            "2",
            "--config",
            "game.json",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("game.json")));
        assert!(matches!(
            cli.command,
            Commands::Simulate { nodes: 3, ref unreachable, .. } if unreachable == &[2]
        ));
    }
}
