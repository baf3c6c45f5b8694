use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use graphdome::bundling::RenderGroup;
use graphdome::config::VisConfig;
use graphdome::io::{JsonGraphReader, LayoutJsonWriter, Reader, Writer};
use graphdome::mesh::{CpuKernel, MeshKernel};
use graphdome::scene::GraphScene;

/// Lay out clustered graphs on a sphere and build bundled edge meshes.
#[derive(Parser)]
#[command(name = "graphdome")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML file overriding visualization defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Seed for treemap weights and jitter
    #[arg(short, long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the layout and write it as JSON
    Layout {
        /// Input graph file (.json)
        #[arg(short, long)]
        input: PathBuf,

        /// Output layout file
        #[arg(short, long, default_value = "layout.json")]
        output: PathBuf,
    },
    /// Build edge meshes, optionally animating highlights, and print batch sizes
    Mesh {
        /// Input graph file (.json)
        #[arg(short, long)]
        input: PathBuf,

        /// Nodes to highlight
        #[arg(long = "highlight", value_name = "NODE")]
        highlight: Vec<usize>,

        /// Frames of 1/60 s to animate after highlighting
        #[arg(long, default_value = "60")]
        frames: u32,

        /// Tessellate on the GPU (requires the `gpu` feature)
        #[arg(long)]
        gpu: bool,
    },
}

fn load_config(path: Option<&Path>, seed: Option<u64>) -> anyhow::Result<VisConfig> {
    let mut config = match path {
        Some(path) => VisConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => VisConfig::default(),
    };
    if seed.is_some() {
        config.layout_seed = seed;
    }
    Ok(config)
}

fn load_scene(input: &Path, config: VisConfig) -> anyhow::Result<GraphScene> {
    let graph = JsonGraphReader::new()
        .read(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let mut scene = GraphScene::new(graph, config)?;
    scene.initialize_layout();
    Ok(scene)
}

fn layout(input: &Path, output: &Path, config: VisConfig) -> anyhow::Result<()> {
    let scene = load_scene(input, config)?;
    LayoutJsonWriter::new().write(&scene, output)?;
    println!(
        "Wrote layout of {} nodes and {} edges to {}",
        scene.nodes().len(),
        scene.edges().len(),
        output.display()
    );
    Ok(())
}

#[cfg(feature = "gpu")]
fn kernel(gpu: bool) -> anyhow::Result<Box<dyn MeshKernel>> {
    if gpu {
        Ok(Box::new(graphdome::gpu::SplineCompute::new()?))
    } else {
        Ok(Box::new(CpuKernel::new()))
    }
}

#[cfg(not(feature = "gpu"))]
fn kernel(gpu: bool) -> anyhow::Result<Box<dyn MeshKernel>> {
    if gpu {
        anyhow::bail!("built without the `gpu` feature");
    }
    Ok(Box::new(CpuKernel::new()))
}

fn mesh(
    input: &Path,
    highlight: &[usize],
    frames: u32,
    gpu: bool,
    config: VisConfig,
) -> anyhow::Result<()> {
    let kernel = kernel(gpu)?;
    let mut scene = load_scene(input, config)?;

    for &node in highlight {
        anyhow::ensure!(
            node < scene.nodes().len(),
            "node {node} does not exist (graph has {} nodes)",
            scene.nodes().len()
        );
        scene.begin_highlight(node);
    }
    for _ in 0..frames {
        if !scene.is_animating() {
            break;
        }
        scene.tick(1.0 / 60.0);
    }

    println!("group        splines  vertices   indices");
    for group in RenderGroup::ALL {
        let batch = scene.batch(group);
        let vertices = if batch.is_empty() {
            0
        } else {
            scene
                .compute_vertices(group, kernel.as_ref())
                .context("mesh kernel dropped the request")?
                .len()
        };
        println!(
            "{:<12} {:>7} {:>9} {:>9}",
            format!("{group:?}").to_lowercase(),
            batch.splines.len(),
            vertices,
            batch.num_indices()
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.seed)?;

    match cli.command {
        Commands::Layout { input, output } => layout(&input, &output, config)?,
        Commands::Mesh {
            input,
            highlight,
            frames,
            gpu,
        } => mesh(&input, &highlight, frames, gpu, config)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_layout_subcommand() {
        let cli = Cli::try_parse_from([
            "graphdome", "layout", "--input", "graph.json", "--output", "out.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Layout { input, output } => {
                assert_eq!(input, PathBuf::from("graph.json"));
                assert_eq!(output, PathBuf::from("out.json"));
            }
            _ => panic!("Expected Layout command"),
        }
        assert!(cli.seed.is_none());
    }

    #[test]
    fn cli_parses_repeated_highlights() {
        let cli = Cli::try_parse_from([
            "graphdome",
            "mesh",
            "-i",
            "graph.json",
            "--highlight",
            "3",
            "--highlight",
            "5",
            "--seed",
            "9",
        ])
        .unwrap();
        match cli.command {
            Commands::Mesh {
                highlight,
                frames,
                gpu,
                ..
            } => {
                assert_eq!(highlight, vec![3, 5]);
                assert_eq!(frames, 60);
                assert!(!gpu);
            }
            _ => panic!("Expected Mesh command"),
        }
        assert_eq!(cli.seed, Some(9));
    }

    #[test]
    fn seed_flag_overrides_config() {
        let config = load_config(None, Some(4)).unwrap();
        assert_eq!(config.layout_seed, Some(4));
    }
}
