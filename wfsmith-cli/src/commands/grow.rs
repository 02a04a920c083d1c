use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use rand::SeedableRng;
use rand::rngs::StdRng;

use wfsmith_core::catalog::Catalog;
use wfsmith_core::synthesize::synthesize;

#[derive(Args, Debug)]
pub struct GrowArgs {
    /// Catalogue directory produced by `wfsmith analyze`
    pub catalog: PathBuf,

    /// Target node count for the synthetic graph
    #[arg(long)]
    pub size: usize,

    /// Base graph to grow from (default: the smallest anchor)
    #[arg(long)]
    pub base: Option<String>,

    /// Allow cloning patterns with ambiguous structural overlap
    #[arg(long)]
    pub complex: bool,

    /// Seed for the random source (default: entropy)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output file for the grown graph (default: stdout)
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Path to a wfsmith.toml config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: GrowArgs) -> anyhow::Result<()> {
    let dir = std::fs::canonicalize(&args.catalog)
        .with_context(|| format!("Catalogue not found: {}", args.catalog.display()))?;
    let catalog = Catalog::load(&dir)
        .with_context(|| format!("Catalogue not found: {}", dir.display()))?;

    let config = super::resolve_config(args.config.as_ref(), &dir)?;
    let allow_complex = args.complex || config.synthesize.allow_complex;
    let seed = args.seed.or(config.synthesize.seed);

    let base = catalog.base(args.base.as_deref())?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let grown = synthesize(
        &base.graph,
        &base.microstructures,
        args.size,
        allow_complex,
        &mut rng,
    )?;

    let json = serde_json::to_string_pretty(&grown)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Cannot write {}", path.display()))?;
            println!(
                "Grew '{}' from {} to {} nodes ({} synthetic), written to {}",
                base.name,
                base.node_count,
                grown.node_count(),
                grown.synthetic_tasks().len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}
