use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use wfsmith_core::detect::{analyze_family, load_family};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Directory of workflow trace JSON files
    pub traces: PathBuf,

    /// Output catalogue directory (default: `<traces>/microstructures`)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Workflow name (default: the trace directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Unify partially-overlapping patterns into composites
    #[arg(long)]
    pub combine: bool,

    /// Keep patterns whose frequency never varies with graph size
    #[arg(long)]
    pub include_trivial: bool,

    /// Record the N smallest traces as interpolation anchors
    #[arg(long)]
    pub bases: Option<usize>,

    /// Path to a wfsmith.toml config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    let traces = std::fs::canonicalize(&args.traces)
        .with_context(|| format!("Cannot resolve path: {}", args.traces.display()))?;

    let mut config = super::resolve_config(args.config.as_ref(), &traces)?;
    if args.combine {
        config.detect.combine = true;
    }
    if args.include_trivial {
        config.detect.include_trivial = true;
    }
    if let Some(bases) = args.bases {
        config.detect.bases = bases;
    }
    config.validate()?;

    let workflow = args.name.clone().unwrap_or_else(|| {
        traces
            .file_name()
            .map_or_else(|| "workflow".to_string(), |n| n.to_string_lossy().to_string())
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Loading traces from {}", traces.display()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let family = load_family(&traces)?;
    if family.is_empty() {
        spinner.finish_and_clear();
        anyhow::bail!("No traces found in {}", traces.display());
    }
    spinner.set_message(format!("Detecting microstructures in {} traces", family.len()));

    let catalog = analyze_family(workflow, family, &config.detect)?;
    spinner.finish_and_clear();

    let out = args.out.unwrap_or_else(|| traces.join("microstructures"));
    catalog.save(&out)?;

    println!("Analyzed {} traces for '{}'", catalog.sizes.len(), catalog.workflow);
    for base in &catalog.bases {
        println!(
            "  base '{}' ({} nodes): {} microstructures",
            base.name,
            base.node_count,
            base.microstructures.len()
        );
    }
    println!("Catalogue written to {}", out.display());
    Ok(())
}
