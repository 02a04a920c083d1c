use std::fmt::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use wfsmith_core::catalog::Catalog;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Catalogue directory produced by `wfsmith analyze`
    pub catalog: PathBuf,

    /// Output format: text, json
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

pub fn run(args: InspectArgs) -> anyhow::Result<()> {
    let dir = std::fs::canonicalize(&args.catalog)
        .with_context(|| format!("Catalogue not found: {}", args.catalog.display()))?;
    let catalog = Catalog::load(&dir)
        .with_context(|| format!("Catalogue not found: {}", dir.display()))?;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    let mut out = String::new();
    writeln!(out, "Workflow: {}", catalog.workflow)?;
    writeln!(out, "Trace sizes: {:?}", catalog.sizes)?;
    for base in &catalog.bases {
        writeln!(out, "\nBase '{}' ({} nodes)", base.name, base.node_count)?;
        for ms in &base.microstructures {
            writeln!(
                out,
                "  {}: size {}, {} occurrences, {}",
                ms.name,
                ms.size,
                ms.occurrences.len(),
                if ms.simple { "simple" } else { "complex" }
            )?;
            let freqs: Vec<String> = ms
                .frequencies
                .iter()
                .map(|(size, count)| format!("{size}→{count}"))
                .collect();
            writeln!(out, "    frequency: {}", freqs.join(", "))?;
        }
    }
    print!("{out}");
    Ok(())
}
