pub mod analyze;
pub mod grow;
pub mod inspect;

use std::path::{Path, PathBuf};

use clap::Subcommand;

use wfsmith_core::config::WfsmithConfig;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze a directory of workflow traces into a microstructure catalogue
    Analyze(analyze::AnalyzeArgs),
    /// Grow a synthetic graph from a catalogue to a target size
    Grow(grow::GrowArgs),
    /// Summarize a catalogue's base graphs and patterns
    Inspect(inspect::InspectArgs),
}

pub fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Analyze(args) => analyze::run(args),
        Command::Grow(args) => grow::run(args),
        Command::Inspect(args) => inspect::run(args),
    }
}

/// Load a config file when given, otherwise fall back to `wfsmith.toml`
/// next to the target directory or the defaults.
pub fn resolve_config(explicit: Option<&PathBuf>, dir: &Path) -> anyhow::Result<WfsmithConfig> {
    if let Some(path) = explicit {
        return Ok(WfsmithConfig::load(path)?);
    }
    let implicit = dir.join("wfsmith.toml");
    if implicit.exists() {
        return Ok(WfsmithConfig::load(&implicit)?);
    }
    Ok(WfsmithConfig::default())
}
