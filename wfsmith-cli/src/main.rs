use clap::Parser;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "wfsmith",
    version,
    about = "Infer recurring structures in workflow traces and grow synthetic graphs"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Classify an error into an exit code.
///
/// Exit codes:
///   0 — success
///   1 — general/unknown error
///   2 — configuration error
///   3 — trace family or catalogue not found / empty
///   4 — synthesis rejected (shrink request, no eligible patterns)
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}");
    let lower = msg.to_lowercase();

    if lower.contains("config") {
        2
    } else if lower.contains("empty graph family")
        || lower.contains("no traces")
        || lower.contains("catalogue not found")
        || lower.contains("base graph not found")
    {
        3
    } else if lower.contains("cannot shrink") || lower.contains("no eligible microstructures") {
        4
    } else {
        1
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    match commands::run(cli.command) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}
