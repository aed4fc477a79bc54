//! ctb CLI - canonical Markdown conversion.
//!
//! Provides commands for:
//! - `md2md`: Rewrite a Markdown document in canonical form, or render it
//!   to HTML with `--md2html`

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::Md2MdArgs;
use output::Output;

/// ctb - canonical Markdown round-trip renderer.
#[derive(Parser)]
#[command(name = "ctb", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert Markdown to canonical Markdown (or HTML with --md2html).
    Md2md(Md2MdArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = matches!(&cli.command, Commands::Md2md(args) if args.verbose);

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Md2md(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&err);
        std::process::exit(1);
    }
}
