//! respimg CLI - render responsive-image bundles from the command line.
//!
//! The CLI drives the same resolve/load protocol a host bundler would,
//! against the local filesystem: it renders every requested variant of a
//! source image and writes the final assets plus the synthesized module
//! to an output directory.
//!
//! # Usage
//!
//! ```bash
//! # Three widths, formats derived from the source
//! respimg render photo.jpg --sizes 480w,800w,1200w
//!
//! # Density descriptors with explicit formats
//! respimg render hero.png --sizes 1x,2x --output-formats webp,jpeg --display-width 1280
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// respimg - responsive-image bundle generator.
#[derive(Parser, Debug)]
#[command(name = "respimg")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Render every requested variant and the virtual module to disk
    Render(cli::render::RenderArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json_logs);

    tracing::debug!("respimg v{}", respimg_core::VERSION);

    match cli.command {
        Commands::Render(args) => cli::render::execute(args).await,
    }
}
