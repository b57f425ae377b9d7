mod charts;
mod config;
mod error;
mod github;
mod hosting;
mod publish_cmd;
mod reconcile;

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chartship", version, about = "Chart release helper for CI", long_about = None)]
struct Cli {
    /// Config file to use instead of ./.chartship.toml
    #[arg(global = true, long = "config")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ensure the tag and release for the current artifact version exist
    Publish {
        /// Check remote state without creating anything
        #[arg(long = "dry-run", default_value_t = false)]
        dry_run: bool,
        /// Attempts per GitHub call on transient failures
        #[arg(long)]
        retries: Option<usize>,
    },
    /// Print the chart directories and versions touched by the given paths
    Charts {
        /// Directory the paths are relative to
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Key prefixing the printed record
        #[arg(long)]
        key: Option<String>,
        paths: Vec<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let file_cfg = config::load_file_config(cli.config.as_deref())
        .await
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Publish { dry_run, retries } => {
            publish_cmd::run_publish(&file_cfg, dry_run, retries).await?;
        }
        Commands::Charts { root, key, paths } => {
            let key = key.unwrap_or_else(|| file_cfg.output_key.clone());
            let summary =
                charts::aggregate(&root, paths.iter().map(String::as_str), &file_cfg.descriptor)
                    .await?;
            println!("{}", charts::render(&key, &summary)?);
        }
    }

    Ok(())
}
