//! CLI for threadget.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use threadget_core::config;

use commands::{run_completions, run_get, run_list};

/// Top-level CLI for threadget.
#[derive(Debug, Parser)]
#[command(name = "threadget", version)]
#[command(about = "Download every media file of an imageboard thread", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download all files of a thread.
    Get {
        /// Thread URL, e.g. https://boards.4chan.org/g/thread/123456.
        url: String,
        /// Directory to download into (default: current directory).
        #[arg(short = 'o', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Maximum concurrent downloads (default from config).
        #[arg(short = 'c', long, value_name = "N", value_parser = parse_concurrency)]
        concurrency: Option<usize>,
        /// Put files directly into DIR instead of a per-thread subdirectory.
        #[arg(long)]
        flat: bool,
        /// Hash files already on disk and re-fetch those whose MD5 differs
        /// from the thread's (also settable as `verify_md5` in the config).
        #[arg(long)]
        verify_md5: bool,
    },

    /// List the files of a thread without downloading them.
    List {
        /// Thread URL.
        url: String,
    },

    /// Print shell completions to stdout.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_concurrency(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Parses arguments and runs the command. `Ok(false)` means the command ran
/// but some downloads failed.
pub async fn run_from_args() -> Result<bool> {
    let cli = Cli::parse();

    if let CliCommand::Completions { shell } = cli.command {
        run_completions(shell);
        return Ok(true);
    }

    let cfg = config::load_or_init()?;
    tracing::debug!("loaded config: {:?}", cfg);

    match cli.command {
        CliCommand::Get {
            url,
            output_dir,
            concurrency,
            flat,
            verify_md5,
        } => {
            let output_dir = match output_dir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            run_get(&cfg, &url, &output_dir, concurrency, flat, verify_md5).await
        }
        CliCommand::List { url } => {
            run_list(&cfg, &url).await?;
            Ok(true)
        }
        CliCommand::Completions { .. } => Ok(true),
    }
}

#[cfg(test)]
mod tests;
