use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pl_config::Config;
use pl_core::{project_files, TextSearch};
use pl_tools::{GitCli, SilverSearcher};
use pl_utils::{display_relative, find_repo_root};

pub mod logging;

use logging::{init_logging, LogConfig};

#[derive(Parser)]
#[command(name = "pearl", version, about = "Command palette for a running Neovim session")]
struct Cli {
    /// Config file to read instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Editor RPC address: a socket path or host:port.
    #[arg(long, global = true)]
    nvim_address: Option<String>,
    /// Port to receive bridge messages on.
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Port of the looking-glass launcher.
    #[arg(long, global = true)]
    looking_glass_port: Option<u16>,
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the project files the palette would offer.
    Files {
        /// Directory inside the repository; defaults to the current one.
        dir: Option<PathBuf>,
    },
    /// Run the project text search and print its hits.
    Grep {
        query: String,
        /// Directory inside the repository; defaults to the current one.
        dir: Option<PathBuf>,
    },
    /// Print the resolved configuration.
    Config,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::resolve(cli.config.as_deref()).context("failed to load config")?;
    apply_flags(&mut config, &cli);

    let log_dir = config.log_dir();
    let _guard = init_logging(LogConfig {
        dir: &log_dir,
        verbose: cli.verbose,
        tui_mode: cli.command.is_none(),
    })?;

    match cli.command {
        None => pl_tui::run(&config),
        Some(Command::Files { dir }) => print_files(&repo_root(dir)?),
        Some(Command::Grep { query, dir }) => print_hits(&config, &query, &repo_root(dir)?),
        Some(Command::Config) => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}

/// Command-line flags take precedence over file and environment values.
fn apply_flags(config: &mut Config, cli: &Cli) {
    if let Some(address) = &cli.nvim_address {
        config.nvim_address = Some(address.clone());
    }
    if let Some(port) = cli.port {
        config.bridge_port = Some(port);
    }
    if let Some(port) = cli.looking_glass_port {
        config.looking_glass_port = Some(port);
    }
}

fn repo_root(dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    let dir = dir
        .canonicalize()
        .with_context(|| format!("{} does not exist", dir.display()))?;
    Ok(find_repo_root(&dir).unwrap_or(dir))
}

fn print_files(root: &Path) -> Result<()> {
    let files = project_files(&GitCli::new(), root)
        .with_context(|| format!("failed to list files in {}", root.display()))?;
    for file in files {
        println!("{file}");
    }
    Ok(())
}

fn print_hits(config: &Config, query: &str, root: &Path) -> Result<()> {
    let search = SilverSearcher::new(config.search_program.clone());
    let hits = search
        .search(query, root)
        .with_context(|| format!("`{}` failed", search.program()))?;
    for hit in hits {
        println!(
            "{}:{}:{}: {}",
            display_relative(root, &hit.path),
            hit.row,
            hit.col + 1,
            hit.line
        );
    }
    Ok(())
}
