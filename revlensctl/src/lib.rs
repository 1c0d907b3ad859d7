use std::io;
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use revlens_core::browser::BrowserError;
use revlens_core::load_config;

mod commands;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] revlens_core::ConfigError),
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Review scraping command-line interface", long_about = None)]
pub struct Cli {
    /// Path to the revlens.toml configuration
    #[arg(long, default_value = "configs/revlens.toml")]
    pub config: PathBuf,
    /// Output format for inspection commands
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scrape every active target and write the results
    Run(RunArgs),
    /// List the configured targets
    Targets,
    /// Parse the configuration and report what it contains
    CheckConfig,
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Buffer diagnostics and print the reconstructed log at the end
    /// instead of streaming entries to the console as they happen
    #[arg(long)]
    pub final_log: bool,
    /// Launch the browser with a visible window
    #[arg(long)]
    pub headed: bool,
    /// Directory receiving reviews.json and reviews.last.log
    #[arg(long, default_value = "result")]
    pub out: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn run(cli: Cli) -> Result<()> {
    init_tracing();
    match &cli.command {
        Commands::Run(args) => commands::run::execute(&cli, args.clone()),
        Commands::Targets => commands::targets::execute(&cli),
        Commands::CheckConfig => check_config(&cli),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            clap_complete::generate(args.shell, &mut command, "revlensctl", &mut io::stdout());
            Ok(())
        }
    }
}

fn check_config(cli: &Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    let active = config.active_targets().count();
    println!(
        "configuration OK: {} targets ({} active)",
        config.webs.len(),
        active
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
