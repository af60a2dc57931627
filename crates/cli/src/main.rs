//! Codeprompt CLI
//!
//! Main entry point for the codeprompt command-line tool.
//! Turns a codebase into an LLM-ready prompt and runs templated
//! question/answer and code-block workflows against it.

mod commands;

use clap::{Parser, Subcommand};
use codeprompt_core::{config::AppConfig, logging};
use commands::{AskCommand, BlocksCommand, PromptCommand, RunCommand};
use std::path::PathBuf;

/// Codeprompt CLI - turn a codebase into an LLM-ready prompt
#[derive(Parser, Debug)]
#[command(name = "codeprompt")]
#[command(about = "Turn a codebase into an LLM-ready prompt", long_about = None)]
#[command(version)]
struct Cli {
    /// Root of the codebase to scan (default: current directory)
    #[arg(short, long, global = true, env = "CODEPROMPT_PATH")]
    path: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "CODEPROMPT_CONFIG")]
    config: Option<PathBuf>,

    /// Prompt template path (default: built-in template)
    #[arg(short, long, global = true, env = "CODEPROMPT_TEMPLATE")]
    template: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the rendered context prompt
    Prompt(PromptCommand),

    /// List the code blocks extracted from a template
    Blocks(BlocksCommand),

    /// Ask a question against the full codebase context
    Ask(AskCommand),

    /// Execute a template end to end (pre phase, model step, post phase)
    Run(RunCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment
    let mut config = AppConfig::load()?;

    // An explicit --config file sits between env and flag precedence
    if let Some(ref config_file) = cli.config {
        config = config.with_config_file(config_file)?;
    }

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.path,
        cli.template,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Codeprompt CLI starting");
    tracing::debug!("Scan root: {:?}", config.path);
    tracing::debug!("Template: {:?}", config.template);

    // Emit command.start span
    let command_name = match &cli.command {
        Commands::Prompt(_) => "prompt",
        Commands::Blocks(_) => "blocks",
        Commands::Ask(_) => "ask",
        Commands::Run(_) => "run",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Prompt(cmd) => cmd.execute(&config),
        Commands::Blocks(cmd) => cmd.execute(&config),
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Run(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    Ok(result?)
}
