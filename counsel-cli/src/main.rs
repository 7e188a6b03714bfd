//! Counsel CLI: ask questions about your legal documents from the terminal.
//!
//! Answers a single question, or runs an interactive REPL when no question
//! is given.

mod commands;
mod display;
mod repl;

use anyhow::Context;
use clap::Parser;
use counsel_core::{ChatEngine, EngineConfig, ToolRouter, TurnRequest};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Counsel: retrieval-augmented answers over your legal documents
#[derive(Parser, Debug)]
#[command(name = "counsel", version, about, long_about = None)]
struct Cli {
    /// Question to answer (starts interactive mode if omitted)
    question: Option<String>,

    /// Conversation session id (generated if omitted)
    #[arg(short, long)]
    session: Option<String>,

    /// User id used for document access filtering
    #[arg(short, long)]
    user: Option<String>,

    /// Search all documents regardless of access rules
    #[arg(long)]
    no_security: bool,

    /// Do not offer actions (function calling) to the model
    #[arg(long)]
    no_functions: bool,

    /// Configuration file path (replaces the layered lookup)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Workspace directory holding `.counsel/config.toml`
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage the local legal data store
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum DbAction {
    /// Create the local store (and optionally load demonstration data)
    Init {
        #[arg(long)]
        seed: bool,
    },
}

impl Cli {
    fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    fn turn_template(&self) -> TurnRequest {
        let mut request = TurnRequest::new("")
            .with_security(!self.no_security)
            .with_functions(!self.no_functions);
        request.session_id = self.session.clone();
        request.user_id = self.user.clone();
        request
    }
}

fn load_configuration(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let config = match &cli.config {
        Some(path) => counsel_core::load_config_file(path)?,
        None => {
            let workspace = cli
                .workspace
                .canonicalize()
                .unwrap_or_else(|_| cli.workspace.clone());
            counsel_core::load_config(Some(&workspace), None)
                .map_err(|e| anyhow::anyhow!("Configuration error: {e}"))?
        }
    };
    config.validate()?;
    Ok(config)
}

fn build_engine(config: EngineConfig) -> anyhow::Result<Arc<ChatEngine>> {
    let mut router =
        ToolRouter::new().with_timeout(Duration::from_secs(config.actions.handler_timeout_secs));
    if config.actions.enabled {
        counsel_tools::register_builtin_handlers(&mut router, &config.actions)
            .context("registering action handlers")?;
    }
    let engine = ChatEngine::from_config(config, router).context("starting the engine")?;
    Ok(Arc::new(engine))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Human-readable stderr + JSON file logging
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        );

    let log_dir = directories::ProjectDirs::from("dev", "counsel", "counsel")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "counsel.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let config = load_configuration(&cli)?;
    let template = cli.turn_template();

    if let Some(command) = cli.command {
        return commands::handle_command(command, &config);
    }

    let engine = build_engine(config)?;
    match cli.question {
        Some(question) => repl::run_single(engine, template, &question).await,
        None => repl::run_interactive(engine, template).await,
    }
}
