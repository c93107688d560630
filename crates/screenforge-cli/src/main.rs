/// screenforge CLI - literature screening and quality-assessment engine.
///
/// Entry point for the screenforge binary. Parses CLI arguments,
/// initializes logging, and dispatches to subcommand handlers.
mod commands;
mod deps;

use clap::Parser;
use screenforge_core::config::Config;
use tracing_subscriber::EnvFilter;

/// Literature screening and quality-assessment orchestration engine
#[derive(Parser)]
#[command(name = "screenforge")]
#[command(version)]
#[command(about = "Literature screening and quality-assessment orchestration engine")]
#[command(after_help = "\
Quick start:
  1. screenforge config --check         — validate configuration
  2. screenforge screen records.jsonl criteria.json   — run the HCN screening pipeline
  3. screenforge assess paper.pdf --document-type rct — run the QA criterion fan-out
  4. screenforge status <id>            — poll an assessment or batch")]
struct Cli {
    /// Path to config.toml
    #[arg(short = 'c', long, global = true, default_value = "~/.screenforge/config.toml")]
    config: String,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Validate and inspect configuration
    Config(commands::ConfigArgs),
    /// Screen literature records against a criteria set (C8)
    Screen(commands::ScreenArgs),
    /// Submit documents for quality assessment (C9/C10)
    Assess(commands::AssessArgs),
    /// Check the status of an assessment or batch (C11)
    Status(commands::StatusArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing-subscriber.
    //
    // Priority: RUST_LOG env var > --verbose/--quiet flags > default (warn).
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("screenforge=debug,screenforge_core=debug,info")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::new("screenforge=info,screenforge_core=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose)
        .compact()
        .init();

    // `config` manages its own validation lifecycle and runs even against
    // an invalid config, so load it without the validating `load_and_validate`.
    if let Commands::Config(args) = &cli.command {
        let config = Config::load(Some(&cli.config)).map_err(|e| {
            anyhow::anyhow!(
                "failed to load configuration: {e}\n\
                 Hint: point --config at a file, or set SCREENFORGE_CONFIG."
            )
        })?;
        return commands::config_cmd::execute(&config, args).await;
    }

    let config = Config::load_and_validate(Some(&cli.config)).map_err(|errors| {
        anyhow::anyhow!(
            "configuration is invalid:\n{}",
            errors.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n")
        )
    })?;

    match &cli.command {
        Commands::Config(_) => unreachable!(),
        Commands::Screen(args) => commands::screen::execute(&config, args).await?,
        Commands::Assess(args) => commands::assess::execute(&config, args).await?,
        Commands::Status(args) => commands::status::execute(&config, args).await?,
    }

    Ok(())
}
