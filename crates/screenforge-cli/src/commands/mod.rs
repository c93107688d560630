/// CLI subcommand argument definitions and implementations for screenforge.
pub mod assess;
pub mod config_cmd;
pub mod screen;
pub mod status;

use clap::Args;

/// Arguments for the `screen` subcommand.
#[derive(Debug, Args)]
pub struct ScreenArgs {
    /// Path to a JSONL file of records (one JSON object per line)
    pub records: String,

    /// Path to a JSON file holding the criteria set
    pub criteria: String,

    /// Write decisions to this file instead of stdout
    #[arg(long)]
    pub out: Option<String>,
}

/// Arguments for the `assess` subcommand.
#[derive(Debug, Args)]
pub struct AssessArgs {
    /// PDF files to submit as one batch
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Document type for every file in this batch (e.g. rct, cohort, systematic_review)
    #[arg(long)]
    pub document_type: String,

    /// Poll for completion and print the final summary instead of just the batch id
    #[arg(long)]
    pub wait: bool,
}

/// Arguments for the `status` subcommand.
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// A `batch:{id}` or `assessment:{id}` job store key, or a bare id (tried as both)
    pub id: String,
}

/// Arguments for the `config` subcommand.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Only validate the configuration, don't print it
    #[arg(long)]
    pub check: bool,
}
