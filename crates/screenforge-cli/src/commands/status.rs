//! Implementation of the `screenforge status` command.
//!
//! Looks up an `AssessmentJob` or `BatchJob` in the job store (C11) and
//! prints its current lifecycle state and progress.

use screenforge_core::config::Config;
use screenforge_core::domain::{AssessmentJob, BatchJob};
use screenforge_core::startup;

use crate::commands::StatusArgs;

pub async fn execute(config: &Config, args: &StatusArgs) -> anyhow::Result<()> {
    let handles = startup::bootstrap(config)
        .await
        .map_err(|e| anyhow::anyhow!("engine bootstrap failed: {e}"))?;

    let assessment_key = if args.id.starts_with("assessment:") {
        args.id.clone()
    } else {
        format!("assessment:{}", args.id)
    };
    let batch_key = if args.id.starts_with("batch:") {
        args.id.clone()
    } else {
        format!("batch:{}", args.id)
    };

    if let Some(job) = handles.job_store.get::<AssessmentJob>(&assessment_key).await? {
        eprintln!("=== assessment {} ===", job.assessment_id);
        eprintln!("status: {:?}", job.status);
        eprintln!("progress: {}/{}", job.progress.current, job.progress.total);
        eprintln!(
            "criteria evaluated: {} (negative findings: {})",
            job.summary_total_criteria_evaluated, job.summary_negative_findings
        );
        if let Some(message) = &job.message {
            eprintln!("message: {message}");
        }
        return Ok(());
    }

    if let Some(job) = handles.job_store.get::<BatchJob>(&batch_key).await? {
        eprintln!("=== batch {} ===", job.batch_id);
        eprintln!("status: {:?}", job.status);
        eprintln!(
            "files: {} total, {} succeeded, {} failed",
            job.total_files,
            job.successful_filenames.len(),
            job.failed_filenames.len()
        );
        return Ok(());
    }

    anyhow::bail!("no assessment or batch found for id '{}'", args.id);
}
