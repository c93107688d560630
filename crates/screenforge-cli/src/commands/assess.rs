//! Implementation of the `screenforge assess` command.
//!
//! Submits a batch of PDF files for quality assessment (C10), optionally
//! polling the job store until every assessment in the batch reaches a
//! terminal state.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use screenforge_core::batch::{BatchCoordinator, TextExtractor, UploadedFile};
use screenforge_core::config::Config;
use screenforge_core::domain::{BatchJob, BatchStatus};

use crate::commands::AssessArgs;
use crate::deps::RuntimeDeps;

/// Extracts text from a PDF's raw bytes using `pdf-extract`.
struct PdfExtractExtractor;

impl TextExtractor for PdfExtractExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, std::io::Error> {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }
}

pub async fn execute(config: &Config, args: &AssessArgs) -> anyhow::Result<()> {
    let deps = RuntimeDeps::init(config).await?;

    let coordinator = BatchCoordinator::new(
        deps.handles.job_store.clone(),
        deps.handles.id_generator.clone(),
        deps.qa_fanout.clone(),
        Arc::new(PdfExtractExtractor) as Arc<dyn TextExtractor>,
        deps.handles.pdf_dir.clone(),
        Duration::from_secs(config.storage.pdf_retention_sec),
    );

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let filename = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        let bytes = fs::read(path)?;
        files.push((UploadedFile { filename, bytes }, args.document_type.clone()));
    }

    let batch_id = coordinator.submit_batch(files).await?;
    eprintln!("=== screenforge assess ===");
    eprintln!("submitted batch {batch_id}");

    if !args.wait {
        return Ok(());
    }

    loop {
        let job: Option<BatchJob> = deps.handles.job_store.get(&format!("batch:{batch_id}")).await?;
        let Some(job) = job else {
            anyhow::bail!("batch {batch_id} disappeared from the job store");
        };
        if job.status == BatchStatus::Completed {
            eprintln!(
                "batch {batch_id} completed: {} succeeded, {} failed",
                job.successful_filenames.len(),
                job.failed_filenames.len()
            );
            for name in &job.failed_filenames {
                eprintln!("  failed: {name}");
            }
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    Ok(())
}
