//! Batch coordinator (C10): accepts a set of uploaded documents, allocates
//! IDs, writes them to content-addressed storage, and spawns one background
//! worker per assessment that drives it through the QA pipeline and
//! persists progress to the job state store (C11) as it goes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::domain::{AssessmentJob, AssessmentStatus, BatchJob, BatchStatus, Progress};
use crate::error::StorageError;
use crate::qa::{CriterionFanout, ProgressSink};
use crate::storage::id_gen::IdGenerator;
use crate::storage::job_store::{self, JobStore};

/// Extracts plain text from a document's raw bytes. The extraction itself
/// (e.g. PDF parsing) is an external collaborator; this crate only depends
/// on the interface so any implementation can be plugged in.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, std::io::Error>;
}

/// One file as submitted by the caller, before it has an assessment id.
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

const ALLOWED_EXTENSION: &str = "pdf";

fn assessment_key(id: &str) -> String {
    format!("assessment:{id}")
}

fn batch_key(id: &str) -> String {
    format!("batch:{id}")
}

/// Errors raised while submitting a batch, before any worker is spawned.
#[derive(Debug, thiserror::Error)]
pub enum BatchSubmitError {
    #[error("file '{filename}' has unsupported extension, expected .{expected}")]
    UnsupportedExtension { filename: String, expected: &'static str },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coordinates multi-document QA batches: ID allocation, file storage,
/// per-assessment worker spawning, batch completion tracking, and PDF
/// retention sweeps.
pub struct BatchCoordinator {
    store: Arc<JobStore>,
    id_gen: Arc<IdGenerator>,
    fanout: Arc<CriterionFanout>,
    extractor: Arc<dyn TextExtractor>,
    pdf_dir: PathBuf,
    pdf_retention: Duration,
}

impl BatchCoordinator {
    pub fn new(
        store: Arc<JobStore>,
        id_gen: Arc<IdGenerator>,
        fanout: Arc<CriterionFanout>,
        extractor: Arc<dyn TextExtractor>,
        pdf_dir: PathBuf,
        pdf_retention: Duration,
    ) -> Self {
        Self {
            store,
            id_gen,
            fanout,
            extractor,
            pdf_dir,
            pdf_retention,
        }
    }

    /// Submit a batch of files, each tagged with its `document_type`.
    /// Persists the initial `uploading` state for every assessment and the
    /// owning `BatchJob`, then spawns a background worker per file.
    /// Returns the allocated `batch_id`.
    pub async fn submit_batch(
        &self,
        files: Vec<(UploadedFile, String)>,
    ) -> Result<String, BatchSubmitError> {
        for (file, _document_type) in &files {
            validate_extension(&file.filename)?;
        }

        let batch_id = self.id_gen.next_id("batch");
        let mut assessment_ids = Vec::with_capacity(files.len());

        for (file, document_type) in files {
            let assessment_id = self.id_gen.next_id("assessment");
            let pdf_path = self.write_content_addressed(&file.bytes).await?;

            let mut job = AssessmentJob::new(assessment_id.clone(), file.filename.clone(), document_type);
            job.saved_pdf_filename = Some(pdf_path.to_string_lossy().to_string());
            self.store
                .put(&assessment_key(&assessment_id), &job, job_store::assessment_ttl())
                .await?;

            assessment_ids.push(assessment_id.clone());

            let store = Arc::clone(&self.store);
            let fanout = Arc::clone(&self.fanout);
            let extractor = Arc::clone(&self.extractor);
            let batch_id = batch_id.clone();
            tokio::spawn(async move {
                run_assessment_worker(store, fanout, extractor, batch_id, assessment_id, pdf_path).await;
            });
        }

        let total_files = assessment_ids.len() as u32;
        let batch = BatchJob::new(batch_id.clone(), assessment_ids, total_files);
        self.store.put(&batch_key(&batch_id), &batch, job_store::batch_ttl()).await?;

        Ok(batch_id)
    }

    async fn write_content_addressed(&self, bytes: &[u8]) -> Result<PathBuf, std::io::Error> {
        tokio::fs::create_dir_all(&self.pdf_dir).await?;
        let hash = hex::encode(Sha256::digest(bytes));
        let path = self.pdf_dir.join(format!("{hash}.pdf"));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Delete stored PDFs older than the configured retention. Assessment
    /// records are never mutated by a sweep — only the files on disk.
    pub async fn sweep_expired_pdfs(&self) -> Result<u32, std::io::Error> {
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.pdf_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let now = std::time::SystemTime::now();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            let Ok(modified) = metadata.modified() else { continue };
            let Ok(age) = now.duration_since(modified) else { continue };
            if age > self.pdf_retention {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn validate_extension(filename: &str) -> Result<(), BatchSubmitError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    if ext.as_deref() == Some(ALLOWED_EXTENSION) {
        Ok(())
    } else {
        Err(BatchSubmitError::UnsupportedExtension {
            filename: filename.to_string(),
            expected: ALLOWED_EXTENSION,
        })
    }
}

async fn run_assessment_worker(
    store: Arc<JobStore>,
    fanout: Arc<CriterionFanout>,
    extractor: Arc<dyn TextExtractor>,
    batch_id: String,
    assessment_id: String,
    pdf_path: PathBuf,
) {
    let key = assessment_key(&assessment_id);
    let Ok(Some(mut job)) = store.get::<AssessmentJob>(&key).await else {
        tracing::error!(assessment_id = %assessment_id, "assessment job missing at worker start");
        return;
    };

    job.status = AssessmentStatus::PendingTextExtraction;
    let _ = store.put(&key, &job, job_store::assessment_ttl()).await;

    let bytes = match tokio::fs::read(&pdf_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            job.fail(format!("failed to read stored document: {e}"));
            let _ = store.put(&key, &job, job_store::assessment_ttl()).await;
            finalize_batch_if_done(&store, &batch_id).await;
            return;
        }
    };

    match extractor.extract_text(&bytes) {
        Ok(text) => {
            let sink = JobStoreProgressSink {
                store: Arc::clone(&store),
                key: key.clone(),
            };
            fanout.run(&mut job, &text, &sink).await;
            let _ = store.put(&key, &job, job_store::assessment_ttl()).await;
        }
        Err(e) => {
            job.fail(format!("text extraction failed: {e}"));
            let _ = store.put(&key, &job, job_store::assessment_ttl()).await;
        }
    }

    finalize_batch_if_done(&store, &batch_id).await;
}

/// Persists `Progress` updates to the job store after each criterion result,
/// per §4.9/§4.11's "update after each result, not just at the end".
struct JobStoreProgressSink {
    store: Arc<JobStore>,
    key: String,
}

#[async_trait::async_trait]
impl ProgressSink for JobStoreProgressSink {
    async fn update_progress(&self, _assessment_id: &str, progress: Progress) {
        let _ = self
            .store
            .update::<AssessmentJob, _>(&self.key, job_store::assessment_ttl(), |current| {
                let mut job = current.expect("assessment job exists while its own worker runs");
                job.progress = progress;
                job
            })
            .await;
    }
}

async fn finalize_batch_if_done(store: &JobStore, batch_id: &str) {
    let key = batch_key(batch_id);
    let Ok(Some(mut batch)) = store.get::<BatchJob>(&key).await else {
        return;
    };
    if batch.status == BatchStatus::Completed {
        return;
    }

    let assessments: Vec<(String, AssessmentJob)> = match store
        .get_multi::<AssessmentJob>(
            &batch
                .assessment_ids
                .iter()
                .map(|id| assessment_key(id))
                .collect::<Vec<_>>(),
        )
        .await
    {
        Ok(jobs) => jobs,
        Err(_) => return,
    };

    if assessments.len() < batch.assessment_ids.len() {
        return;
    }
    if !assessments.iter().all(|(_, job)| job.status.is_terminal()) {
        batch.status = BatchStatus::Processing;
        let _ = store.put(&key, &batch, job_store::batch_ttl()).await;
        return;
    }

    batch.status = BatchStatus::Completed;
    batch.successful_filenames = assessments
        .iter()
        .filter(|(_, job)| job.status == AssessmentStatus::Completed)
        .map(|(_, job)| job.filename.clone())
        .collect();
    batch.failed_filenames = assessments
        .iter()
        .filter(|(_, job)| job.status == AssessmentStatus::Error)
        .map(|(_, job)| job.filename.clone())
        .collect();

    let _ = store.put(&key, &batch, job_store::batch_ttl()).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::dispatcher::{Dispatcher, RetryConfig};
    use crate::llm::registry::{ModelDescriptor, ProviderEntry, Registry};
    use crate::llm::{GenerationParams, ModelKind, ProviderClient, RawCompletion};
    use crate::error::ProviderError;
    use async_trait::async_trait;

    struct StubClient;

    #[async_trait]
    impl ProviderClient for StubClient {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            _model_id: &str,
            _system_prompt: &str,
            _user_message: &str,
            _params: &GenerationParams,
        ) -> Result<RawCompletion, ProviderError> {
            Ok(RawCompletion {
                raw_text: r#"{"judgment": "Low risk", "reason": "fine", "evidence_quotes": []}"#.to_string(),
                latency_ms: 1,
            })
        }
    }

    struct FixedTextExtractor;

    impl TextExtractor for FixedTextExtractor {
        fn extract_text(&self, _bytes: &[u8]) -> Result<String, std::io::Error> {
            Ok("extracted document body".to_string())
        }
    }

    async fn coordinator(pdf_dir: PathBuf) -> (BatchCoordinator, Arc<JobStore>) {
        coordinator_with_retention(pdf_dir, Duration::from_secs(3600)).await
    }

    async fn coordinator_with_retention(pdf_dir: PathBuf, retention: Duration) -> (BatchCoordinator, Arc<JobStore>) {
        let pool = crate::storage::init_test_db().await.unwrap();
        let store = Arc::new(JobStore::new(pool));

        let mut registry = Registry::new(Duration::from_secs(60), 10);
        registry.register_provider(
            "stub",
            ProviderEntry {
                client: Arc::new(StubClient),
                models: vec![ModelDescriptor {
                    model_id: "m1".into(),
                    kind: ModelKind::Chat,
                    initial_rpm: 6000.0,
                    fallback: None,
                }],
                default_fallback: None,
            },
        );
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), RetryConfig::default()));
        let fanout = Arc::new(CriterionFanout::new(
            dispatcher,
            "stub".into(),
            "m1".into(),
            GenerationParams::default(),
            Duration::from_secs(5),
        ));

        let id_dir = tempfile::tempdir().unwrap();
        let id_gen = Arc::new(IdGenerator::new(crate::storage::id_gen::default_lock_path(id_dir.path())));

        let coordinator = BatchCoordinator::new(
            Arc::clone(&store),
            id_gen,
            fanout,
            Arc::new(FixedTextExtractor),
            pdf_dir,
            retention,
        );
        (coordinator, store)
    }

    #[tokio::test]
    async fn submit_batch_rejects_non_pdf_extension() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, _store) = coordinator(dir.path().join("pdfs")).await;

        let result = coordinator
            .submit_batch(vec![(
                UploadedFile {
                    filename: "paper.docx".into(),
                    bytes: vec![1, 2, 3],
                },
                "RCT".into(),
            )])
            .await;

        assert!(matches!(result, Err(BatchSubmitError::UnsupportedExtension { .. })));
    }

    #[tokio::test]
    async fn submit_batch_completes_all_assessments() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, store) = coordinator(dir.path().join("pdfs")).await;

        let batch_id = coordinator
            .submit_batch(vec![
                (
                    UploadedFile {
                        filename: "a.pdf".into(),
                        bytes: b"pdf bytes a".to_vec(),
                    },
                    "RCT".into(),
                ),
                (
                    UploadedFile {
                        filename: "b.pdf".into(),
                        bytes: b"pdf bytes b".to_vec(),
                    },
                    "RCT".into(),
                ),
            ])
            .await
            .expect("submit succeeds");

        let mut batch: Option<BatchJob> = None;
        for _ in 0..50 {
            batch = store.get(&batch_key(&batch_id)).await.unwrap();
            if matches!(&batch, Some(b) if b.status == BatchStatus::Completed) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let batch = batch.expect("batch exists");
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.successful_filenames.len(), 2);
        assert!(batch.failed_filenames.is_empty());
    }

    #[tokio::test]
    async fn sweep_removes_old_pdfs_only() {
        let dir = tempfile::tempdir().unwrap();
        let pdf_dir = dir.path().join("pdfs");
        let (coordinator, _store) = coordinator_with_retention(pdf_dir.clone(), Duration::from_secs(0)).await;

        tokio::fs::create_dir_all(&pdf_dir).await.unwrap();
        let old_path = pdf_dir.join("old.pdf");
        tokio::fs::write(&old_path, b"old").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let removed = coordinator.sweep_expired_pdfs().await.unwrap();
        assert_eq!(removed, 1);
        assert!(!old_path.exists());
    }
}
