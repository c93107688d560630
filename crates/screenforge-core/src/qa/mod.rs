//! Criterion fan-out for quality assessment (C9): for one document, run
//! every criterion in its document type's catalog concurrently through
//! the dispatcher (C5), parsing each result into a judgment and
//! progressively updating the owning job record.

pub mod catalog;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::domain::{AssessmentDetail, AssessmentJob, AssessmentStatus, Progress};
use crate::llm::dispatcher::{DispatchRequest, Dispatcher};
use crate::llm::GenerationParams;

/// Where a running assessment persists progressive updates. Implemented
/// by the job store (C11); kept as a narrow trait here so this module
/// doesn't depend on the storage layer's concrete type.
#[async_trait::async_trait]
pub trait ProgressSink: Send + Sync {
    async fn update_progress(&self, assessment_id: &str, progress: Progress);
}

pub struct CriterionFanout {
    dispatcher: Arc<Dispatcher>,
    provider: String,
    model_id: String,
    params: GenerationParams,
    per_assessment_deadline: Duration,
}

impl CriterionFanout {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        provider: String,
        model_id: String,
        params: GenerationParams,
        per_assessment_deadline: Duration,
    ) -> Self {
        Self {
            dispatcher,
            provider,
            model_id,
            params,
            per_assessment_deadline,
        }
    }

    /// Run the full criterion fan-out for `job`, mutating it in place and
    /// reporting progress through `sink` after each individual result.
    pub async fn run(&self, job: &mut AssessmentJob, document_text: &str, sink: &dyn ProgressSink) {
        let Some(criteria) = catalog::criteria_for(&job.document_type) else {
            job.status = AssessmentStatus::Completed;
            job.message = Some(format!("unsupported document type: {}", job.document_type));
            return;
        };

        job.status = AssessmentStatus::ProcessingAssessment;
        let total = criteria.len() as u32;
        job.progress = Progress {
            current: 0,
            total,
            message: None,
        };

        let calls = criteria.iter().map(|criterion| {
            let dispatcher = Arc::clone(&self.dispatcher);
            let provider = self.provider.clone();
            let model_id = self.model_id.clone();
            let params = self.params.clone();
            let deadline = self.per_assessment_deadline;
            let document_text = document_text.to_string();
            let criterion = criterion.clone();
            async move {
                run_one_criterion(&dispatcher, &provider, &model_id, &params, deadline, &document_text, &criterion)
                    .await
            }
        });

        let mut completed = 0u32;
        let mut details = Vec::with_capacity(criteria.len());
        for result in join_all(calls).await {
            completed += 1;
            sink.update_progress(
                &job.assessment_id,
                Progress {
                    current: completed,
                    total,
                    message: None,
                },
            )
            .await;
            details.push(result);
        }

        job.progress = Progress {
            current: completed,
            total,
            message: None,
        };
        job.summary_total_criteria_evaluated = total;
        job.summary_negative_findings = details
            .iter()
            .filter(|d| catalog::is_negative_finding(&d.judgment))
            .count() as u32;
        job.assessment_details = details;
        job.status = AssessmentStatus::Completed;
    }
}

async fn run_one_criterion(
    dispatcher: &Dispatcher,
    provider: &str,
    model_id: &str,
    params: &GenerationParams,
    deadline: Duration,
    document_text: &str,
    criterion: &catalog::CriterionTemplate,
) -> AssessmentDetail {
    let prompt = catalog::render_prompt(document_text, criterion);

    let request = DispatchRequest {
        provider,
        model_id,
        system_prompt: "",
        user_message: &prompt,
        params: params.clone(),
    };

    match tokio::time::timeout(deadline, dispatcher.call(request)).await {
        Ok(Ok(completion)) => parse_criterion_response(criterion, &completion.raw_text),
        Ok(Err(_)) | Err(_) => AssessmentDetail {
            criterion_id: criterion.criterion_id.to_string(),
            criterion_text: criterion.criterion_text.to_string(),
            judgment: "Error: Parse Failure".to_string(),
            reason: "call did not complete successfully".to_string(),
            evidence_quotes: vec![],
        },
    }
}

fn parse_criterion_response(criterion: &catalog::CriterionTemplate, raw_text: &str) -> AssessmentDetail {
    let fenced = crate::llm::parsing::strip_markdown_fence(raw_text);
    match serde_json::from_str::<CriterionJudgment>(fenced) {
        Ok(parsed) => AssessmentDetail {
            criterion_id: criterion.criterion_id.to_string(),
            criterion_text: criterion.criterion_text.to_string(),
            judgment: parsed.judgment,
            reason: parsed.reason,
            evidence_quotes: parsed.evidence_quotes,
        },
        Err(_) => AssessmentDetail {
            criterion_id: criterion.criterion_id.to_string(),
            criterion_text: criterion.criterion_text.to_string(),
            judgment: "Error: Parse Failure".to_string(),
            reason: format!("unparseable response: {raw_text}"),
            evidence_quotes: vec![],
        },
    }
}

#[derive(serde::Deserialize)]
struct CriterionJudgment {
    judgment: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    evidence_quotes: Vec<String>,
}
