//! The screening pipeline (C8): renders the prompt once, fans out to every
//! configured model concurrently through the dispatcher (C5), feeds the
//! results through the rule engine (C6) and ensemble aggregator (C7), and
//! emits a `ScreeningDecision` plus an append-only `AuditEntry`.

pub mod prompts;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::domain::{AuditEntry, Criteria, ModelOutput, Record, ScreeningDecision};
use crate::ensemble::{self, Thresholds};
use crate::llm::dispatcher::{DispatchRequest, Dispatcher};
use crate::llm::GenerationParams;
use crate::rules;

/// One (provider, model) target the pipeline fans out to.
#[derive(Debug, Clone)]
pub struct ModelTarget {
    pub provider: String,
    pub model_id: String,
    pub params: GenerationParams,
}

pub struct ScreeningPipeline {
    dispatcher: Arc<Dispatcher>,
    targets: Vec<ModelTarget>,
    thresholds: Thresholds,
    per_record_deadline: Duration,
}

impl ScreeningPipeline {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        targets: Vec<ModelTarget>,
        thresholds: Thresholds,
        per_record_deadline: Duration,
    ) -> Self {
        Self {
            dispatcher,
            targets,
            thresholds,
            per_record_deadline,
        }
    }

    /// Screen one record against one criteria set, returning the decision
    /// and its audit entry.
    pub async fn screen(&self, record: &Record, criteria: &Criteria) -> (ScreeningDecision, AuditEntry) {
        let (prompt, prompt_hash) = prompts::render(record, criteria);

        let calls = self.targets.iter().map(|target| {
            let dispatcher = Arc::clone(&self.dispatcher);
            let prompt = prompt.clone();
            let prompt_hash = prompt_hash.clone();
            let target = target.clone();
            let deadline = self.per_record_deadline;
            async move { run_one_model(&dispatcher, &target, &prompt, &prompt_hash, deadline).await }
        });

        let outputs: Vec<ModelOutput> = join_all(calls).await;

        let rule_result = rules::evaluate(record, criteria, &outputs);
        let aggregate = ensemble::aggregate(&outputs, &rule_result, self.thresholds);

        let all_errored = outputs.iter().all(ModelOutput::is_error);
        let message = if all_errored {
            Some(aggregate_error_message(&outputs))
        } else {
            None
        };

        let decided_at = chrono::Utc::now();

        let decision = ScreeningDecision {
            record_id: record.record_id.clone(),
            decision: aggregate.decision,
            tier: aggregate.tier,
            final_score: aggregate.final_score,
            ensemble_confidence: aggregate.ensemble_confidence,
            model_outputs: outputs.clone(),
            rule_result: rule_result.clone(),
            human_decision: None,
            decided_at,
            message,
        };

        let model_versions: BTreeMap<String, String> = self
            .targets
            .iter()
            .map(|t| (t.provider.clone(), t.model_id.clone()))
            .collect();
        let prompt_hashes: BTreeMap<String, String> = outputs
            .iter()
            .map(|o| (o.model_id.clone(), o.prompt_hash.clone()))
            .collect();

        let audit = AuditEntry {
            record_id: record.record_id.clone(),
            criteria_id: criteria.criteria_id.clone(),
            criteria_version: criteria.criteria_version,
            model_versions,
            prompt_hashes,
            model_outputs: outputs,
            rule_result,
            final_decision: decision.decision,
            tier: decision.tier,
            seed: None,
            recorded_at: decided_at,
        };

        (decision, audit)
    }
}

async fn run_one_model(
    dispatcher: &Dispatcher,
    target: &ModelTarget,
    prompt: &str,
    prompt_hash: &str,
    deadline: Duration,
) -> ModelOutput {
    let request = DispatchRequest {
        provider: &target.provider,
        model_id: &target.model_id,
        system_prompt: "",
        user_message: prompt,
        params: target.params.clone(),
    };

    let call = dispatcher.call(request);

    match tokio::time::timeout(deadline, call).await {
        Ok(Ok(completion)) => match crate::llm::parsing::parse_judgment(&completion.raw_text) {
            Ok(parsed) => ModelOutput {
                model_id: target.model_id.clone(),
                decision: Some(parsed.decision),
                score: parsed.score.unwrap_or(0.0),
                confidence: parsed.confidence.unwrap_or(0.0),
                rationale: parsed.rationale,
                element_assessment: parsed.element_assessment.into_iter().collect(),
                raw_response: parsed.raw_response,
                prompt_hash: prompt_hash.to_string(),
                latency_ms: completion.latency_ms,
                error: None,
            },
            Err(_) => ModelOutput {
                model_id: target.model_id.clone(),
                decision: None,
                score: 0.0,
                confidence: 0.0,
                rationale: String::new(),
                element_assessment: BTreeMap::new(),
                raw_response: completion.raw_text,
                prompt_hash: prompt_hash.to_string(),
                latency_ms: completion.latency_ms,
                error: Some("invalid_response".to_string()),
            },
        },
        Ok(Err(dispatch_err)) => {
            let mut output = ModelOutput::timeout(target.model_id.clone(), prompt_hash.to_string(), 0);
            output.error = Some(dispatch_err.to_string());
            output
        }
        Err(_elapsed) => ModelOutput::timeout(target.model_id.clone(), prompt_hash.to_string(), deadline.as_millis() as u64),
    }
}

fn aggregate_error_message(outputs: &[ModelOutput]) -> String {
    outputs
        .iter()
        .filter_map(|o| o.error.as_deref())
        .collect::<Vec<_>>()
        .join("; ")
}
