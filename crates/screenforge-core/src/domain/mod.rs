//! Core data model: records, criteria, model outputs, decisions, audit trail,
//! and the QA job/batch entities.
//!
//! These types are the shared vocabulary between the screening pipeline (C8),
//! the QA criterion fan-out (C9), the batch coordinator (C10), and the job
//! state store (C11). None of them hold behavior beyond small accessors —
//! the algorithms live in `rules`, `ensemble`, `screening`, and `qa`.

pub mod frameworks;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A classified study design. `Unknown` is a recall-safe default: it must
/// never trigger a hard exclusion rule (see `rules::hard`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudyType {
    Rct,
    SystematicReview,
    Cohort,
    CaseControl,
    CrossSectional,
    Diagnostic,
    Qualitative,
    Editorial,
    Erratum,
    Review,
    #[serde(other)]
    Unknown,
}

impl Default for StudyType {
    fn default() -> Self {
        StudyType::Unknown
    }
}

/// One piece of literature under screening. Immutable after ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub record_id: String,
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub pmid: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub study_type: StudyType,
    /// Raw source fields not modeled explicitly, preserved for audit/export.
    #[serde(default)]
    pub raw_fields: BTreeMap<String, serde_json::Value>,
}

impl Record {
    /// A record is viable for rule evaluation only if it carries a title;
    /// everything else is optional per the data model.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

/// The named inclusion/exclusion criteria framework. Each fixes its own
/// element list; `frameworks::elements_of` is the source of truth for which
/// canonical slots (population, intervention, comparator, outcome, ...) a
/// framework exposes and what it calls them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Framework {
    Pico,
    Picot,
    Picos,
    Peco,
    Picoc,
    Spider,
    Eclipse,
    Clip,
    Behemoth,
    Pcc,
    Custom,
}

/// Term lists for one framework element (e.g. "Population" in PICO).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementTerms {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub maybe: Vec<String>,
}

/// A framework-tagged inclusion/exclusion specification. Immutable during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criteria {
    pub criteria_id: String,
    pub criteria_version: u32,
    pub framework: Framework,
    /// Keyed by the framework's canonical element name (e.g. "population").
    pub elements: BTreeMap<String, ElementTerms>,
    #[serde(default)]
    pub language_restriction: Option<Vec<String>>,
    #[serde(default)]
    pub study_design_exclude: Vec<String>,
    #[serde(default)]
    pub date_window: Option<(i32, i32)>,
    /// SHA-256 hex digest of the rendered prompt for this criteria set.
    /// Populated by `screening::prompts` once the template is rendered;
    /// `None` until then.
    #[serde(default)]
    pub prompt_hash: Option<String>,
}

/// The screening decision a model can vote for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Include,
    Exclude,
    HumanReview,
}

/// Whether one framework element was judged a match, a non-match, or left
/// unassessed (`None`) by a given model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementAssessment {
    #[serde(rename = "match")]
    pub matched: Option<bool>,
    #[serde(default)]
    pub evidence: String,
}

/// The normalized result of one LLM call for one (record, criterion-or-record) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOutput {
    pub model_id: String,
    /// `None` when the call errored before producing a decision (timeout,
    /// network failure, unparseable response) — it then counts as a
    /// "no vote" in the aggregator rather than a vote for any label.
    pub decision: Option<Decision>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub element_assessment: BTreeMap<String, ElementAssessment>,
    pub raw_response: String,
    pub prompt_hash: String,
    pub latency_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
}

impl ModelOutput {
    pub fn is_error(&self) -> bool {
        self.decision.is_none()
    }

    /// A synthetic output representing a call that never completed in time.
    pub fn timeout(model_id: impl Into<String>, prompt_hash: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            model_id: model_id.into(),
            decision: None,
            score: 0.0,
            confidence: 0.0,
            rationale: String::new(),
            element_assessment: BTreeMap::new(),
            raw_response: String::new(),
            prompt_hash: prompt_hash.into(),
            latency_ms: elapsed_ms,
            error: Some("timeout".to_string()),
        }
    }
}

/// A single triggered rule, hard or soft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule_name: String,
    pub description: String,
    /// Always `0.0` for hard violations; for soft violations, the additive penalty.
    pub penalty: f64,
}

/// The output of the rule engine (C6) for one record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleResult {
    pub hard_violations: Vec<RuleViolation>,
    pub soft_violations: Vec<RuleViolation>,
    pub total_penalty: f64,
}

impl RuleResult {
    pub fn has_hard_violation(&self) -> bool {
        !self.hard_violations.is_empty()
    }
}

/// The routing tier a screening decision was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tier {
    /// Rule override (auto-exclude).
    RuleOverride = 0,
    /// High-confidence automatic decision.
    HighConfidence = 1,
    /// Majority-vote automatic decision.
    Majority = 2,
    /// Routed to a human reviewer.
    HumanReview = 3,
}

/// The per-record ensemble output of C7/C8.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningDecision {
    pub record_id: String,
    pub decision: Decision,
    pub tier: Tier,
    pub final_score: f64,
    pub ensemble_confidence: f64,
    pub model_outputs: Vec<ModelOutput>,
    pub rule_result: RuleResult,
    #[serde(default)]
    pub human_decision: Option<Decision>,
    pub decided_at: chrono::DateTime<chrono::Utc>,
    /// Set only when every model call errored; see §4.8 failure semantics.
    #[serde(default)]
    pub message: Option<String>,
}

/// An append-only reproducibility bundle for one screening decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub record_id: String,
    pub criteria_id: String,
    pub criteria_version: u32,
    pub model_versions: BTreeMap<String, String>,
    pub prompt_hashes: BTreeMap<String, String>,
    pub model_outputs: Vec<ModelOutput>,
    pub rule_result: RuleResult,
    pub final_decision: Decision,
    pub tier: Tier,
    #[serde(default)]
    pub seed: Option<u64>,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// The lifecycle status of a QA assessment job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Uploading,
    PendingTextExtraction,
    ProcessingAssessment,
    Completed,
    Error,
    PendingCelery,
}

impl AssessmentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AssessmentStatus::Completed | AssessmentStatus::Error)
    }
}

/// Monotonic progress counter for a running assessment. Observers must
/// ignore any `current` lower than one they've already seen (§5 ordering
/// guarantees) — progress updates may arrive out of completion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Progress {
    pub current: u32,
    pub total: u32,
    #[serde(default)]
    pub message: Option<String>,
}

/// One criterion's judgement within a QA assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentDetail {
    pub criterion_id: String,
    pub criterion_text: String,
    pub judgment: String,
    pub reason: String,
    #[serde(default)]
    pub evidence_quotes: Vec<String>,
}

/// A quality-assessment job for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentJob {
    pub assessment_id: String,
    pub filename: String,
    pub document_type: String,
    pub status: AssessmentStatus,
    #[serde(default)]
    pub progress: Progress,
    #[serde(default)]
    pub saved_pdf_filename: Option<String>,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub assessment_details: Vec<AssessmentDetail>,
    #[serde(default)]
    pub summary_total_criteria_evaluated: u32,
    #[serde(default)]
    pub summary_negative_findings: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AssessmentJob {
    pub fn new(assessment_id: impl Into<String>, filename: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            assessment_id: assessment_id.into(),
            filename: filename.into(),
            document_type: document_type.into(),
            status: AssessmentStatus::Uploading,
            progress: Progress::default(),
            saved_pdf_filename: None,
            raw_text: None,
            assessment_details: Vec::new(),
            summary_total_criteria_evaluated: 0,
            summary_negative_findings: 0,
            created_at: chrono::Utc::now(),
            message: None,
        }
    }

    /// Transition to `error`, recording a human-readable reason. Valid from
    /// any non-terminal state per the lifecycle in §3.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = AssessmentStatus::Error;
        self.message = Some(message.into());
    }
}

/// The lifecycle status of a batch of assessments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Uploading,
    Processing,
    Completed,
}

/// A batch owning a set of assessment ids (by reference, not composition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub batch_id: String,
    pub assessment_ids: Vec<String>,
    pub status: BatchStatus,
    pub total_files: u32,
    #[serde(default)]
    pub successful_filenames: Vec<String>,
    #[serde(default)]
    pub failed_filenames: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl BatchJob {
    pub fn new(batch_id: impl Into<String>, assessment_ids: Vec<String>, total_files: u32) -> Self {
        Self {
            batch_id: batch_id.into(),
            assessment_ids,
            status: BatchStatus::Uploading,
            total_files,
            successful_filenames: Vec::new(),
            failed_filenames: Vec::new(),
            created_at: chrono::Utc::now(),
        }
    }
}
