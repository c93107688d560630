//! The rule engine (C6): stateless, deterministic hard/soft rule evaluation
//! over a record, its criteria, and the raw model outputs for it.
//!
//! Hard rules force an EXCLUDE/tier-0 decision outright; soft rules
//! contribute an additive penalty the ensemble aggregator (C7) subtracts
//! from the blended model score. Cross-framework element name mapping
//! (e.g. SPIDER's "sample" -> population slot) lives in `domain::frameworks`
//! and is consulted here rather than duplicated.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::frameworks::{self, Slot};
use crate::domain::{Criteria, ElementAssessment, ModelOutput, Record, RuleResult, RuleViolation, StudyType};

const POPULATION_PENALTY: f64 = 0.15;
const OUTCOME_PENALTY: f64 = 0.10;
const AMBIGUOUS_INTERVENTION_PENALTY: f64 = 0.05;

fn exclude_title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)systematic review|meta-analysis|letter to the editor").expect("static regex is valid")
    })
}

/// Evaluate all hard and soft rules for one (record, criteria, outputs) triple.
pub fn evaluate(record: &Record, criteria: &Criteria, outputs: &[ModelOutput]) -> RuleResult {
    let mut result = RuleResult::default();

    if let Some(violation) = publication_type_rule(record) {
        result.hard_violations.push(violation);
    }
    if let Some(violation) = language_rule(record, criteria) {
        result.hard_violations.push(violation);
    }
    if let Some(violation) = study_design_rule(record, criteria) {
        result.hard_violations.push(violation);
    }

    if !result.has_hard_violation() {
        if let Some(violation) = population_partial_match_rule(criteria, outputs) {
            result.soft_violations.push(violation);
        }
        if let Some(violation) = outcome_partial_match_rule(criteria, outputs) {
            result.soft_violations.push(violation);
        }
        if let Some(violation) = ambiguous_intervention_rule(criteria, outputs) {
            result.soft_violations.push(violation);
        }
    }

    result.total_penalty = result.soft_violations.iter().map(|v| v.penalty).sum::<f64>().min(1.0);
    result
}

fn publication_type_rule(record: &Record) -> Option<RuleViolation> {
    let is_excluded_type = matches!(record.study_type, StudyType::Editorial | StudyType::Erratum);
    let title_matches = exclude_title_pattern().is_match(&record.title);
    if is_excluded_type || title_matches {
        return Some(RuleViolation {
            rule_name: "PublicationType".to_string(),
            description: format!(
                "study_type={:?}, title_matches_exclude_pattern={}",
                record.study_type, title_matches
            ),
            penalty: 0.0,
        });
    }
    None
}

fn language_rule(record: &Record, criteria: &Criteria) -> Option<RuleViolation> {
    let allowed = criteria.language_restriction.as_ref()?;
    let lang = record.language.as_ref()?;
    if allowed.iter().any(|l| l.eq_ignore_ascii_case(lang)) {
        None
    } else {
        Some(RuleViolation {
            rule_name: "Language".to_string(),
            description: format!("record language '{lang}' not in allowed set {allowed:?}"),
            penalty: 0.0,
        })
    }
}

fn study_design_rule(record: &Record, criteria: &Criteria) -> Option<RuleViolation> {
    if matches!(record.study_type, StudyType::Unknown) {
        return None;
    }
    let study_type_name = format!("{:?}", record.study_type);
    let matched = criteria
        .study_design_exclude
        .iter()
        .any(|excluded| excluded.eq_ignore_ascii_case(&study_type_name));
    if matched {
        Some(RuleViolation {
            rule_name: "StudyDesign".to_string(),
            description: format!("study_type '{study_type_name}' is in study_design_exclude"),
            penalty: 0.0,
        })
    } else {
        None
    }
}

/// Find the fraction of models that reported `match=false` for the
/// canonical slot's local element name in this criteria's framework.
fn false_match_fraction(criteria: &Criteria, outputs: &[ModelOutput], slot: Slot) -> Option<f64> {
    let local_name = frameworks::local_name_for_slot(criteria.framework, slot)?;
    let matches: Vec<bool> = outputs
        .iter()
        .filter_map(|o| o.element_assessment.get(local_name))
        .filter_map(|a: &ElementAssessment| a.matched)
        .collect();
    if matches.is_empty() {
        return None;
    }
    let false_count = matches.iter().filter(|m| !**m).count();
    Some(false_count as f64 / matches.len() as f64)
}

fn population_partial_match_rule(criteria: &Criteria, outputs: &[ModelOutput]) -> Option<RuleViolation> {
    let fraction = false_match_fraction(criteria, outputs, Slot::Population)?;
    if fraction >= 0.5 {
        Some(RuleViolation {
            rule_name: "PopulationPartialMatch".to_string(),
            description: format!("{:.0}% of models reported population match=false", fraction * 100.0),
            penalty: POPULATION_PENALTY,
        })
    } else {
        None
    }
}

fn outcome_partial_match_rule(criteria: &Criteria, outputs: &[ModelOutput]) -> Option<RuleViolation> {
    let fraction = false_match_fraction(criteria, outputs, Slot::Outcome)?;
    if fraction >= 0.5 {
        Some(RuleViolation {
            rule_name: "OutcomePartialMatch".to_string(),
            description: format!("{:.0}% of models reported outcome match=false", fraction * 100.0),
            penalty: OUTCOME_PENALTY,
        })
    } else {
        None
    }
}

fn ambiguous_intervention_rule(criteria: &Criteria, outputs: &[ModelOutput]) -> Option<RuleViolation> {
    let local_name = frameworks::local_name_for_slot(criteria.framework, Slot::Intervention)?;
    let matches: Vec<bool> = outputs
        .iter()
        .filter_map(|o| o.element_assessment.get(local_name))
        .filter_map(|a: &ElementAssessment| a.matched)
        .collect();
    if matches.is_empty() {
        return None;
    }
    let all_true = matches.iter().all(|m| *m);
    let all_false = matches.iter().all(|m| !*m);
    if !all_true && !all_false {
        Some(RuleViolation {
            rule_name: "AmbiguousIntervention".to_string(),
            description: "models disagreed on intervention element match".to_string(),
            penalty: AMBIGUOUS_INTERVENTION_PENALTY,
        })
    } else {
        None
    }
}
