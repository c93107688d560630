//! The ensemble aggregator (C7): blends model outputs and the rule
//! engine's penalty into one screening decision with a routing tier.

use crate::domain::{Decision, ModelOutput, RuleResult, Tier};

/// Confidence/score thresholds; `tau_high > tau_mid > tau_low` is an
/// invariant enforced at config-validation time, not here.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub tau_high: f64,
    pub tau_mid: f64,
    pub tau_low: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            tau_high: 0.85,
            tau_mid: 0.6,
            tau_low: 0.4,
        }
    }
}

/// The aggregated outcome of C7, before it's wrapped into a `ScreeningDecision`.
pub struct Aggregate {
    pub decision: Decision,
    pub tier: Tier,
    pub final_score: f64,
    pub ensemble_confidence: f64,
}

/// Run the aggregation algorithm described in §4.7.
pub fn aggregate(outputs: &[ModelOutput], rule_result: &RuleResult, thresholds: Thresholds) -> Aggregate {
    if rule_result.has_hard_violation() {
        return Aggregate {
            decision: Decision::Exclude,
            tier: Tier::RuleOverride,
            final_score: 0.0,
            ensemble_confidence: mean_confidence(outputs),
        };
    }

    let successful: Vec<&ModelOutput> = outputs.iter().filter(|o| !o.is_error()).collect();

    let base_score = if successful.is_empty() {
        0.0
    } else {
        successful.iter().map(|o| o.score).sum::<f64>() / successful.len() as f64
    };
    let final_score = (base_score - rule_result.total_penalty).max(0.0);
    let ensemble_confidence = mean_confidence(outputs);

    if successful.is_empty() {
        return Aggregate {
            decision: Decision::HumanReview,
            tier: Tier::HumanReview,
            final_score,
            ensemble_confidence,
        };
    }

    let include_votes = successful.iter().filter(|o| o.decision == Some(Decision::Include)).count();
    let exclude_votes = successful.iter().filter(|o| o.decision == Some(Decision::Exclude)).count();
    let all_include = include_votes == successful.len();
    let majority_include = include_votes * 2 > successful.len();
    let majority_exclude = exclude_votes * 2 > successful.len();

    if all_include && ensemble_confidence >= thresholds.tau_high && final_score >= thresholds.tau_mid {
        Aggregate {
            decision: Decision::Include,
            tier: Tier::HighConfidence,
            final_score,
            ensemble_confidence,
        }
    } else if majority_include && final_score >= thresholds.tau_mid {
        Aggregate {
            decision: Decision::Include,
            tier: Tier::Majority,
            final_score,
            ensemble_confidence,
        }
    } else if final_score < thresholds.tau_low && majority_exclude {
        Aggregate {
            decision: Decision::Exclude,
            tier: Tier::Majority,
            final_score,
            ensemble_confidence,
        }
    } else {
        Aggregate {
            decision: Decision::HumanReview,
            tier: Tier::HumanReview,
            final_score,
            ensemble_confidence,
        }
    }
}

fn mean_confidence(outputs: &[ModelOutput]) -> f64 {
    let successful: Vec<&ModelOutput> = outputs.iter().filter(|o| !o.is_error()).collect();
    if successful.is_empty() {
        return 0.0;
    }
    successful.iter().map(|o| o.confidence).sum::<f64>() / successful.len() as f64
}
