//! Turns a raw LLM completion into the canonical decision shape.
//!
//! Models routinely wrap JSON in markdown code fences, use a handful of
//! field-name variants for the same concept (`element_assessment` vs.
//! `pico_assessment`), or emit extra prose before/after the JSON object.
//! This module is deliberately lenient about all three.

use std::collections::HashMap;

use serde_json::Value;

use crate::domain::{Decision, ElementAssessment};
use crate::error::ProviderError;

/// The canonical parsed form of one model's screening/assessment response.
#[derive(Debug, Clone)]
pub struct ParsedJudgment {
    pub decision: Decision,
    pub score: Option<f64>,
    pub confidence: Option<f64>,
    pub rationale: String,
    pub element_assessment: HashMap<String, ElementAssessment>,
    pub raw_response: String,
}

/// Strip a leading/trailing ```json or ``` fence, if present.
///
/// Also tolerates a bare fence with no language tag, and leading/trailing
/// whitespace around the fence markers.
pub fn strip_markdown_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let after_open = after_open
        .strip_prefix("json")
        .unwrap_or(after_open)
        .trim_start_matches('\n');
    match after_open.rfind("```") {
        Some(end) => after_open[..end].trim(),
        None => after_open.trim(),
    }
}

/// Find the first top-level `{...}` object in `text`, tolerating prose
/// before or after it. Returns `None` if no balanced object is found.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn decision_from_str(s: &str) -> Decision {
    match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
        "include" => Decision::Include,
        "exclude" => Decision::Exclude,
        _ => Decision::HumanReview,
    }
}

/// Parse one model's raw completion text into a [`ParsedJudgment`].
///
/// Accepts `element_assessment` or the legacy `pico_assessment` key for the
/// per-element breakdown. On any parse failure, returns
/// [`ProviderError::InvalidResponse`] carrying the original text for audit.
pub fn parse_judgment(raw_text: &str) -> Result<ParsedJudgment, ProviderError> {
    let fenced = strip_markdown_fence(raw_text);
    let candidate = extract_json_object(fenced).unwrap_or(fenced);

    let value: Value = serde_json::from_str(candidate).map_err(|_| ProviderError::InvalidResponse {
        raw: raw_text.to_string(),
    })?;

    let obj = value.as_object().ok_or_else(|| ProviderError::InvalidResponse {
        raw: raw_text.to_string(),
    })?;

    let decision = obj
        .get("decision")
        .and_then(Value::as_str)
        .map(decision_from_str)
        .unwrap_or(Decision::HumanReview);

    let score = obj.get("score").and_then(Value::as_f64);
    let confidence = obj.get("confidence").and_then(Value::as_f64);
    let rationale = obj
        .get("rationale")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let element_assessment = obj
        .get("element_assessment")
        .or_else(|| obj.get("pico_assessment"))
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| {
                    let assessment: ElementAssessment = serde_json::from_value(v.clone()).ok()?;
                    Some((k.clone(), assessment))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ParsedJudgment {
        decision,
        score,
        confidence,
        rationale,
        element_assessment,
        raw_response: raw_text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let text = "```json\n{\"decision\": \"include\"}\n```";
        assert_eq!(strip_markdown_fence(text), "{\"decision\": \"include\"}");
    }

    #[test]
    fn strips_bare_fence() {
        let text = "```\n{\"decision\": \"exclude\"}\n```";
        assert_eq!(strip_markdown_fence(text), "{\"decision\": \"exclude\"}");
    }

    #[test]
    fn passes_through_unfenced_text() {
        assert_eq!(strip_markdown_fence("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn parses_minimal_judgment() {
        let raw = r#"{"decision": "include", "score": 0.9, "confidence": 0.8, "rationale": "fits"}"#;
        let parsed = parse_judgment(raw).unwrap();
        assert_eq!(parsed.decision, Decision::Include);
        assert_eq!(parsed.score, Some(0.9));
        assert_eq!(parsed.confidence, Some(0.8));
        assert_eq!(parsed.rationale, "fits");
        assert!(parsed.element_assessment.is_empty());
    }

    #[test]
    fn parses_fenced_judgment_with_prose_wrapper() {
        let raw = "Here is my assessment:\n```json\n{\"decision\": \"exclude\", \"rationale\": \"wrong population\"}\n```\nLet me know if you need more.";
        let parsed = parse_judgment(raw).unwrap();
        assert_eq!(parsed.decision, Decision::Exclude);
        assert_eq!(parsed.rationale, "wrong population");
    }

    #[test]
    fn accepts_legacy_pico_assessment_key() {
        let raw = r#"{
            "decision": "uncertain",
            "rationale": "ambiguous",
            "pico_assessment": {
                "population": {"match": true, "evidence": "adults"}
            }
        }"#;
        let parsed = parse_judgment(raw).unwrap();
        assert_eq!(parsed.element_assessment.len(), 1);
        assert!(parsed.element_assessment.contains_key("population"));
    }

    #[test]
    fn unknown_decision_string_maps_to_human_review() {
        let raw = r#"{"decision": "maybe", "rationale": "unclear"}"#;
        let parsed = parse_judgment(raw).unwrap();
        assert_eq!(parsed.decision, Decision::HumanReview);
    }

    #[test]
    fn non_json_text_is_invalid_response() {
        let err = parse_judgment("I cannot answer this question.").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }
}
