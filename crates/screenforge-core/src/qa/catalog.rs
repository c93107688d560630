//! The fixed per-document-type quality-assessment criteria catalog (§6.2).
//!
//! Each document type maps to a named appraisal tool and a fixed list of
//! criteria, each with its own prompt template. Judgment value sets vary
//! by tool (e.g. low/high/some-concerns for RoB 2; star-awarded/no-star
//! for Newcastle-Ottawa) — callers should not assume a shared vocabulary
//! beyond the negative-finding detection in `is_negative_finding`.

/// One appraisal criterion within a document type's catalog.
#[derive(Debug, Clone)]
pub struct CriterionTemplate {
    pub criterion_id: &'static str,
    pub criterion_text: &'static str,
}

/// Look up the fixed criteria set for a document type. Matching is
/// case-insensitive on the type name. Returns `None` if unsupported.
pub fn criteria_for(document_type: &str) -> Option<&'static [CriterionTemplate]> {
    match document_type.to_ascii_uppercase().as_str() {
        "RCT" => Some(ROB2_CRITERIA),
        "SYSTEMATIC_REVIEW" => Some(AMSTAR2_CRITERIA),
        "COHORT" | "CASE_CONTROL" => Some(NEWCASTLE_OTTAWA_CRITERIA),
        "CROSS_SECTIONAL" => Some(AXIS_CRITERIA),
        "DIAGNOSTIC" => Some(QUADAS2_CRITERIA),
        "QUALITATIVE" => Some(CASP_QUALITATIVE_CRITERIA),
        "ECONOMIC" => Some(CHEERS_CRITERIA),
        "ANIMAL" => Some(ARRIVE_CRITERIA),
        _ => None,
    }
}

/// Render a criterion-specific user prompt. The model is asked to return
/// `{judgment, reason, evidence_quotes}` as JSON.
pub fn render_prompt(document_text: &str, criterion: &CriterionTemplate) -> String {
    format!(
        "Document text:\n{document_text}\n\n\
        Assess the following quality criterion: {}\n\n\
        Respond with a single JSON object: \
        {{\"judgment\": \"...\", \"reason\": \"...\", \"evidence_quotes\": [\"...\"]}}.",
        criterion.criterion_text
    )
}

/// Whether a normalized judgment string counts as a negative finding, per
/// §4.9 step 6: contains any of {"no", "high risk", "poor", "not met"}, or
/// starts with "error".
pub fn is_negative_finding(judgment: &str) -> bool {
    let normalized = judgment.to_ascii_lowercase();
    if normalized.starts_with("error") {
        return true;
    }
    const NEGATIVE_MARKERS: [&str; 4] = ["no", "high risk", "poor", "not met"];
    NEGATIVE_MARKERS.iter().any(|marker| normalized.contains(marker))
}

const ROB2_CRITERIA: &[CriterionTemplate] = &[
    CriterionTemplate {
        criterion_id: "rob2_randomization",
        criterion_text: "Risk of bias arising from the randomization process",
    },
    CriterionTemplate {
        criterion_id: "rob2_deviations",
        criterion_text: "Risk of bias due to deviations from intended interventions",
    },
    CriterionTemplate {
        criterion_id: "rob2_missing_data",
        criterion_text: "Risk of bias due to missing outcome data",
    },
    CriterionTemplate {
        criterion_id: "rob2_measurement",
        criterion_text: "Risk of bias in measurement of the outcome",
    },
    CriterionTemplate {
        criterion_id: "rob2_selection",
        criterion_text: "Risk of bias in selection of the reported result",
    },
];

const AMSTAR2_CRITERIA: &[CriterionTemplate] = &[
    CriterionTemplate {
        criterion_id: "amstar2_protocol",
        criterion_text: "Did the review provide a protocol registered before commencement?",
    },
    CriterionTemplate {
        criterion_id: "amstar2_search",
        criterion_text: "Was the literature search strategy comprehensive?",
    },
    CriterionTemplate {
        criterion_id: "amstar2_duplicate_selection",
        criterion_text: "Was study selection performed in duplicate?",
    },
    CriterionTemplate {
        criterion_id: "amstar2_funding",
        criterion_text: "Did the review report funding sources of included studies?",
    },
];

const NEWCASTLE_OTTAWA_CRITERIA: &[CriterionTemplate] = &[
    CriterionTemplate {
        criterion_id: "nos_selection",
        criterion_text: "Representativeness of the exposed/case cohort (selection)",
    },
    CriterionTemplate {
        criterion_id: "nos_comparability",
        criterion_text: "Comparability of cohorts on the basis of design or analysis",
    },
    CriterionTemplate {
        criterion_id: "nos_outcome",
        criterion_text: "Assessment of outcome or exposure ascertainment",
    },
];

const AXIS_CRITERIA: &[CriterionTemplate] = &[
    CriterionTemplate {
        criterion_id: "axis_objectives",
        criterion_text: "Were the study objectives clearly stated?",
    },
    CriterionTemplate {
        criterion_id: "axis_sample",
        criterion_text: "Was the sample size justified?",
    },
    CriterionTemplate {
        criterion_id: "axis_nonresponders",
        criterion_text: "Were non-responders described or compared with responders?",
    },
];

const QUADAS2_CRITERIA: &[CriterionTemplate] = &[
    CriterionTemplate {
        criterion_id: "quadas2_patient_selection",
        criterion_text: "Risk of bias in patient selection",
    },
    CriterionTemplate {
        criterion_id: "quadas2_index_test",
        criterion_text: "Risk of bias in the index test's conduct or interpretation",
    },
    CriterionTemplate {
        criterion_id: "quadas2_reference_standard",
        criterion_text: "Risk of bias in the reference standard's conduct or interpretation",
    },
];

const CASP_QUALITATIVE_CRITERIA: &[CriterionTemplate] = &[
    CriterionTemplate {
        criterion_id: "casp_aims",
        criterion_text: "Was there a clear statement of the aims of the research?",
    },
    CriterionTemplate {
        criterion_id: "casp_methodology",
        criterion_text: "Is a qualitative methodology appropriate?",
    },
    CriterionTemplate {
        criterion_id: "casp_recruitment",
        criterion_text: "Was the recruitment strategy appropriate to the aims of the research?",
    },
];

const CHEERS_CRITERIA: &[CriterionTemplate] = &[
    CriterionTemplate {
        criterion_id: "cheers_perspective",
        criterion_text: "Was the study perspective clearly stated and justified?",
    },
    CriterionTemplate {
        criterion_id: "cheers_comparators",
        criterion_text: "Were the comparators appropriately described?",
    },
];

const ARRIVE_CRITERIA: &[CriterionTemplate] = &[
    CriterionTemplate {
        criterion_id: "arrive_sample_size",
        criterion_text: "Was the sample size determination explained?",
    },
    CriterionTemplate {
        criterion_id: "arrive_randomization",
        criterion_text: "Was allocation to groups randomized?",
    },
    CriterionTemplate {
        criterion_id: "arrive_blinding",
        criterion_text: "Was the person assessing outcomes blinded to group assignment?",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rct_maps_to_rob2() {
        let criteria = criteria_for("RCT").unwrap();
        assert!(criteria.iter().any(|c| c.criterion_id == "rob2_randomization"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(criteria_for("rct").is_some());
        assert!(criteria_for("Cohort").is_some());
    }

    #[test]
    fn unknown_document_type_returns_none() {
        assert!(criteria_for("ASTROLOGY").is_none());
    }

    #[test]
    fn negative_finding_detection() {
        assert!(is_negative_finding("High risk"));
        assert!(is_negative_finding("No"));
        assert!(is_negative_finding("Not met"));
        assert!(is_negative_finding("Poor"));
        assert!(is_negative_finding("Error: Parse Failure"));
        assert!(!is_negative_finding("Low risk"));
        assert!(!is_negative_finding("Yes"));
    }
}
