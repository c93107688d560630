//! Framework-specific prompt templates for the screening pipeline (C8).
//!
//! One deterministic template per framework, formatting each element's
//! include/exclude/maybe term lists and a trailing instruction block
//! demanding the canonical JSON response shape. `INCLUDE` is the
//! mandated default when the record is ambiguous or the abstract is
//! missing, per §6.2.

use sha2::{Digest, Sha256};

use crate::domain::frameworks;
use crate::domain::{Criteria, Record};

/// Render the screening prompt for `record` under `criteria`, and return
/// both the rendered text and its SHA-256 hex digest (stored in every
/// audit entry, per §6.2).
pub fn render(record: &Record, criteria: &Criteria) -> (String, String) {
    let mut prompt = String::new();
    prompt.push_str("You are screening a literature record against inclusion/exclusion criteria.\n\n");
    prompt.push_str(&format!("Title: {}\n", record.title));
    prompt.push_str(&format!(
        "Abstract: {}\n",
        record.abstract_text.as_deref().unwrap_or("(not provided)")
    ));
    if let Some(year) = record.year {
        prompt.push_str(&format!("Year: {year}\n"));
    }
    prompt.push('\n');

    prompt.push_str("Criteria elements:\n");
    for (local_name, _slot) in frameworks::elements_of(criteria.framework) {
        let Some(terms) = criteria.elements.get(*local_name) else {
            continue;
        };
        prompt.push_str(&format!("- {local_name}:\n"));
        if !terms.include.is_empty() {
            prompt.push_str(&format!("  include: {}\n", terms.include.join(", ")));
        }
        if !terms.exclude.is_empty() {
            prompt.push_str(&format!("  exclude: {}\n", terms.exclude.join(", ")));
        }
        if !terms.maybe.is_empty() {
            prompt.push_str(&format!("  maybe: {}\n", terms.maybe.join(", ")));
        }
    }

    prompt.push_str(
        "\nRespond with a single JSON object: \
        {\"decision\": \"INCLUDE\"|\"EXCLUDE\"|\"HUMAN_REVIEW\", \"confidence\": 0-1, \
        \"score\": 0-1, \"element_assessment\": {<element>: {\"match\": true|false, \"evidence\": \"...\"}}, \
        \"rationale\": \"...\"}. \
        If the record is ambiguous or the abstract is missing, default to INCLUDE.\n",
    );

    let hash = hex::encode(Sha256::digest(prompt.as_bytes()));
    (prompt, hash)
}
