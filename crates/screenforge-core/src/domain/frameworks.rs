//! Canonical slot mapping across criteria frameworks.
//!
//! The rule engine (C6) and prompt templates need to talk about "the
//! population element" or "the outcome element" without caring whether the
//! criteria set is PICO, SPIDER, or ECLIPSE. This module is the single
//! source of truth mapping each framework's local element names onto a
//! small set of canonical slots.

use super::Framework;

/// Canonical element slots the rule engine and ensemble aggregator reason about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Slot {
    Population,
    Intervention,
    Comparator,
    Outcome,
}

impl Slot {
    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Population => "population",
            Slot::Intervention => "intervention",
            Slot::Comparator => "comparator",
            Slot::Outcome => "outcome",
        }
    }
}

/// The fixed element list for a framework, as `(local_name, canonical_slot)`.
/// Frameworks that don't model a slot simply omit it — e.g. PICO has no
/// separate "context" slot, SPIDER has no "comparator".
pub fn elements_of(framework: Framework) -> &'static [(&'static str, Option<Slot>)] {
    match framework {
        Framework::Pico => &[
            ("population", Some(Slot::Population)),
            ("intervention", Some(Slot::Intervention)),
            ("comparison", Some(Slot::Comparator)),
            ("outcome", Some(Slot::Outcome)),
        ],
        Framework::Picot => &[
            ("population", Some(Slot::Population)),
            ("intervention", Some(Slot::Intervention)),
            ("comparison", Some(Slot::Comparator)),
            ("outcome", Some(Slot::Outcome)),
            ("timeframe", None),
        ],
        Framework::Picos => &[
            ("population", Some(Slot::Population)),
            ("intervention", Some(Slot::Intervention)),
            ("comparison", Some(Slot::Comparator)),
            ("outcome", Some(Slot::Outcome)),
            ("study_design", None),
        ],
        Framework::Peco => &[
            ("population", Some(Slot::Population)),
            ("exposure", Some(Slot::Intervention)),
            ("comparison", Some(Slot::Comparator)),
            ("outcome", Some(Slot::Outcome)),
        ],
        Framework::Picoc => &[
            ("population", Some(Slot::Population)),
            ("intervention", Some(Slot::Intervention)),
            ("comparison", Some(Slot::Comparator)),
            ("outcome", Some(Slot::Outcome)),
            ("context", None),
        ],
        Framework::Spider => &[
            ("sample", Some(Slot::Population)),
            ("phenomenon_of_interest", Some(Slot::Intervention)),
            ("design", None),
            ("evaluation", Some(Slot::Outcome)),
            ("research_type", None),
        ],
        Framework::Eclipse => &[
            ("expectation", None),
            ("client_group", Some(Slot::Population)),
            ("location", None),
            ("impact", Some(Slot::Outcome)),
            ("professionals", None),
            ("service", Some(Slot::Intervention)),
        ],
        Framework::Clip => &[
            ("client_group", Some(Slot::Population)),
            ("location", None),
            ("improvement", Some(Slot::Outcome)),
            ("professionals", None),
        ],
        Framework::Behemoth => &[
            ("behavior", Some(Slot::Intervention)),
            ("health_context", None),
            ("exclusions", None),
            ("models_or_theories", None),
            ("outcomes", Some(Slot::Outcome)),
            ("target_population", Some(Slot::Population)),
            ("health_context2", None),
        ],
        Framework::Pcc => &[
            ("population", Some(Slot::Population)),
            ("concept", Some(Slot::Intervention)),
            ("context", None),
        ],
        Framework::Custom => &[
            ("population", Some(Slot::Population)),
            ("intervention", Some(Slot::Intervention)),
            ("comparison", Some(Slot::Comparator)),
            ("outcome", Some(Slot::Outcome)),
        ],
    }
}

/// Find the local element name a framework uses for a canonical slot, if any.
pub fn local_name_for_slot(framework: Framework, slot: Slot) -> Option<&'static str> {
    elements_of(framework)
        .iter()
        .find(|(_, s)| *s == Some(slot))
        .map(|(name, _)| *name)
}
