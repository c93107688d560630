/// Core library for the literature screening and quality-assessment
/// orchestration engine.
///
/// Contains the LLM dispatch stack (C1-C5), the rule engine and ensemble
/// aggregator (C6-C7), the screening and QA pipelines (C8-C9), the batch
/// coordinator (C10), and the durable job store and ID generator (C11-C12).
pub mod batch;
pub mod config;
pub mod domain;
pub mod ensemble;
pub mod error;
pub mod llm;
pub mod qa;
pub mod rules;
pub mod safety;
pub mod screening;
pub mod startup;
pub mod storage;

pub use error::*;

/// Returns the version of the screenforge-core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
