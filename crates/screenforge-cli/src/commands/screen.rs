//! Implementation of the `screenforge screen` command.
//!
//! Reads a JSONL file of records and a JSON criteria set, screens every
//! record concurrently through the configured model ensemble (C8), and
//! writes one JSON decision per line to stdout or `--out`.

use std::fs;
use std::io::Write;

use futures::future::join_all;
use screenforge_core::config::Config;
use screenforge_core::domain::{Criteria, Record};

use crate::commands::ScreenArgs;
use crate::deps::RuntimeDeps;

pub async fn execute(config: &Config, args: &ScreenArgs) -> anyhow::Result<()> {
    let criteria: Criteria = serde_json::from_str(&fs::read_to_string(&args.criteria)?)?;

    let records: Vec<Record> = fs::read_to_string(&args.records)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;

    eprintln!("=== screenforge screen ===");
    eprintln!("{} record(s) against criteria {}", records.len(), criteria.criteria_id);

    let deps = RuntimeDeps::init(config).await?;
    let pipeline = deps.screening_pipeline.clone();

    let outcomes = join_all(records.iter().map(|record| {
        let pipeline = pipeline.clone();
        let criteria = &criteria;
        async move { pipeline.screen(record, criteria).await }
    }))
    .await;

    let mut out: Box<dyn Write> = match &args.out {
        Some(path) => Box::new(fs::File::create(path)?),
        None => Box::new(std::io::stdout()),
    };

    let mut included = 0u32;
    let mut excluded = 0u32;
    let mut human_review = 0u32;
    for (decision, _audit) in &outcomes {
        match decision.decision {
            screenforge_core::domain::Decision::Include => included += 1,
            screenforge_core::domain::Decision::Exclude => excluded += 1,
            screenforge_core::domain::Decision::HumanReview => human_review += 1,
        }
        writeln!(out, "{}", serde_json::to_string(decision)?)?;
    }

    eprintln!(
        "done: {included} include, {excluded} exclude, {human_review} human_review"
    );

    Ok(())
}
