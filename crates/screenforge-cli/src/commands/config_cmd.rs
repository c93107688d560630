//! Implementation of the `screenforge config` command.
//!
//! Validates the loaded configuration and, unless `--check` is given,
//! prints a summary of the providers, models, and thresholds in effect.

use screenforge_core::config::Config;

use crate::commands::ConfigArgs;

pub async fn execute(config: &Config, args: &ConfigArgs) -> anyhow::Result<()> {
    match config.validate() {
        Ok(()) => eprintln!("configuration is valid"),
        Err(errors) => {
            eprintln!("configuration is invalid:");
            for err in &errors {
                eprintln!("  - {err}");
            }
            anyhow::bail!("{} configuration error(s)", errors.len());
        }
    }

    if args.check {
        return Ok(());
    }

    eprintln!();
    eprintln!("=== providers ===");
    for (name, provider) in &config.providers {
        eprintln!("{name} ({})", provider.default_base_url);
        for model in &provider.models {
            eprintln!("  {} ({:?})", model.id, model.kind);
        }
    }

    eprintln!();
    eprintln!("=== ensemble thresholds ===");
    eprintln!(
        "tau_high={} tau_mid={} tau_low={}",
        config.ensemble.tau_high, config.ensemble.tau_mid, config.ensemble.tau_low
    );
    eprintln!("recall_mode: {}", config.recall_mode);

    Ok(())
}
