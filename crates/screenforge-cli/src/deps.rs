//! Shared runtime dependencies for `screenforge screen` and `screenforge assess`.
//!
//! Encapsulates database/storage bootstrap, LLM registry construction, and
//! pipeline assembly into one reusable struct, mirroring the teacher's own
//! `RuntimeDeps`.

use std::sync::Arc;

use screenforge_core::config::Config;
use screenforge_core::ensemble::Thresholds;
use screenforge_core::llm::dispatcher::Dispatcher;
use screenforge_core::llm::factory;
use screenforge_core::qa::CriterionFanout;
use screenforge_core::screening::ScreeningPipeline;
use screenforge_core::startup::{self, EngineHandles};

/// All shared dependencies needed by the `screen` and `assess` commands.
pub struct RuntimeDeps {
    pub handles: EngineHandles,
    pub dispatcher: Arc<Dispatcher>,
    pub screening_pipeline: Arc<ScreeningPipeline>,
    pub qa_fanout: Arc<CriterionFanout>,
}

impl RuntimeDeps {
    /// Initialize all shared dependencies from config.
    ///
    /// This encapsulates storage bootstrap, LLM registry/dispatcher
    /// construction, and pipeline assembly.
    pub async fn init(config: &Config) -> anyhow::Result<Self> {
        let handles = startup::bootstrap(config)
            .await
            .map_err(|e| anyhow::anyhow!("engine bootstrap failed: {e}"))?;
        tracing::info!(db = %handles.db_path.display(), "storage initialized");

        let dispatcher = factory::build_dispatcher(config)
            .map_err(|e| anyhow::anyhow!("LLM registry build failed: {e}"))?;
        tracing::info!("LLM dispatcher initialized");

        let targets = factory::screening_targets(config);
        let thresholds = Thresholds {
            tau_high: config.ensemble.tau_high,
            tau_mid: config.ensemble.tau_mid,
            tau_low: config.ensemble.tau_low,
        };
        let screening_pipeline = Arc::new(ScreeningPipeline::new(
            dispatcher.clone(),
            targets,
            thresholds,
            std::time::Duration::from_secs(config.ensemble.per_record_deadline_sec),
        ));

        let qa_fanout = Arc::new(
            factory::build_qa_fanout(config, dispatcher.clone())
                .map_err(|e| anyhow::anyhow!("QA fan-out build failed: {e}"))?,
        );

        Ok(Self {
            handles,
            dispatcher,
            screening_pipeline,
            qa_fanout,
        })
    }
}
