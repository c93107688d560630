//! Engine bootstrap helpers.
//!
//! Wires a loaded [`Config`](crate::config::Config) into a running engine:
//! resolves the data directory, opens the SQLite pool and runs migrations,
//! constructs the durable job store and cross-process ID generator, and
//! formats the startup banner printed when the engine comes up.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::storage::{id_gen, init_db, IdGenerator, JobStore};

/// Errors that can occur while bringing an engine up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Configuration failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database initialization or migration failed.
    #[error("database error: {0}")]
    Database(#[from] crate::error::StorageError),

    /// File I/O error while preparing the data directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handles shared by every command: the job store, the batch/assessment ID
/// generator, and the resolved storage paths.
pub struct EngineHandles {
    pub job_store: Arc<JobStore>,
    pub id_generator: Arc<IdGenerator>,
    pub db_path: PathBuf,
    pub pdf_dir: PathBuf,
}

/// Resolve storage paths, open the database, run migrations, and construct
/// the durable stores a running engine needs.
pub async fn bootstrap(config: &Config) -> Result<EngineHandles, StartupError> {
    let pdf_dir = expand_tilde(&config.storage.pdf_dir);
    std::fs::create_dir_all(&pdf_dir)?;

    // init_db expands `~` itself and creates the database's parent directory.
    let pool = init_db(&config.storage.db_path).await?;
    let db_path = expand_tilde(&config.storage.db_path);

    let data_dir = db_path.parent().unwrap_or_else(|| Path::new("."));
    let lock_path = id_gen::default_lock_path(data_dir);

    Ok(EngineHandles {
        job_store: Arc::new(JobStore::new(pool)),
        id_generator: Arc::new(IdGenerator::new(lock_path)),
        db_path,
        pdf_dir,
    })
}

// ============================================================================
// Startup Banner
// ============================================================================

/// Format the startup banner printed when the engine starts.
pub fn format_startup_banner(provider_count: usize, recall_mode: bool) -> String {
    format!(
        "screenforge v{version}\n\
         Providers configured: {provider_count} | Recall mode: {recall_mode}\n\
         Press Ctrl+C to stop.",
        version = env!("CARGO_PKG_VERSION"),
    )
}

// ============================================================================
// Path Helpers
// ============================================================================

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Default directory for screenforge data files (`~/.screenforge/`).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".screenforge")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_banner_contains_version_and_hint() {
        let banner = format_startup_banner(3, false);
        assert!(banner.contains("screenforge v"));
        assert!(banner.contains("Providers configured: 3"));
        assert!(banner.contains("Recall mode: false"));
        assert!(banner.contains("Ctrl+C"));
    }

    #[test]
    fn startup_banner_reports_recall_mode() {
        let banner = format_startup_banner(1, true);
        assert!(banner.contains("Recall mode: true"));
    }

    #[test]
    fn expand_tilde_works() {
        let expanded = expand_tilde("~/.screenforge/config.toml");
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn expand_tilde_no_tilde() {
        let expanded = expand_tilde("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn data_dir_under_home() {
        let dir = data_dir();
        assert!(dir.to_string_lossy().contains(".screenforge"));
    }
}
