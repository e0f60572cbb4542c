//! Orchestrator startup
//!
//! Takes the data directory lock, loads and repairs the job store, seeds job
//! definitions and wires the build runner.

use anyhow::Context;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::AppState;
use crate::config::Config;
use crate::plugin::PluginRegistry;
use crate::repository::{BuildLog, JobStore};
use crate::seed;
use crate::service::console::ConsoleStore;
use crate::service::executor::SimulatedExecutor;
use crate::service::runner::BuildRunner;

/// A started orchestrator; the data directory stays locked while it lives.
pub struct Instance {
    pub state: AppState,
    _lock: File,
}

pub fn start(config: &Config) -> anyhow::Result<Instance> {
    config.validate().context("invalid configuration")?;

    fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "failed to create data directory {}",
            config.data_dir.display()
        )
    })?;

    let lock = acquire_lock(config)?;

    let jobs_path = config.jobs_path();
    let jobs = Arc::new(
        JobStore::open(&jobs_path)
            .with_context(|| format!("failed to load jobs from {}", jobs_path.display()))?,
    );
    match jobs.reconcile_interrupted() {
        Ok(names) if !names.is_empty() => {
            info!(count = names.len(), "reconciled interrupted builds")
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "failed to persist reconciled jobs"),
    }

    if let Some(path) = &config.jobs_config {
        let definitions = seed::load(path)?;
        seed::apply(&jobs, definitions)
            .with_context(|| format!("failed to seed jobs from {}", path.display()))?;
    }

    fs::create_dir_all(&config.file_move_root).with_context(|| {
        format!(
            "failed to create file-move root {}",
            config.file_move_root.display()
        )
    })?;
    let plugins = PluginRegistry::from_names(config.plugins.as_slice(), &config.builtin_options())?;
    info!(plugins = ?plugins.ids(), "registered post-build plugins");

    let executor = SimulatedExecutor::new(config.build_duration, config.failure_marker.clone());
    let runner = BuildRunner::new(
        jobs,
        Arc::new(BuildLog::new(config.build_log_path())),
        Arc::new(plugins),
        Arc::new(executor),
        Arc::new(ConsoleStore::new()),
        config.runner_settings(),
    );

    Ok(Instance {
        state: AppState::new(runner, config.build_context()),
        _lock: lock,
    })
}

fn acquire_lock(config: &Config) -> anyhow::Result<File> {
    let path = config.lock_path();
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("failed to open lock file {}", path.display()))?;

    file.try_lock_exclusive().with_context(|| {
        format!(
            "another orchestrator is using {} (lock held on {})",
            config.data_dir.display(),
            path.display()
        )
    })?;

    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}
