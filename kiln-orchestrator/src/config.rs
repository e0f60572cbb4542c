//! Orchestrator configuration
//!
//! Storage location, listen address, build simulation and post-build plugin
//! selection, all read from `KILN_*` environment variables.

use anyhow::Context;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::context::BuildContext;
use crate::plugin::builtin::{self, BuiltinOptions};
use crate::service::runner::RunnerSettings;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the job mapping, the build log and the lock file
    pub data_dir: PathBuf,

    /// HTTP listen address
    pub bind_addr: String,

    /// How long a simulated build takes
    pub build_duration: Duration,

    /// Maximum time a build can run before it fails
    pub build_timeout: Duration,

    /// Builds allowed to run at once across all jobs
    pub max_parallel_builds: usize,

    /// Simulated builds fail when the job name contains this; `None` disables
    pub failure_marker: Option<String>,

    /// Whether builds notify by email unless the request says otherwise
    pub notify: bool,

    /// Built-in plugins to register, in order
    pub plugins: Vec<String>,

    /// Optional TOML file of job definitions to seed at startup
    pub jobs_config: Option<PathBuf>,

    /// Directory the file-move plugin is confined to
    pub file_move_root: PathBuf,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - KILN_DATA_DIR (default: data)
    /// - KILN_BIND_ADDR (default: 0.0.0.0:8080)
    /// - KILN_BUILD_DURATION (seconds, default: 3)
    /// - KILN_BUILD_TIMEOUT (seconds, default: 300)
    /// - KILN_MAX_PARALLEL_BUILDS (default: 4)
    /// - KILN_FAILURE_MARKER (default: Test, empty disables)
    /// - KILN_NOTIFY (default: true)
    /// - KILN_PLUGINS (comma separated, default: all built-ins)
    /// - KILN_JOBS_CONFIG (path to a TOML job definitions file)
    /// - KILN_FILE_MOVE_ROOT (default: <data_dir>/files)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`], reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let data_dir = var("KILN_DATA_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let bind_addr = var("KILN_BIND_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.bind_addr);

        let build_duration = parse_var::<u64>(&var, "KILN_BUILD_DURATION")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.build_duration);

        let build_timeout = parse_var::<u64>(&var, "KILN_BUILD_TIMEOUT")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.build_timeout);

        let max_parallel_builds = parse_var::<usize>(&var, "KILN_MAX_PARALLEL_BUILDS")?
            .unwrap_or(defaults.max_parallel_builds);

        let failure_marker = match var("KILN_FAILURE_MARKER") {
            Some(marker) if marker.is_empty() => None,
            Some(marker) => Some(marker),
            None => defaults.failure_marker,
        };

        let notify = match var("KILN_NOTIFY") {
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("KILN_NOTIFY has invalid value '{}'", raw))?,
            None => defaults.notify,
        };

        let plugins = var("KILN_PLUGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or(defaults.plugins);

        let jobs_config = var("KILN_JOBS_CONFIG")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let file_move_root = var("KILN_FILE_MOVE_ROOT")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("files"));

        Ok(Self {
            data_dir,
            bind_addr,
            build_duration,
            build_timeout,
            max_parallel_builds,
            failure_marker,
            notify,
            plugins,
            jobs_config,
            file_move_root,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            anyhow::bail!("data_dir cannot be empty");
        }

        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.build_timeout.is_zero() {
            anyhow::bail!("build_timeout must be greater than 0");
        }

        if self.max_parallel_builds == 0 {
            anyhow::bail!("max_parallel_builds must be greater than 0");
        }

        if self.file_move_root.as_os_str().is_empty() {
            anyhow::bail!("file_move_root cannot be empty");
        }

        for name in &self.plugins {
            if !builtin::is_builtin(name) {
                anyhow::bail!(builtin::UnknownPlugin(name.clone()));
            }
        }

        Ok(())
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.data_dir.join("jobs.json")
    }

    pub fn build_log_path(&self) -> PathBuf {
        self.data_dir.join("build_logs.csv")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("kiln.lock")
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            timeout: self.build_timeout,
            max_parallel_builds: self.max_parallel_builds,
        }
    }

    pub fn build_context(&self) -> BuildContext {
        BuildContext::new(self.notify)
    }

    pub fn builtin_options(&self) -> BuiltinOptions {
        BuiltinOptions::new(self.file_move_root.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            bind_addr: "0.0.0.0:8080".to_string(),
            build_duration: Duration::from_secs(3),
            build_timeout: Duration::from_secs(300), // 5 minutes
            max_parallel_builds: 4,
            failure_marker: Some("Test".to_string()),
            notify: true,
            plugins: builtin::ALL.iter().map(|s| s.to_string()).collect(),
            jobs_config: None,
            file_move_root: PathBuf::from("data/files"),
        }
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{} has invalid value '{}'", key, raw)),
        None => Ok(None),
    }
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("expected true or false"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.build_duration, Duration::from_secs(3));
        assert_eq!(config.max_parallel_builds, 4);
        assert_eq!(config.plugins, ["tts", "file-move", "media-convert", "email-notify"]);
        assert_eq!(config.jobs_path(), PathBuf::from("data/jobs.json"));
        assert_eq!(config.build_log_path(), PathBuf::from("data/build_logs.csv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.failure_marker.as_deref(), Some("Test"));
        assert!(config.notify);
        assert!(config.jobs_config.is_none());
        assert_eq!(config.file_move_root, PathBuf::from("data/files"));
    }

    #[test]
    fn test_reads_overrides() {
        let config = config_from(&[
            ("KILN_DATA_DIR", "/var/lib/kiln"),
            ("KILN_BUILD_DURATION", "0"),
            ("KILN_MAX_PARALLEL_BUILDS", "8"),
            ("KILN_FAILURE_MARKER", ""),
            ("KILN_NOTIFY", "off"),
            ("KILN_PLUGINS", "email-notify, tts"),
            ("KILN_JOBS_CONFIG", "jobs.toml"),
        ])
        .unwrap();

        assert_eq!(config.lock_path(), PathBuf::from("/var/lib/kiln/kiln.lock"));
        assert_eq!(
            config.builtin_options().file_move_root,
            PathBuf::from("/var/lib/kiln/files")
        );
        assert_eq!(config.build_duration, Duration::ZERO);
        assert_eq!(config.runner_settings().max_parallel_builds, 8);
        assert_eq!(config.failure_marker, None);
        assert!(!config.build_context().notify);
        assert_eq!(config.plugins, ["email-notify", "tts"]);
        assert_eq!(config.jobs_config, Some(PathBuf::from("jobs.toml")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_move_root_override() {
        let config = config_from(&[("KILN_FILE_MOVE_ROOT", "/srv/drop")]).unwrap();
        assert_eq!(config.file_move_root, PathBuf::from("/srv/drop"));
    }

    #[test]
    fn test_unparsable_values_are_errors() {
        for (key, value) in [
            ("KILN_BUILD_TIMEOUT", "soon"),
            ("KILN_MAX_PARALLEL_BUILDS", "-1"),
            ("KILN_NOTIFY", "maybe"),
        ] {
            let err = config_from(&[(key, value)]).unwrap_err();
            assert!(err.to_string().contains(key), "{err:#}");
        }
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.build_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.build_timeout = Duration::from_secs(1);

        config.max_parallel_builds = 0;
        assert!(config.validate().is_err());
        config.max_parallel_builds = 1;

        config.plugins.push("fax".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fax"));
    }
}
