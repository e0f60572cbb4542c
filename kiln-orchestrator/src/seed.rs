//! Job definitions file
//!
//! A TOML file listing jobs to create at startup:
//!
//! ```toml
//! [[jobs]]
//! name = "Convert batch 1"
//! group = "media"
//!
//! [[jobs.plugins]]
//! name = "media-convert"
//! config = { folder = "/srv/media" }
//! ```
//!
//! Jobs that already exist are left untouched.

use anyhow::Context;
use kiln_core::domain::job::PluginSettings;
use kiln_core::dto::job::CreateJob;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::repository::JobStore;
use crate::service::job::{self as job_service, JobError};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobDefinitions {
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobDefinition {
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub plugins: Vec<PluginSettings>,
}

impl From<JobDefinition> for CreateJob {
    fn from(def: JobDefinition) -> Self {
        CreateJob {
            name: def.name,
            group: def.group,
            plugins: def.plugins,
        }
    }
}

pub fn parse(content: &str) -> anyhow::Result<JobDefinitions> {
    toml::from_str(content).context("invalid job definitions")
}

pub fn load(path: &Path) -> anyhow::Result<JobDefinitions> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read job definitions from {}", path.display()))?;
    parse(&content).with_context(|| format!("in {}", path.display()))
}

/// Creates every defined job that does not exist yet
///
/// Returns the names of the jobs created.
pub fn apply(jobs: &JobStore, definitions: JobDefinitions) -> Result<Vec<String>, JobError> {
    let mut created = Vec::new();

    for definition in definitions.jobs {
        let name = definition.name.trim().to_string();
        if jobs.contains(&name) {
            debug!(job = %name, "job already defined, skipping");
            continue;
        }

        let job = job_service::create_job(jobs, definition.into())?;
        created.push(job.name);
    }

    if !created.is_empty() {
        info!(count = created.len(), "seeded jobs from definitions");
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::domain::job::JobStatus;
    use tempfile::TempDir;

    const DEFINITIONS: &str = r#"
        [[jobs]]
        name = "Convert batch 1"
        group = "media"

        [[jobs.plugins]]
        name = "media-convert"
        config = { folder = "/srv/media" }

        [[jobs]]
        name = "Deploy-1"
    "#;

    #[test]
    fn test_parse_definitions() {
        let defs = parse(DEFINITIONS).unwrap();
        assert_eq!(defs.jobs.len(), 2);

        let convert = &defs.jobs[0];
        assert_eq!(convert.group.as_deref(), Some("media"));
        assert_eq!(convert.plugins[0].name, "media-convert");
        assert_eq!(convert.plugins[0].get("folder"), Some("/srv/media"));
        assert!(defs.jobs[1].plugins.is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        assert!(parse("[[jobs]]\nname = \"a\"\nstatus = \"Running\"\n").is_err());
        assert!(parse("[[jobs]]\ngroup = \"no name\"\n").is_err());
    }

    #[test]
    fn test_apply_creates_missing_and_skips_existing() {
        let dir = TempDir::new().unwrap();
        let jobs = JobStore::open(dir.path().join("jobs.json")).unwrap();
        jobs.create(CreateJob::named("Deploy-1")).unwrap();
        jobs.update("Deploy-1", |job| job.status = JobStatus::Success);

        let created = apply(&jobs, parse(DEFINITIONS).unwrap()).unwrap();
        assert_eq!(created, ["Convert batch 1"]);
        assert_eq!(jobs.get("Deploy-1").unwrap().status, JobStatus::Success);
        assert_eq!(jobs.get("Convert batch 1").unwrap().group.as_deref(), Some("media"));

        assert!(apply(&jobs, parse(DEFINITIONS).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs.toml");
        std::fs::write(&path, "jobs = 3").unwrap();

        let err = load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("jobs.toml"));
        assert!(load(&dir.path().join("absent.toml")).is_err());
    }
}
