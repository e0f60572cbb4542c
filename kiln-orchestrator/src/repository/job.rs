//! Job Repository
//!
//! Durable mapping from job name to job record, kept in memory and written
//! in full to a JSON file after every change.
//!
//! Writes go to a sibling `.tmp` file that is synced and then renamed over
//! `jobs.json`, so a crash mid-write leaves the previous mapping intact.

use indexmap::IndexMap;
use kiln_core::domain::job::{Job, JobStatus, PluginSettings};
use kiln_core::domain::timestamp::{self, Timestamp};
use kiln_core::dto::job::CreateJob;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::error::StoreError;

/// Jobs keyed by name, in creation order
pub type JobMap = IndexMap<String, Job>;

/// Why a present job file was read as an empty mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    Empty,
    Corrupted(String),
}

/// On-disk shape of one job; the name is the mapping key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredJob {
    status: JobStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::optional"
    )]
    last_build: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    plugins: Vec<PluginSettings>,
}

impl StoredJob {
    fn from_job(job: &Job) -> Self {
        Self {
            status: job.status,
            last_build: job.last_build,
            group: job.group.clone(),
            plugins: job.plugins.clone(),
        }
    }

    fn into_job(self, name: String) -> Job {
        Job {
            name,
            status: self.status,
            last_build: self.last_build,
            group: self.group,
            plugins: self.plugins,
        }
    }
}

/// Reads the persisted mapping.
///
/// A missing file is an empty mapping. A zero-length or unparsable file is
/// also an empty mapping, reported through the returned warning; the file
/// itself is left alone until the next successful save.
///
/// Any other read failure is an error, since saving over a file that could
/// not be read may destroy a valid mapping.
pub fn load(path: &Path) -> Result<(JobMap, Option<LoadWarning>), StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no job file yet, starting empty");
            return Ok((JobMap::new(), None));
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        warn!(path = %path.display(), "job file is empty, reinitializing");
        return Ok((JobMap::new(), Some(LoadWarning::Empty)));
    }

    match serde_json::from_slice::<IndexMap<String, StoredJob>>(&bytes) {
        Ok(stored) => {
            let jobs = stored
                .into_iter()
                .map(|(name, job)| (name.clone(), job.into_job(name)))
                .collect::<JobMap>();
            debug!(path = %path.display(), count = jobs.len(), "loaded jobs");
            Ok((jobs, None))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "job file is corrupted, starting fresh");
            Ok((JobMap::new(), Some(LoadWarning::Corrupted(e.to_string()))))
        }
    }
}

/// Writes the full mapping atomically.
pub fn save(path: &Path, jobs: &JobMap) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let stored: IndexMap<&str, StoredJob> = jobs
        .iter()
        .map(|(name, job)| (name.as_str(), StoredJob::from_job(job)))
        .collect();
    let json = serde_json::to_vec_pretty(&stored)?;

    let tmp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
    file.write_all(&json)
        .and_then(|()| file.sync_all())
        .map_err(|e| StoreError::io(&tmp_path, e))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

/// In-memory job mapping backed by a JSON file
///
/// Readers and mutators share a `RwLock`; saves are serialized by a separate
/// writer lock and snapshot the mapping while holding it, so concurrent
/// saves can never persist an older state over a newer one.
pub struct JobStore {
    path: PathBuf,
    jobs: RwLock<JobMap>,
    writer: Mutex<()>,
}

impl JobStore {
    /// Opens the store, loading whatever the file currently holds
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let (jobs, _) = load(&path)?;
        Ok(Self::with_jobs(path, jobs))
    }

    pub fn with_jobs(path: impl Into<PathBuf>, jobs: JobMap) -> Self {
        Self {
            path: path.into(),
            jobs: RwLock::new(jobs),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds a new Idle job and persists the mapping
    pub fn create(&self, req: CreateJob) -> Result<Job, StoreError> {
        let job = req.into_job();
        {
            let mut jobs = self.jobs.write();
            if jobs.contains_key(&job.name) {
                return Err(StoreError::DuplicateName(job.name));
            }
            jobs.insert(job.name.clone(), job.clone());
        }

        if let Err(e) = self.persist() {
            self.jobs.write().shift_remove(&job.name);
            return Err(e);
        }

        info!(job = %job.name, "job created");
        Ok(job)
    }

    pub fn get(&self, name: &str) -> Option<Job> {
        self.jobs.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.read().contains_key(name)
    }

    /// All jobs in creation order
    pub fn list(&self) -> Vec<Job> {
        self.jobs.read().values().cloned().collect()
    }

    pub fn snapshot(&self) -> JobMap {
        self.jobs.read().clone()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Mutates a job in memory only; call [`JobStore::persist`] to save.
    ///
    /// Returns the updated job, or `None` if no job has that name.
    pub fn update<F: FnOnce(&mut Job)>(&self, name: &str, f: F) -> Option<Job> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(name)?;
        f(job);
        Some(job.clone())
    }

    /// Removes a job and persists the mapping
    pub fn delete(&self, name: &str) -> Result<Job, StoreError> {
        let (index, job) = {
            let mut jobs = self.jobs.write();
            let (index, _, job) = jobs
                .shift_remove_full(name)
                .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
            (index, job)
        };

        if let Err(e) = self.persist() {
            let mut jobs = self.jobs.write();
            let index = index.min(jobs.len());
            jobs.shift_insert(index, job.name.clone(), job);
            return Err(e);
        }

        info!(job = %name, "job deleted");
        Ok(job)
    }

    /// Saves the entire current mapping
    pub fn persist(&self) -> Result<(), StoreError> {
        let _writer = self.writer.lock();
        let snapshot = self.jobs.read().clone();
        save(&self.path, &snapshot)
    }

    /// Marks jobs left `Running` by a previous process as `Failed`.
    ///
    /// Returns the names that were changed.
    pub fn reconcile_interrupted(&self) -> Result<Vec<String>, StoreError> {
        let interrupted: Vec<String> = {
            let mut jobs = self.jobs.write();
            jobs.values_mut()
                .filter(|job| job.is_running())
                .map(|job| {
                    job.status = JobStatus::Failed;
                    job.name.clone()
                })
                .collect()
        };

        if !interrupted.is_empty() {
            for name in &interrupted {
                warn!(job = %name, "build was interrupted, marking as failed");
            }
            self.persist()?;
        }

        Ok(interrupted)
    }
}
