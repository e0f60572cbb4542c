//! Build Log Repository
//!
//! Append-only CSV history of finished builds, one row per build:
//!
//! ```text
//! Job,Status,Timestamp
//! Deploy-1,Success,2026-10-19 09:30:00
//! ```

use kiln_core::domain::build::{BuildOutcome, BuildRecord};
use kiln_core::domain::timestamp::{self, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::error::StoreError;

pub const HEADER: [&str; 3] = ["Job", "Status", "Timestamp"];

/// One CSV row, in column order
#[derive(Debug, Serialize, Deserialize)]
struct BuildRow {
    #[serde(rename = "Job")]
    job: String,
    #[serde(rename = "Status")]
    status: BuildOutcome,
    #[serde(rename = "Timestamp", with = "timestamp::required")]
    timestamp: Timestamp,
}

impl From<&BuildRecord> for BuildRow {
    fn from(record: &BuildRecord) -> Self {
        Self {
            job: record.job_name.clone(),
            status: record.status,
            timestamp: record.timestamp,
        }
    }
}

impl From<BuildRow> for BuildRecord {
    fn from(row: BuildRow) -> Self {
        BuildRecord::new(row.job, row.status, row.timestamp)
    }
}

/// Append-only build history file
pub struct BuildLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl BuildLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record, writing the header first if the file is new.
    ///
    /// A partial last row left by an earlier crash is cut off before the new
    /// row is written, so a torn quoted field cannot swallow later rows.
    pub fn append(&self, record: &BuildRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let path = self.path.as_path();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;

        let len = file.metadata().map_err(|e| StoreError::io(path, e))?.len();
        let complete = complete_len(&mut file, len).map_err(|e| StoreError::io(path, e))?;
        if complete < len {
            warn!(path = %path.display(), discarded = len - complete, "discarding partial trailing build log row");
            file.set_len(complete).map_err(|e| StoreError::io(path, e))?;
        }
        file.seek(SeekFrom::Start(complete))
            .map_err(|e| StoreError::io(path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if complete == 0 {
            writer
                .write_record(HEADER)
                .map_err(|e| StoreError::csv(path, e))?;
        }
        writer
            .serialize(BuildRow::from(record))
            .map_err(|e| StoreError::csv(path, e))?;
        writer.flush().map_err(|e| StoreError::io(path, e))?;

        Ok(())
    }

    /// Lazily reads every well-formed record in file order.
    ///
    /// The file is opened on the first `next`; each call starts a fresh pass.
    /// A missing file reads as empty. Rows that cannot be parsed are skipped
    /// with a warning.
    pub fn read_all(&self) -> BuildRecords {
        BuildRecords {
            path: self.path.clone(),
            state: ReadState::Unopened,
            line: 0,
        }
    }

    /// Records of one job, in file order
    pub fn read_for(&self, job_name: &str) -> Result<Vec<BuildRecord>, StoreError> {
        self.read_all()
            .filter(|r| r.as_ref().map_or(true, |r| r.job_name == job_name))
            .collect()
    }
}

enum ReadState {
    Unopened,
    Reading(csv::StringRecordsIntoIter<File>),
    Done,
}

/// Iterator over the records of a [`BuildLog`]
///
/// Yields an error at most once, for a failure to open or read the file,
/// and then ends.
pub struct BuildRecords {
    path: PathBuf,
    state: ReadState,
    line: u64,
}

impl BuildRecords {
    pub fn into_vec(self) -> Result<Vec<BuildRecord>, StoreError> {
        self.collect()
    }

    fn fail(&mut self, error: StoreError) -> Option<Result<BuildRecord, StoreError>> {
        self.state = ReadState::Done;
        Some(Err(error))
    }
}

impl Iterator for BuildRecords {
    type Item = Result<BuildRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next = match self.state {
                ReadState::Done => return None,
                ReadState::Unopened => {
                    match File::open(&self.path) {
                        Ok(file) => {
                            let reader = csv::ReaderBuilder::new()
                                .has_headers(false)
                                .flexible(true)
                                .from_reader(file);
                            self.state = ReadState::Reading(reader.into_records());
                        }
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {
                            debug!(path = %self.path.display(), "no build log yet");
                            self.state = ReadState::Done;
                        }
                        Err(e) => return self.fail(StoreError::io(&self.path, e)),
                    }
                    continue;
                }
                ReadState::Reading(ref mut rows) => rows.next(),
            };
            self.line += 1;

            let row = match next {
                None => {
                    self.state = ReadState::Done;
                    return None;
                }
                Some(Ok(row)) => row,
                Some(Err(e)) if e.is_io_error() => {
                    let error = StoreError::csv(&self.path, e);
                    return self.fail(error);
                }
                Some(Err(e)) => {
                    warn!(path = %self.path.display(), line = self.line, error = %e, "skipping unreadable build log row");
                    continue;
                }
            };

            if is_header(&row) {
                continue;
            }

            match row.deserialize::<BuildRow>(None) {
                Ok(parsed) => return Some(Ok(parsed.into())),
                Err(e) => {
                    warn!(path = %self.path.display(), line = self.line, error = %e, "skipping malformed build log row");
                }
            }
        }
    }
}

/// Length of the file up to and including its last newline
fn complete_len(file: &mut File, len: u64) -> io::Result<u64> {
    let mut buf = [0u8; 4096];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(buf.len() as u64);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(i) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(start + i as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

fn is_header(row: &csv::StringRecord) -> bool {
    row.len() == HEADER.len() && row.iter().zip(HEADER).all(|(a, b)| a.trim() == b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn ts(s: &str) -> Timestamp {
        timestamp::parse(s).unwrap()
    }

    fn log_in(dir: &TempDir) -> BuildLog {
        BuildLog::new(dir.path().join("build_log.csv"))
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(log_in(&dir).read_all().into_vec().unwrap().is_empty());
    }

    #[test]
    fn test_first_append_writes_header() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        log.append(&BuildRecord::new(
            "Deploy-1",
            BuildOutcome::Success,
            ts("2026-10-19 09:30:00"),
        ))
        .unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            text,
            "Job,Status,Timestamp\nDeploy-1,Success,2026-10-19 09:30:00\n"
        );
    }

    #[test]
    fn test_appends_preserve_order_and_prior_rows() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        let records = vec![
            BuildRecord::new("Deploy-1", BuildOutcome::Success, ts("2026-10-19 09:30:00")),
            BuildRecord::new("Test-Suite", BuildOutcome::Failed, ts("2026-10-19 09:31:00")),
            BuildRecord::new("Deploy-1", BuildOutcome::Cancelled, ts("2026-10-19 09:32:00")),
        ];

        for (i, record) in records.iter().enumerate() {
            log.append(record).unwrap();
            assert_eq!(log.read_all().into_vec().unwrap(), records[..=i]);
        }

        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.matches("Job,Status,Timestamp").count(), 1);
    }

    #[test]
    fn test_names_with_commas_are_quoted() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        let record = BuildRecord::new("Convert a, b", BuildOutcome::Success, ts("2026-10-19 09:30:00"));
        log.append(&record).unwrap();

        assert_eq!(log.read_all().into_vec().unwrap(), [record]);
    }

    #[test]
    fn test_malformed_trailing_row_is_skipped() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        fs::write(
            log.path(),
            "Job,Status,Timestamp\nDeploy-1,Success,2026-10-19 09:30:00\nTest-Suite,Fai",
        )
        .unwrap();

        let records = log.read_all().into_vec().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].job_name, "Deploy-1");

        // The next append starts on a fresh line
        log.append(&BuildRecord::new(
            "Test-Suite",
            BuildOutcome::Failed,
            ts("2026-10-19 09:31:00"),
        ))
        .unwrap();
        let names: Vec<String> = log
            .read_all()
            .map(|r| r.unwrap().job_name)
            .collect();
        assert_eq!(names, ["Deploy-1", "Test-Suite"]);
    }

    fn names(log: &BuildLog) -> Vec<String> {
        log.read_all().map(|r| r.unwrap().job_name).collect()
    }

    #[test]
    fn test_torn_quoted_row_does_not_hide_later_appends() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        fs::write(
            log.path(),
            "Job,Status,Timestamp\nDeploy-1,Success,2026-10-19 09:30:00\n\"Convert a, b",
        )
        .unwrap();

        for i in 0..3 {
            log.append(&BuildRecord::new(
                format!("after-{i}"),
                BuildOutcome::Success,
                ts("2026-10-19 09:31:00"),
            ))
            .unwrap();
        }

        assert_eq!(names(&log), ["Deploy-1", "after-0", "after-1", "after-2"]);
    }

    #[test]
    fn test_torn_header_is_rewritten() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        fs::write(log.path(), "Job,Sta").unwrap();

        log.append(&BuildRecord::new(
            "Deploy-1",
            BuildOutcome::Success,
            ts("2026-10-19 09:30:00"),
        ))
        .unwrap();

        assert_eq!(
            fs::read_to_string(log.path()).unwrap(),
            "Job,Status,Timestamp\nDeploy-1,Success,2026-10-19 09:30:00\n"
        );
    }

    #[test]
    fn test_read_all_is_lazy_and_restartable() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        let first = BuildRecord::new("Deploy-1", BuildOutcome::Success, ts("2026-10-19 09:30:00"));
        log.append(&first).unwrap();

        // Nothing is read until the iterator is polled
        let pending = log.read_all();
        let second = BuildRecord::new("Test-Suite", BuildOutcome::Failed, ts("2026-10-19 09:31:00"));
        log.append(&second).unwrap();
        assert_eq!(pending.into_vec().unwrap(), [first.clone(), second.clone()]);

        let mut records = log.read_all();
        assert_eq!(records.next().unwrap().unwrap(), first);
        assert_eq!(log.read_all().count(), 2);
        assert_eq!(records.next().unwrap().unwrap(), second);
        assert!(records.next().is_none());
    }

    #[test]
    fn test_unreadable_file_yields_one_error() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        fs::create_dir(log.path()).unwrap();

        let mut records = log.read_all();
        assert!(matches!(records.next(), Some(Err(_))));
        assert!(records.next().is_none());
        assert!(log.read_for("Deploy-1").is_err());
    }

    #[test]
    fn test_rows_with_bad_fields_are_skipped() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        fs::write(
            log.path(),
            "Job,Status,Timestamp\n\
             Deploy-1,Exploded,2026-10-19 09:30:00\n\
             Deploy-1,Success,yesterday\n\
             Deploy-1\n\
             Deploy-1,Success,2026-10-19 09:30:00\n",
        )
        .unwrap();

        let records = log.read_all().into_vec().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, BuildOutcome::Success);
    }

    #[test]
    fn test_read_for_filters_by_job() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        for (name, outcome) in [
            ("Deploy-1", BuildOutcome::Success),
            ("Test-Suite", BuildOutcome::Failed),
            ("Deploy-1", BuildOutcome::Failed),
        ] {
            log.append(&BuildRecord::new(name, outcome, ts("2026-10-19 09:30:00")))
                .unwrap();
        }

        let deploys = log.read_for("Deploy-1").unwrap();
        assert_eq!(deploys.len(), 2);
        assert!(deploys.iter().all(|r| r.job_name == "Deploy-1"));
        assert!(log.read_for("Missing").unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_appends_are_not_interleaved() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(log_in(&dir));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        log.append(&BuildRecord::new(
                            format!("job-{i}"),
                            BuildOutcome::Success,
                            ts("2026-10-19 09:30:00"),
                        ))
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.read_all().into_vec().unwrap().len(), 100);
    }
}
