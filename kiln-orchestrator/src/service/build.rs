//! Build Service
//!
//! Queries over the build history.

use kiln_core::domain::build::BuildRecord;
use kiln_core::dto::build::HistoryQuery;

use crate::repository::{BuildLog, StoreError};

/// List build records in completion order, optionally for one job
pub fn list_history(
    history: &BuildLog,
    query: &HistoryQuery,
) -> Result<Vec<BuildRecord>, StoreError> {
    match query.job.as_deref().map(str::trim).filter(|j| !j.is_empty()) {
        Some(job) => history.read_for(job),
        None => history.read_all().into_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::domain::build::BuildOutcome;
    use kiln_core::domain::timestamp;
    use tempfile::TempDir;

    #[test]
    fn test_history_filters_by_job() {
        let dir = TempDir::new().unwrap();
        let log = BuildLog::new(dir.path().join("build_logs.csv"));
        let ts = timestamp::parse("2026-10-19 09:30:00").unwrap();
        log.append(&BuildRecord::new("Deploy-1", BuildOutcome::Success, ts)).unwrap();
        log.append(&BuildRecord::new("Test-Suite", BuildOutcome::Failed, ts)).unwrap();

        let all = list_history(&log, &HistoryQuery::default()).unwrap();
        assert_eq!(all.len(), 2);

        let blank = HistoryQuery { job: Some(" ".into()) };
        assert_eq!(list_history(&log, &blank).unwrap().len(), 2);

        let one = HistoryQuery {
            job: Some("Test-Suite".into()),
        };
        let records = list_history(&log, &one).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, BuildOutcome::Failed);
    }
}
