//! Build console
//!
//! Lines written while a build runs, kept per job for the latest run.

use kiln_core::domain::log::{LogEntry, LogLevel};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared buffer of console lines for one build
#[derive(Debug, Clone, Default)]
pub struct ConsoleLog {
    buffer: Arc<Mutex<Vec<LogEntry>>>,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&self, entry: LogEntry) {
        self.buffer.lock().push(entry);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.add_entry(LogEntry::new(LogLevel::Debug, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.add_entry(LogEntry::new(LogLevel::Info, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.add_entry(LogEntry::new(LogLevel::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.add_entry(LogEntry::new(LogLevel::Error, message));
    }

    /// Snapshot of the lines written so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.buffer.lock().clone()
    }

    /// Takes all lines, leaving the buffer empty
    pub fn drain(&self) -> Vec<LogEntry> {
        self.buffer.lock().drain(..).collect()
    }
}

/// Console of each job's most recent build
///
/// A build's console is attached when the build starts, so it can be read
/// while the build is still running.
#[derive(Debug, Default)]
pub struct ConsoleStore {
    consoles: RwLock<HashMap<String, ConsoleLog>>,
}

impl ConsoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the console kept for `job_name`
    pub fn attach(&self, job_name: &str, console: ConsoleLog) {
        self.consoles.write().insert(job_name.to_string(), console);
    }

    /// Lines of the latest build, or `None` if the job never ran
    pub fn get(&self, job_name: &str) -> Option<Vec<LogEntry>> {
        self.consoles.read().get(job_name).map(ConsoleLog::entries)
    }

    pub fn remove(&self, job_name: &str) {
        self.consoles.write().remove(job_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_collects_levels_in_order() {
        let console = ConsoleLog::new();
        console.info("Starting build: Deploy-1");
        console.warning("slow step");
        console.error("step failed");

        let levels: Vec<LogLevel> = console.entries().iter().map(|e| e.level).collect();
        assert_eq!(levels, [LogLevel::Info, LogLevel::Warning, LogLevel::Error]);

        assert_eq!(console.drain().len(), 3);
        assert!(console.entries().is_empty());
    }

    #[test]
    fn test_store_sees_lines_written_after_attach() {
        let store = ConsoleStore::new();
        let console = ConsoleLog::new();
        store.attach("Deploy-1", console.clone());

        console.info("Starting build: Deploy-1");
        assert_eq!(store.get("Deploy-1").unwrap().len(), 1);

        store.attach("Deploy-1", ConsoleLog::new());
        assert!(store.get("Deploy-1").unwrap().is_empty());

        store.remove("Deploy-1");
        assert!(store.get("Deploy-1").is_none());
    }
}
