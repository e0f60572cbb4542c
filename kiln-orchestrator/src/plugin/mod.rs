//! Post-build plugins
//!
//! A plugin is a named `(predicate, effect)` pair. The registry keeps plugins
//! in registration order and, after a successful build, runs the effect of
//! every plugin whose predicate accepts the job.
//!
//! Plugins are isolated from each other: an effect that returns an error or
//! panics is recorded as a [`PluginFailure`] and the next plugin still runs.

pub mod builtin;

use kiln_core::domain::job::Job;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error};

use crate::context::BuildContext;
use crate::service::console::ConsoleLog;

/// What a plugin gets to look at
#[derive(Debug, Clone, Copy)]
pub struct PluginTarget<'a> {
    pub job_name: &'a str,
    pub job: &'a Job,
    pub context: &'a BuildContext,
}

impl<'a> PluginTarget<'a> {
    pub fn new(job: &'a Job, context: &'a BuildContext) -> Self {
        Self {
            job_name: &job.name,
            job,
            context,
        }
    }
}

/// Errors a plugin effect may return
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{0}")]
    Failed(String),

    #[error("missing setting '{0}'")]
    MissingSetting(String),

    #[error("path '{}' is outside '{}'", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A plugin that failed during dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFailure {
    pub plugin: String,
    pub message: String,
}

impl fmt::Display for PluginFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plugin '{}' failed: {}", self.plugin, self.message)
    }
}

type Predicate = Box<dyn Fn(&PluginTarget<'_>) -> bool + Send + Sync>;
type Effect = Box<dyn Fn(&PluginTarget<'_>, &ConsoleLog) -> Result<(), PluginError> + Send + Sync>;

/// A single post-build action
pub struct PluginAction {
    id: String,
    predicate: Predicate,
    effect: Effect,
}

impl PluginAction {
    pub fn new<P, E>(id: impl Into<String>, predicate: P, effect: E) -> Self
    where
        P: Fn(&PluginTarget<'_>) -> bool + Send + Sync + 'static,
        E: Fn(&PluginTarget<'_>, &ConsoleLog) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            predicate: Box::new(predicate),
            effect: Box::new(effect),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn applies_to(&self, target: &PluginTarget<'_>) -> bool {
        (self.predicate)(target)
    }

    pub fn run(&self, target: &PluginTarget<'_>, console: &ConsoleLog) -> Result<(), PluginError> {
        (self.effect)(target, console)
    }
}

impl fmt::Debug for PluginAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginAction").field("id", &self.id).finish()
    }
}

/// Ordered collection of post-build actions
#[derive(Debug, Default)]
pub struct PluginRegistry {
    actions: Vec<PluginAction>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from built-in plugin names, keeping their order
    pub fn from_names<S: AsRef<str>>(
        names: &[S],
        options: &builtin::BuiltinOptions,
    ) -> Result<Self, builtin::UnknownPlugin> {
        builtin::registry(names, options)
    }

    /// Appends an action; it runs after every action registered before it.
    pub fn register(&mut self, action: PluginAction) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Identifiers in registration order
    pub fn ids(&self) -> Vec<&str> {
        self.actions.iter().map(PluginAction::id).collect()
    }

    /// Runs every applicable action in order and collects the failures.
    pub fn dispatch(&self, target: &PluginTarget<'_>, console: &ConsoleLog) -> Vec<PluginFailure> {
        let mut failures = Vec::new();

        for action in &self.actions {
            let applies = match panic::catch_unwind(AssertUnwindSafe(|| action.applies_to(target))) {
                Ok(applies) => applies,
                Err(payload) => {
                    failures.push(self.fail(action, target, console, panic_message(&*payload)));
                    continue;
                }
            };

            if !applies {
                debug!(job = %target.job_name, plugin = action.id(), "plugin does not apply");
                continue;
            }

            console.info(format!("Running plugin: {}", action.id()));
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| action.run(target, console)));

            match outcome {
                Ok(Ok(())) => {
                    console.info(format!("{} completed", action.id()));
                    debug!(job = %target.job_name, plugin = action.id(), "plugin completed");
                }
                Ok(Err(e)) => failures.push(self.fail(action, target, console, e.to_string())),
                Err(payload) => {
                    failures.push(self.fail(action, target, console, panic_message(&*payload)))
                }
            }
        }

        failures
    }

    fn fail(
        &self,
        action: &PluginAction,
        target: &PluginTarget<'_>,
        console: &ConsoleLog,
        message: String,
    ) -> PluginFailure {
        error!(job = %target.job_name, plugin = action.id(), error = %message, "plugin failed");
        console.error(format!("{} failed: {}", action.id(), message));
        PluginFailure {
            plugin: action.id().to_string(),
            message,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn always(id: &str, calls: Arc<AtomicUsize>) -> PluginAction {
        PluginAction::new(
            id.to_string(),
            |_| true,
            move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
    }

    #[test]
    fn test_dispatch_runs_in_registration_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new();
        for id in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            registry.register(PluginAction::new(
                id,
                |_| true,
                move |_, _| {
                    order.lock().push(id);
                    Ok(())
                },
            ));
        }

        let job = Job::new("Deploy-1");
        let context = BuildContext::default();
        let failures = registry.dispatch(&PluginTarget::new(&job, &context), &ConsoleLog::new());

        assert!(failures.is_empty());
        assert_eq!(*order.lock(), ["first", "second", "third"]);
        assert_eq!(registry.ids(), ["first", "second", "third"]);
    }

    #[test]
    fn test_predicate_gates_effect() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = PluginRegistry::new();
        registry.register(PluginAction::new(
            "convert",
            |t| t.job_name.contains("Convert"),
            move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        ));

        let context = BuildContext::default();
        for (name, expected) in [("Deploy-1", 0), ("Convert batch", 1)] {
            let job = Job::new(name);
            registry.dispatch(&PluginTarget::new(&job, &context), &ConsoleLog::new());
            assert_eq!(calls.load(Ordering::SeqCst), expected);
        }
    }

    #[test]
    fn test_failures_do_not_stop_later_plugins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::new();
        registry.register(PluginAction::new("broken", |_| true, |_, _| {
            Err(PluginError::Failed("disk full".into()))
        }));
        registry.register(PluginAction::new("explodes", |_| true, |_, _| -> Result<(), PluginError> {
            panic!("boom")
        }));
        registry.register(PluginAction::new(
            "picky",
            |_| -> bool { panic!("bad predicate") },
            |_, _| Ok(()),
        ));
        registry.register(always("survivor", Arc::clone(&calls)));

        let job = Job::new("Deploy-1");
        let context = BuildContext::default();
        let console = ConsoleLog::new();
        let failures = registry.dispatch(&PluginTarget::new(&job, &context), &console);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let failed: Vec<&str> = failures.iter().map(|f| f.plugin.as_str()).collect();
        assert_eq!(failed, ["broken", "explodes", "picky"]);
        assert_eq!(failures[0].message, "disk full");
        assert_eq!(failures[1].message, "panicked: boom");

        let lines: Vec<String> = console.entries().into_iter().map(|e| e.message).collect();
        assert!(lines.contains(&"Running plugin: survivor".to_string()));
        assert!(lines.contains(&"survivor completed".to_string()));
        assert!(lines.contains(&"broken failed: disk full".to_string()));
    }

    #[test]
    fn test_duplicate_ids_are_allowed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::new();
        registry.register(always("same", Arc::clone(&calls)));
        registry.register(always("same", Arc::clone(&calls)));

        let job = Job::new("Deploy-1");
        let context = BuildContext::default();
        registry.dispatch(&PluginTarget::new(&job, &context), &ConsoleLog::new());

        assert_eq!(registry.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
