//! Job command handlers
//!
//! Handles job management, builds and build consoles.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use kiln_client::KilnClient;
use kiln_core::domain::job::{Job, JobStatus, PluginSettings};
use kiln_core::domain::log::{LogEntry, LogLevel};
use kiln_core::domain::timestamp;
use kiln_core::dto::build::{BuildReport, IssueKind};
use kiln_core::dto::job::CreateJob;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Create a new job
    Create {
        /// Unique job name
        name: String,

        /// Group the job is listed under
        #[arg(long)]
        group: Option<String>,

        /// Enable a plugin, optionally with settings: NAME[:KEY=VALUE,...]
        #[arg(long = "plugin", value_name = "PLUGIN", value_parser = parse_plugin)]
        plugins: Vec<PluginSettings>,
    },
    /// List all jobs
    List,
    /// Get job details
    Get {
        /// Job name
        name: String,
    },
    /// Delete a job (its build history is kept)
    Delete {
        /// Job name
        name: String,
    },
    /// Run a build
    Run {
        /// Job name
        name: String,

        /// Skip the email notification for this build
        #[arg(long)]
        no_notify: bool,

        /// Return as soon as the build has started
        #[arg(long)]
        detach: bool,
    },
    /// Cancel the job's running build
    Cancel {
        /// Job name
        name: String,
    },
    /// Show the console of the job's latest build
    Console {
        /// Job name
        name: String,
    },
}

/// Handle job commands
///
/// Routes job subcommands to their respective handlers.
pub async fn handle_job_command(command: JobCommands, client: &KilnClient) -> Result<()> {
    match command {
        JobCommands::Create {
            name,
            group,
            plugins,
        } => create_job(client, name, group, plugins).await,
        JobCommands::List => list_jobs(client).await,
        JobCommands::Get { name } => get_job(client, &name).await,
        JobCommands::Delete { name } => delete_job(client, &name).await,
        JobCommands::Run {
            name,
            no_notify,
            detach,
        } => {
            let notify = no_notify.then_some(false);
            if detach {
                start_build(client, &name, notify).await
            } else {
                run_build(client, &name, notify).await
            }
        }
        JobCommands::Cancel { name } => cancel_build(client, &name).await,
        JobCommands::Console { name } => show_console(client, &name).await,
    }
}

/// Create a job
async fn create_job(
    client: &KilnClient,
    name: String,
    group: Option<String>,
    plugins: Vec<PluginSettings>,
) -> Result<()> {
    let job = client
        .create_job(CreateJob {
            name,
            group,
            plugins,
        })
        .await
        .context("Failed to create job")?;

    println!("{} Created job {}", "✓".green(), job.name.cyan());
    Ok(())
}

/// List all jobs
async fn list_jobs(client: &KilnClient) -> Result<()> {
    let jobs = client.list_jobs().await?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", jobs.len()).bold());
        println!();
        for job in jobs {
            print_job_summary(&job);
        }
    }

    Ok(())
}

/// Get and display a single job
async fn get_job(client: &KilnClient, name: &str) -> Result<()> {
    let job = client.get_job(name).await?;

    print_job_details(&job);

    Ok(())
}

async fn delete_job(client: &KilnClient, name: &str) -> Result<()> {
    client
        .delete_job(name)
        .await
        .with_context(|| format!("Failed to delete job {}", name))?;

    println!("{} Deleted job {}", "✓".green(), name.cyan());
    Ok(())
}

/// Run a build and wait for the outcome
///
/// Fails when the build does not succeed, so scripts can check the exit code.
async fn run_build(client: &KilnClient, name: &str, notify: Option<bool>) -> Result<()> {
    println!("{} Building {}...", "▸".cyan(), name.bold());

    let report = client
        .run_build(name, notify)
        .await
        .with_context(|| format!("Failed to run build for {}", name))?;

    print_report(&report);

    if !report.outcome.is_success() {
        anyhow::bail!("Build of {} finished as {}", name, report.outcome);
    }
    Ok(())
}

async fn start_build(client: &KilnClient, name: &str, notify: Option<bool>) -> Result<()> {
    let job = client
        .start_build(name, notify)
        .await
        .with_context(|| format!("Failed to start build for {}", name))?;

    println!(
        "{} Build of {} started ({})",
        "▸".cyan(),
        job.name.bold(),
        colorize_status(job.status)
    );
    println!(
        "  Follow with: {}",
        format!("kiln job console {}", name).dimmed()
    );
    Ok(())
}

async fn cancel_build(client: &KilnClient, name: &str) -> Result<()> {
    client
        .cancel_build(name)
        .await
        .with_context(|| format!("Failed to cancel build for {}", name))?;

    println!("{} Cancellation requested for {}", "✓".green(), name.cyan());
    Ok(())
}

/// Show the latest build console
async fn show_console(client: &KilnClient, name: &str) -> Result<()> {
    let lines = client.get_console(name).await?;

    if lines.is_empty() {
        println!("{}", format!("No builds recorded for {}.", name).yellow());
    } else {
        println!("{}", format!("Console for {}:", name).bold());
        println!("{}", "─".repeat(80).dimmed());
        for line in lines {
            print_log_entry(&line);
        }
        println!("{}", "─".repeat(80).dimmed());
    }

    Ok(())
}

/// Parse `NAME[:KEY=VALUE,...]` into plugin settings
fn parse_plugin(raw: &str) -> std::result::Result<PluginSettings, String> {
    let (name, settings) = match raw.split_once(':') {
        Some((name, settings)) => (name.trim(), Some(settings)),
        None => (raw.trim(), None),
    };
    if name.is_empty() {
        return Err("plugin name is empty".to_string());
    }

    let mut plugin = PluginSettings::new(name);
    for pair in settings.into_iter().flat_map(|s| s.split(',')) {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", pair))?;
        plugin = plugin.with(key.trim(), value.trim());
    }

    Ok(plugin)
}

/// Print a job summary
fn print_job_summary(job: &Job) {
    println!("  {} {}", "▸".cyan(), job.name.bold());
    println!("    Status:     {}", colorize_status(job.status));
    println!("    Last build: {}", format_last_build(job).dimmed());
    println!("    Group:      {}", job.group_or_default().dimmed());
    println!();
}

/// Print detailed job information
fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  Name:       {}", job.name.cyan());
    println!("  Status:     {}", colorize_status(job.status));
    println!("  Last build: {}", format_last_build(job));
    println!("  Group:      {}", job.group_or_default());

    if !job.plugins.is_empty() {
        println!("\n{}", "Plugins:".bold());
        for plugin in &job.plugins {
            println!("  {}", plugin.name.cyan());
            for (key, value) in &plugin.config {
                println!("    {} = {}", key, value);
            }
        }
    }
}

fn print_report(report: &BuildReport) {
    let outcome = colorize_status(report.outcome.into());
    println!(
        "{} {} at {}",
        report.job_name.bold(),
        outcome,
        timestamp::format(&report.finished_at).dimmed()
    );

    for issue in &report.issues {
        let kind = match issue.kind {
            IssueKind::Persistence => "persistence",
            IssueKind::BuildLog => "build log",
            IssueKind::Plugin => "plugin",
        };
        let source = issue
            .source
            .as_deref()
            .map(|s| format!(" {}", s))
            .unwrap_or_default();
        println!(
            "  {} {}{}: {}",
            "⚠".yellow(),
            kind.yellow(),
            source.yellow(),
            issue.message
        );
    }
}

/// Print a log entry
fn print_log_entry(log: &LogEntry) {
    let level_str = log.level.to_string();
    let level_colored = match log.level {
        LogLevel::Debug => level_str.dimmed(),
        LogLevel::Info => level_str.cyan(),
        LogLevel::Warning => level_str.yellow(),
        LogLevel::Error => level_str.red(),
    };

    println!(
        "{} [{}] {}",
        log.timestamp.format("%H:%M:%S").to_string().dimmed(),
        level_colored,
        log.message
    );
}

fn format_last_build(job: &Job) -> String {
    job.last_build
        .as_ref()
        .map(timestamp::format)
        .unwrap_or_else(|| timestamp::NEVER.to_string())
}

/// Colorize job status for display
fn colorize_status(status: JobStatus) -> ColoredString {
    let status_str = status.as_str();
    match status {
        JobStatus::Idle => status_str.dimmed(),
        JobStatus::Running => status_str.cyan(),
        JobStatus::Success => status_str.green(),
        JobStatus::Failed => status_str.red(),
        JobStatus::Cancelled => status_str.yellow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plugin_name_only() {
        let plugin = parse_plugin("tts").unwrap();
        assert_eq!(plugin, PluginSettings::new("tts"));
    }

    #[test]
    fn test_parse_plugin_with_settings() {
        let plugin = parse_plugin("file-move:source=/tmp/a, destination=/srv/b").unwrap();
        assert_eq!(plugin.name, "file-move");
        assert_eq!(plugin.get("source"), Some("/tmp/a"));
        assert_eq!(plugin.get("destination"), Some("/srv/b"));
    }

    #[test]
    fn test_parse_plugin_rejects_bad_input() {
        assert!(parse_plugin(":folder=/srv").is_err());
        assert!(parse_plugin("media-convert:folder").is_err());
    }

    #[test]
    fn test_last_build_renders_never() {
        let job = Job::new("Deploy-1");
        assert_eq!(format_last_build(&job), "Never");

        let built = Job {
            last_build: Some(timestamp::parse("2026-10-19 09:30:00").unwrap()),
            ..job
        };
        assert_eq!(format_last_build(&built), "2026-10-19 09:30:00");
    }
}
