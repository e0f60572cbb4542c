//! Build history command

use anyhow::Result;
use colored::*;
use kiln_client::KilnClient;
use kiln_core::domain::build::{BuildOutcome, BuildRecord};
use kiln_core::domain::timestamp;

/// Show the build history, oldest first
pub async fn show_history(client: &KilnClient, job: Option<&str>) -> Result<()> {
    let records = client.list_build_history(job).await?;

    if records.is_empty() {
        match job {
            Some(job) => println!("{}", format!("No builds recorded for {}.", job).yellow()),
            None => println!("{}", "No builds recorded.".yellow()),
        }
        return Ok(());
    }

    let width = name_width(&records);
    println!(
        "{}",
        format!("{:<width$}  {:<9}  {}", "Job", "Status", "Timestamp").bold()
    );
    for record in &records {
        println!(
            "{:<width$}  {}  {}",
            record.job_name,
            colorize_outcome(record.status, &format!("{:<9}", record.status.as_str())),
            timestamp::format(&record.timestamp).dimmed()
        );
    }
    println!();
    println!("{}", format!("{} build(s)", records.len()).dimmed());

    Ok(())
}

/// Widest job name, at least as wide as the header
fn name_width(records: &[BuildRecord]) -> usize {
    records
        .iter()
        .map(|r| r.job_name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Job".len())
}

fn colorize_outcome(outcome: BuildOutcome, text: &str) -> ColoredString {
    match outcome {
        BuildOutcome::Success => text.green(),
        BuildOutcome::Failed => text.red(),
        BuildOutcome::Cancelled => text.yellow(),
    }
}
