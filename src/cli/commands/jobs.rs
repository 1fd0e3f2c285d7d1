//! Job log listing.

use std::process::ExitCode;

use console::style;

use super::super::helpers::{open_database, truncate};
use crate::config::Settings;
use crate::models::JobStatus;
use crate::repository::DieselScrapeJobRepository;

/// Show recent scrape jobs, newest first.
pub async fn cmd_jobs(
    settings: &Settings,
    source_id: Option<&str>,
    limit: i64,
) -> anyhow::Result<ExitCode> {
    let job_repo = DieselScrapeJobRepository::new(open_database(settings).await?);
    let jobs = job_repo.recent(source_id, limit.max(1)).await?;

    if jobs.is_empty() {
        println!("{} No scrape jobs recorded yet", style("!").yellow());
        return Ok(ExitCode::SUCCESS);
    }

    println!("\n{}", style("Recent scrape jobs").bold());
    println!("{}", "-".repeat(90));
    println!(
        "{:<17} {:<16} {:<8} {:>6} {:>7} {:>7} {:>8}  Note",
        "Started", "Source", "Status", "Found", "Created", "Updated", "Duration"
    );
    println!("{}", "-".repeat(90));

    for job in jobs {
        let status = match job.status {
            JobStatus::Success => style(job.status.as_str()).green(),
            JobStatus::Failed => style(job.status.as_str()).red(),
            JobStatus::Running => style(job.status.as_str()).yellow(),
        };
        let duration = job
            .duration()
            .map(|d| format!("{:.1}s", d.num_milliseconds() as f64 / 1000.0))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<17} {:<16} {:<8} {:>6} {:>7} {:>7} {:>8}  {}",
            job.started_at.format("%Y-%m-%d %H:%M"),
            truncate(&job.source_id, 15),
            status,
            job.items_found,
            job.items_created,
            job.items_updated,
            duration,
            truncate(job.error_message.as_deref().unwrap_or(""), 40)
        );
    }

    Ok(ExitCode::SUCCESS)
}
