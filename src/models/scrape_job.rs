//! Job log records for scrape runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a scrape job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One execution attempt against one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub id: String,
    pub source_id: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub items_found: u32,
    pub items_created: u32,
    pub items_updated: u32,
    pub error_message: Option<String>,
}

impl ScrapeJob {
    /// Open a running job for a source.
    pub fn start(source_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            status: JobStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            items_found: 0,
            items_created: 0,
            items_updated: 0,
            error_message: None,
        }
    }

    /// Completion time, never earlier than the start time.
    pub fn completion_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(self.started_at)
    }

    /// Wall-clock duration, if finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [JobStatus::Running, JobStatus::Success, JobStatus::Failed] {
            assert_eq!(JobStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::from_str("pending"), None);
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_completion_time_never_precedes_start() {
        let job = ScrapeJob::start("src");
        let earlier = job.started_at - chrono::Duration::seconds(5);
        assert_eq!(job.completion_time(earlier), job.started_at);
        let later = job.started_at + chrono::Duration::seconds(5);
        assert_eq!(job.completion_time(later), later);
    }
}
