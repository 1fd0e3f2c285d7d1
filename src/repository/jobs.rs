//! Diesel-based scrape job log.
//!
//! A job is written as `running` when a source run starts and finalized
//! exactly once. Finalization only touches rows whose `finished_at` is still
//! NULL, so a second attempt is a no-op.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::{NewScrapeJob, ScrapeJobRecord};
use super::{from_db_count, parse_datetime, parse_datetime_opt, to_db_count};
use crate::models::{JobStatus, ScrapeJob};
use crate::schema::scrape_jobs;

impl From<ScrapeJobRecord> for ScrapeJob {
    fn from(record: ScrapeJobRecord) -> Self {
        ScrapeJob {
            id: record.id,
            source_id: record.source_id,
            status: JobStatus::from_str(&record.status).unwrap_or(JobStatus::Failed),
            started_at: parse_datetime(&record.started_at),
            finished_at: parse_datetime_opt(record.finished_at),
            items_found: from_db_count(record.items_found),
            items_created: from_db_count(record.items_created),
            items_updated: from_db_count(record.items_updated),
            error_message: record.error_message,
        }
    }
}

/// Repository for scrape job records.
#[derive(Clone)]
pub struct DieselScrapeJobRepository {
    pool: AsyncSqlitePool,
}

impl DieselScrapeJobRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Record a new running job for a source.
    pub async fn start(&self, source_id: &str) -> Result<ScrapeJob, DieselError> {
        let mut conn = self.pool.get().await?;
        let job = ScrapeJob::start(source_id);
        let started_at = job.started_at.to_rfc3339();

        diesel::insert_into(scrape_jobs::table)
            .values(&NewScrapeJob {
                id: &job.id,
                source_id: &job.source_id,
                status: JobStatus::Running.as_str(),
                started_at: &started_at,
                items_found: 0,
                items_created: 0,
                items_updated: 0,
            })
            .execute(&mut conn)
            .await?;

        Ok(job)
    }

    /// Mark a job successful with its counts. `note` records non-fatal
    /// problems. Returns false if the job was already finalized.
    pub async fn finish_success(
        &self,
        job: &ScrapeJob,
        items_found: u32,
        items_created: u32,
        items_updated: u32,
        note: Option<&str>,
    ) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let finished_at = job.completion_time(Utc::now()).to_rfc3339();

        let rows = diesel::update(
            scrape_jobs::table
                .filter(scrape_jobs::id.eq(&job.id))
                .filter(scrape_jobs::finished_at.is_null()),
        )
        .set((
            scrape_jobs::status.eq(JobStatus::Success.as_str()),
            scrape_jobs::finished_at.eq(Some(finished_at.as_str())),
            scrape_jobs::items_found.eq(to_db_count(items_found)),
            scrape_jobs::items_created.eq(to_db_count(items_created)),
            scrape_jobs::items_updated.eq(to_db_count(items_updated)),
            scrape_jobs::error_message.eq(note),
        ))
        .execute(&mut conn)
        .await?;

        Ok(rows > 0)
    }

    /// Mark a job failed with zero counts. Returns false if the job was
    /// already finalized.
    pub async fn finish_failed(&self, job: &ScrapeJob, error: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let finished_at = job.completion_time(Utc::now()).to_rfc3339();

        let rows = diesel::update(
            scrape_jobs::table
                .filter(scrape_jobs::id.eq(&job.id))
                .filter(scrape_jobs::finished_at.is_null()),
        )
        .set((
            scrape_jobs::status.eq(JobStatus::Failed.as_str()),
            scrape_jobs::finished_at.eq(Some(finished_at.as_str())),
            scrape_jobs::items_found.eq(0),
            scrape_jobs::items_created.eq(0),
            scrape_jobs::items_updated.eq(0),
            scrape_jobs::error_message.eq(Some(error)),
        ))
        .execute(&mut conn)
        .await?;

        Ok(rows > 0)
    }

    /// Get a job by ID.
    pub async fn get(&self, id: &str) -> Result<Option<ScrapeJob>, DieselError> {
        let mut conn = self.pool.get().await?;

        scrape_jobs::table
            .find(id)
            .first::<ScrapeJobRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(ScrapeJob::from))
    }

    /// Most recent jobs, newest first, optionally for one source.
    pub async fn recent(
        &self,
        source_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ScrapeJob>, DieselError> {
        let mut conn = self.pool.get().await?;

        let mut query = scrape_jobs::table
            .order(scrape_jobs::started_at.desc())
            .limit(limit)
            .into_boxed();
        if let Some(source_id) = source_id {
            query = query.filter(scrape_jobs::source_id.eq(source_id));
        }

        query
            .load::<ScrapeJobRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(ScrapeJob::from).collect())
    }
}
