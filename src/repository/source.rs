//! Diesel-based source repository.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::SourceRecord;
use super::{parse_datetime, parse_datetime_opt};
use crate::models::{SelectorConfig, Source, SourceKind};
use crate::schema::sources;

/// Convert a database record to a domain model.
impl From<SourceRecord> for Source {
    fn from(record: SourceRecord) -> Self {
        let kind = SourceKind::from_parts(&record.kind, &record.config)
            .unwrap_or_else(|| SourceKind::Selector(SelectorConfig::default()));
        Source {
            id: record.id,
            name: record.name,
            kind,
            base_url: record.base_url,
            category: record.category,
            group_name: record.group_name,
            rate_limit_ms: record.rate_limit_ms.and_then(|v| u64::try_from(v).ok()),
            max_pages: record.max_pages.and_then(|v| u32::try_from(v).ok()),
            is_active: record.is_active != 0,
            created_at: parse_datetime(&record.created_at),
            last_scraped_at: parse_datetime_opt(record.last_scraped_at),
        }
    }
}

/// Diesel-based source repository with compile-time query checking.
#[derive(Clone)]
pub struct DieselSourceRepository {
    pool: AsyncSqlitePool,
}

impl DieselSourceRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Get a source by ID.
    pub async fn get(&self, id: &str) -> Result<Option<Source>, DieselError> {
        let mut conn = self.pool.get().await?;

        sources::table
            .find(id)
            .first::<SourceRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Source::from))
    }

    /// Get all sources, ordered by name.
    pub async fn get_all(&self) -> Result<Vec<Source>, DieselError> {
        let mut conn = self.pool.get().await?;

        sources::table
            .order(sources::name.asc())
            .load::<SourceRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Source::from).collect())
    }

    /// Get active sources, ordered by name.
    pub async fn get_active(&self) -> Result<Vec<Source>, DieselError> {
        let mut conn = self.pool.get().await?;

        sources::table
            .filter(sources::is_active.eq(1))
            .order(sources::name.asc())
            .load::<SourceRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Source::from).collect())
    }

    /// Save a source, updating it in place if the ID exists.
    ///
    /// Updating rather than replacing keeps the row that `scrape_jobs`
    /// references.
    pub async fn save(&self, source: &Source) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let config_json = source.kind.config_json();
        let created_at = source.created_at.to_rfc3339();
        let last_scraped_at = source.last_scraped_at.map(|dt| dt.to_rfc3339());
        let rate_limit_ms = source
            .rate_limit_ms
            .map(|v| i64::try_from(v).unwrap_or(i64::MAX));
        let max_pages = source
            .max_pages
            .map(|v| i32::try_from(v).unwrap_or(i32::MAX));

        diesel::insert_into(sources::table)
            .values((
                sources::id.eq(&source.id),
                sources::name.eq(&source.name),
                sources::kind.eq(source.kind.as_str()),
                sources::config.eq(&config_json),
                sources::base_url.eq(&source.base_url),
                sources::category.eq(source.category.as_deref()),
                sources::group_name.eq(source.group_name.as_deref()),
                sources::rate_limit_ms.eq(rate_limit_ms),
                sources::max_pages.eq(max_pages),
                sources::is_active.eq(i32::from(source.is_active)),
                sources::created_at.eq(&created_at),
                sources::last_scraped_at.eq(last_scraped_at.as_deref()),
            ))
            .on_conflict(sources::id)
            .do_update()
            .set((
                sources::name.eq(excluded(sources::name)),
                sources::kind.eq(excluded(sources::kind)),
                sources::config.eq(excluded(sources::config)),
                sources::base_url.eq(excluded(sources::base_url)),
                sources::category.eq(excluded(sources::category)),
                sources::group_name.eq(excluded(sources::group_name)),
                sources::rate_limit_ms.eq(excluded(sources::rate_limit_ms)),
                sources::max_pages.eq(excluded(sources::max_pages)),
                sources::is_active.eq(excluded(sources::is_active)),
                sources::created_at.eq(excluded(sources::created_at)),
                sources::last_scraped_at.eq(excluded(sources::last_scraped_at)),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Enable or disable a source. Returns false if no such source exists.
    pub async fn set_active(&self, id: &str, active: bool) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;

        let rows = diesel::update(sources::table.find(id))
            .set(sources::is_active.eq(i32::from(active)))
            .execute(&mut conn)
            .await?;

        Ok(rows > 0)
    }

    /// Update last scraped timestamp.
    pub async fn update_last_scraped(
        &self,
        id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let ts = timestamp.to_rfc3339();

        diesel::update(sources::table.find(id))
            .set(sources::last_scraped_at.eq(Some(ts.as_str())))
            .execute(&mut conn)
            .await?;

        Ok(())
    }
}
