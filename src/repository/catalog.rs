//! Diesel-based catalog repository.
//!
//! Entries are identified by their exact name. A scrape may only change an
//! existing entry's image (last write wins); every other field keeps the
//! value it was created with.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::{debug, warn};

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::{CatalogEntryRecord, NewCatalogEntry};
use super::parse_datetime;
use crate::models::{CatalogEntry, EntrySource, ExtractedCard};
use crate::schema::catalog_entries;

impl From<CatalogEntryRecord> for CatalogEntry {
    fn from(record: CatalogEntryRecord) -> Self {
        CatalogEntry {
            id: record.id,
            name: record.name,
            normalized_name: record.normalized_name,
            group_name: record.group_name,
            member_name: record.member_name,
            series: record.series,
            rarity: record.rarity,
            release_date: record.release_date,
            image_url: record.image_url,
            source: EntrySource::from_str(&record.source).unwrap_or(EntrySource::Scrape),
            source_url: record.source_url,
            verified: record.verified != 0,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// Result of upserting a batch of cards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    /// Cards that could not be written, with the error text.
    pub failed: Vec<(String, String)>,
}

enum CardChange {
    Created,
    Updated,
    Unchanged,
}

/// Repository for catalog entries.
#[derive(Clone)]
pub struct DieselCatalogRepository {
    pool: AsyncSqlitePool,
}

impl DieselCatalogRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Look up an entry by its exact name.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<CatalogEntry>, DieselError> {
        let mut conn = self.pool.get().await?;

        catalog_entries::table
            .filter(catalog_entries::name.eq(name))
            .first::<CatalogEntryRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(CatalogEntry::from))
    }

    /// Insert a new entry.
    pub async fn insert(&self, entry: &CatalogEntry) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let created_at = entry.created_at.to_rfc3339();
        let updated_at = entry.updated_at.to_rfc3339();

        diesel::insert_into(catalog_entries::table)
            .values(&NewCatalogEntry {
                id: &entry.id,
                name: &entry.name,
                normalized_name: &entry.normalized_name,
                group_name: entry.group_name.as_deref(),
                member_name: entry.member_name.as_deref(),
                series: entry.series.as_deref(),
                rarity: entry.rarity.as_deref(),
                release_date: entry.release_date.as_deref(),
                image_url: entry.image_url.as_deref(),
                source: entry.source.as_str(),
                source_url: entry.source_url.as_deref(),
                verified: i32::from(entry.verified),
                created_at: &created_at,
                updated_at: &updated_at,
            })
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Replace an entry's image and provenance, marking it as scraped.
    pub async fn update_image(
        &self,
        id: &str,
        image_url: &str,
        source_url: Option<&str>,
    ) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();

        let rows = diesel::update(catalog_entries::table.find(id))
            .set((
                catalog_entries::image_url.eq(Some(image_url)),
                catalog_entries::source_url.eq(source_url),
                catalog_entries::source.eq(EntrySource::Scrape.as_str()),
                catalog_entries::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await?;

        Ok(rows > 0)
    }

    /// Number of catalog entries.
    pub async fn count(&self) -> Result<u64, DieselError> {
        let mut conn = self.pool.get().await?;

        let count: i64 = catalog_entries::table
            .count()
            .get_result(&mut conn)
            .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn upsert_card(&self, card: &ExtractedCard) -> Result<CardChange, DieselError> {
        match self.find_by_name(&card.name).await? {
            Some(existing) if existing.image_url.as_deref() == Some(card.image_url.as_str()) => {
                Ok(CardChange::Unchanged)
            }
            Some(existing) => {
                self.update_image(&existing.id, &card.image_url, card.source_url.as_deref())
                    .await?;
                Ok(CardChange::Updated)
            }
            None => {
                self.insert(&CatalogEntry::from_card(card)).await?;
                Ok(CardChange::Created)
            }
        }
    }

    /// Insert unknown cards and refresh images of known ones.
    ///
    /// Each card is written independently: a failure is recorded in
    /// [`UpsertOutcome::failed`] and the remaining cards are still processed.
    pub async fn upsert_cards(&self, cards: &[ExtractedCard]) -> UpsertOutcome {
        let mut outcome = UpsertOutcome::default();

        for card in cards {
            match self.upsert_card(card).await {
                Ok(CardChange::Created) => outcome.created += 1,
                Ok(CardChange::Updated) => outcome.updated += 1,
                Ok(CardChange::Unchanged) => outcome.unchanged += 1,
                Err(e) => {
                    warn!("Failed to save card '{}': {}", card.name, e);
                    outcome.failed.push((card.name.clone(), e.to_string()));
                }
            }
        }

        debug!(
            "Upserted {} cards: {} created, {} updated, {} unchanged, {} failed",
            cards.len(),
            outcome.created,
            outcome.updated,
            outcome.unchanged,
            outcome.failed.len()
        );
        outcome
    }
}
